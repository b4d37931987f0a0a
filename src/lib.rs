pub mod actuator;
pub mod arg_parser;
pub mod config;
pub mod control_loop;
pub mod device;
pub mod errors;
pub mod fan_controller;
pub mod fan_curve;
pub mod logger;
pub mod sensor;

#[cfg(test)]
mod test_utils;
