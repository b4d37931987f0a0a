use thiserror::Error;

use crate::{actuator::ActuatorError, device::DeviceError, sensor::SensorError};

// The main controller error type
#[derive(Debug, Error)]
pub enum LiquidfanError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}
