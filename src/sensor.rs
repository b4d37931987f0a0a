use std::{io, path::PathBuf};

use thiserror::Error;

use crate::device::DeviceError;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Temperature source used before initialization")]
    NotInitialized,
    #[error("Failed to read \"{}\"", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse \"{value}\" read from \"{}\"", .path.display())]
    Parse { path: PathBuf, value: String },
    #[error("No \"{0}\" reading in the device status")]
    MissingReading(String),
    #[error("Device status has no temperature readings")]
    EmptyStatus,
    #[error("Temperature reading {0} is not a finite number")]
    NonFinite(f64),
}

// Source of the liquid temperature, polled once per tick
pub trait TemperatureSource: Send {
    // Open whatever the source needs, called once before the first read
    fn initialize(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    // Return the current temperature in degrees Celsius
    fn read_temperature(&mut self) -> Result<f64, SensorError>;

    // Release the source, called once when the control loop stops
    fn shutdown(&mut self) {}
}
