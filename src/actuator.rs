use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, trace};

// Value of a pwmN_enable file selecting manual control
const MANUAL_MODE: &str = "1";

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Failed to write duty {duty} to \"{}\"", .target.display())]
    Write {
        target: PathBuf,
        duty: u8,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read the control mode from \"{}\"", .target.display())]
    ReadMode {
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to set control mode \"{mode}\" on \"{}\"", .target.display())]
    SetMode {
        target: PathBuf,
        mode: String,
        #[source]
        source: io::Error,
    },
}

// A control point accepting a 0-255 duty value for one fan
pub trait Actuator: Send {
    // Human readable identifier of the control point
    fn target(&self) -> String;

    // Apply the given duty value
    fn write(&mut self, duty: u8) -> Result<(), ActuatorError>;

    // Take control of the fan before the first write
    fn acquire(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }

    // Give control of the fan back to whoever had it before acquire
    fn release(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

/// A sysfs PWM file such as `/sys/class/hwmon/hwmon4/pwm2`.
///
/// The duty is written as a bare decimal integer. When an enable file is
/// given, acquiring the actuator switches it to manual mode and releasing it
/// restores whatever mode was there before.
#[derive(Debug)]
pub struct PwmFile {
    pwm: PathBuf,
    enable: Option<PathBuf>,

    // Mode found in the enable file when the actuator was acquired
    saved_mode: Option<String>,
}

impl PwmFile {
    pub fn new(pwm: &Path) -> Self {
        Self {
            pwm: pwm.to_path_buf(),
            enable: None,
            saved_mode: None,
        }
    }

    pub fn with_enable(mut self, enable: &Path) -> Self {
        self.enable = Some(enable.to_path_buf());
        self
    }
}

impl Actuator for PwmFile {
    fn target(&self) -> String {
        self.pwm.display().to_string()
    }

    fn write(&mut self, duty: u8) -> Result<(), ActuatorError> {
        trace!("Writing {duty} to {:?}", self.pwm);

        fs::write(&self.pwm, duty.to_string()).map_err(|source| {
            ActuatorError::Write {
                target: self.pwm.clone(),
                duty,
                source,
            }
        })
    }

    fn acquire(&mut self) -> Result<(), ActuatorError> {
        let Some(enable) = &self.enable else {
            return Ok(());
        };

        let mode = fs::read_to_string(enable)
            .map(|mode| mode.trim().to_string())
            .map_err(|source| ActuatorError::ReadMode {
                target: enable.clone(),
                source,
            })?;

        debug!("Switching {:?} from mode {mode} to manual", enable);

        set_mode(enable, MANUAL_MODE)?;
        self.saved_mode = Some(mode);

        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        let (Some(enable), Some(mode)) = (&self.enable, &self.saved_mode) else {
            return Ok(());
        };

        debug!("Restoring mode {mode} on {:?}", enable);

        // Keep the saved mode until it is back in place so release can be retried
        set_mode(enable, mode)?;
        self.saved_mode = None;

        Ok(())
    }
}

fn set_mode(enable: &Path, mode: &str) -> Result<(), ActuatorError> {
    fs::write(enable, mode).map_err(|source| ActuatorError::SetMode {
        target: enable.to_path_buf(),
        mode: mode.to_string(),
        source,
    })
}
