use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    actuator::PwmFile,
    control_loop::{ControlLoop, ReadErrorPolicy},
    device::{DEFAULT_HWMON_ROOT, SessionSource},
    fan_controller::FanController,
    fan_curve::{CurveError, CurvePoint, LinearCurve},
};

const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_FILTER: &str = "kraken";

// Controller configuration, every field can be omitted from the Json file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Time between two temperature samples
    pub interval_ms: u64,
    pub read_error_policy: ReadErrorPolicy,

    pub device: DeviceConfig,
    pub fans: Vec<FanConfig>,
}

// Where to find the liquid temperature sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub hwmon_root: PathBuf,

    // Substring of the device description
    pub filter: String,

    // Status key of the temperature to use,
    // the first reading of the device if unset
    pub sensor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanConfig {
    pub name: String,

    // PWM control file and optional pwmN_enable file
    pub pwm: PathBuf,
    #[serde(default)]
    pub enable: Option<PathBuf>,

    // [temperature, speed percentage] pairs in ascending temperature order
    pub curve: Vec<CurvePoint>,
}

impl Config {
    // Parse the Json configuration file at the given path
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Parsing config file at: {:?}", path);

        let file = File::open(path).with_context(|| {
            format!("Failed to open Json configuration file {:?}", path)
        })?;

        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| "Failed to parse Json configuration file")?;

        trace!("Loaded configuration: {:?}", config);

        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    // Build the control loop described by the configuration.
    // Every curve is validated before anything is built
    pub fn build_loop(&self) -> Result<ControlLoop> {
        let mut source =
            SessionSource::new(&self.device.hwmon_root, &self.device.filter);
        if let Some(sensor) = &self.device.sensor {
            source = source.with_sensor(sensor);
        }

        let fans = self
            .fans
            .iter()
            .map(|fan| {
                fan.build().with_context(|| {
                    format!("Invalid fan curve for \"{}\"", fan.name)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut control_loop = ControlLoop::new(Box::new(source), self.interval())
            .with_read_error_policy(self.read_error_policy);

        for fan in fans {
            control_loop.add_fan(fan);
        }

        Ok(control_loop)
    }
}

impl FanConfig {
    pub fn new(name: &str, pwm: &str, curve: &[(f64, f64)]) -> Self {
        Self {
            name: name.to_string(),
            pwm: PathBuf::from(pwm),
            enable: None,
            curve: curve.iter().copied().map(CurvePoint::from).collect(),
        }
    }

    pub fn build(&self) -> Result<FanController, CurveError> {
        let curve = LinearCurve::new(&self.curve)?;

        let mut actuator = PwmFile::new(&self.pwm);
        if let Some(enable) = &self.enable {
            actuator = actuator.with_enable(enable);
        }

        Ok(FanController::new(
            &self.name,
            Box::new(curve),
            Box::new(actuator),
        ))
    }
}

// Defaults describe a Kraken cooled system with
// a radiator fan and a pair of top fans
impl Default for Config {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            read_error_policy: ReadErrorPolicy::default(),

            device: DeviceConfig::default(),
            fans: vec![
                FanConfig::new(
                    "cpu radiator",
                    "/sys/class/hwmon/hwmon4/pwm2",
                    &[(20., 40.), (30., 40.), (30., 60.), (60., 100.)],
                ),
                FanConfig::new(
                    "top",
                    "/sys/class/hwmon/hwmon4/pwm3",
                    &[
                        (20., 0.),
                        (27., 0.),
                        (27., 30.),
                        (30., 30.),
                        (30., 40.),
                        (60., 100.),
                    ],
                ),
            ],
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hwmon_root: PathBuf::from(DEFAULT_HWMON_ROOT),
            filter: DEFAULT_FILTER.to_string(),
            sensor: None,
        }
    }
}
