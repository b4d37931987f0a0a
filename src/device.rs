use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};

use crate::sensor::{SensorError, TemperatureSource};

pub const DEFAULT_HWMON_ROOT: &str = "/sys/class/hwmon";

const CELSIUS: &str = "°C";

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to list devices in \"{}\"", .root.display())]
    Discover {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No device matching \"{0}\" found")]
    NotFound(String),
    #[error("Failed to initialize \"{description}\": {reason}")]
    Initialization { description: String, reason: String },
}

// A monitoring chip found during discovery
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub description: String,
}

impl DeviceInfo {
    // Case insensitive substring match on the device description
    pub fn matches(&self, filter: &str) -> bool {
        self.description
            .to_lowercase()
            .contains(&filter.to_lowercase())
    }

    pub fn connect(&self) -> Session {
        Session {
            info: self.clone(),
            inputs: Vec::new(),
        }
    }
}

/// List the hwmon chips under `root`, sorted by path.
///
/// The description of a chip is the content of its `name` file, directories
/// without one are skipped.
pub fn discover(root: &Path) -> Result<Vec<DeviceInfo>, DeviceError> {
    let entries = fs::read_dir(root).map_err(|source| DeviceError::Discover {
        root: root.to_path_buf(),
        source,
    })?;

    let mut devices: Vec<DeviceInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            let description = read_trimmed(&path.join("name")).ok()?;

            Some(DeviceInfo { path, description })
        })
        .collect();

    devices.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(devices)
}

// Open a session with the first device matching the filter
pub fn connect(root: &Path, filter: &str) -> Result<Session, DeviceError> {
    let devices = discover(root)?;

    for device in devices.iter() {
        debug!("Found device \"{}\" at {:?}", device.description, device.path);
    }

    let device = devices
        .into_iter()
        .find(|device| device.matches(filter))
        .ok_or_else(|| DeviceError::NotFound(filter.to_string()))?;

    info!("Found \"{}\" at {:?}", device.description, device.path);

    Ok(device.connect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub key: String,
    pub value: f64,
    pub unit: &'static str,
}

// Readings reported by a device, in sensor index order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status(Vec<StatusEntry>);

impl Status {
    pub fn entries(&self) -> &[StatusEntry] {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value)
    }

    pub fn first(&self) -> Option<&StatusEntry> {
        self.0.first()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {} {}", entry.key, entry.value, entry.unit)?;
        }

        Ok(())
    }
}

#[derive(Debug)]
struct TempInput {
    key: String,
    path: PathBuf,
}

#[derive(Debug)]
pub struct Session {
    info: DeviceInfo,

    // Populated by initialize
    inputs: Vec<TempInput>,
}

impl Session {
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    // Find the temperature inputs of the device and take a first reading
    pub fn initialize(&mut self) -> Result<Status, DeviceError> {
        let inputs = find_temp_inputs(&self.info.path).map_err(|err| {
            self.init_error(format!("failed to list sensors: {err}"))
        })?;

        if inputs.is_empty() {
            return Err(self.init_error("no temperature inputs".to_string()));
        }

        self.inputs = inputs;

        self.get_status()
            .map_err(|err| self.init_error(err.to_string()))
    }

    pub fn get_status(&self) -> Result<Status, SensorError> {
        if self.inputs.is_empty() {
            return Err(SensorError::NotInitialized);
        }

        let entries = self
            .inputs
            .iter()
            .map(|input| {
                Ok(StatusEntry {
                    key: input.key.clone(),
                    value: read_millidegrees(&input.path)?,
                    unit: CELSIUS,
                })
            })
            .collect::<Result<Vec<_>, SensorError>>()?;

        Ok(Status(entries))
    }

    fn init_error(&self, reason: String) -> DeviceError {
        DeviceError::Initialization {
            description: self.info.description.clone(),
            reason,
        }
    }
}

/// Temperature source backed by a device session.
///
/// The device is looked up by description when the source is initialized.
/// Without a sensor key the first reading of the status is used, which is the
/// liquid temperature on the coolers this was written for.
#[derive(Debug)]
pub struct SessionSource {
    root: PathBuf,
    filter: String,
    sensor: Option<String>,

    session: Option<Session>,
}

impl SessionSource {
    pub fn new(root: &Path, filter: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            filter: filter.to_string(),
            sensor: None,
            session: None,
        }
    }

    pub fn with_sensor(mut self, sensor: &str) -> Self {
        self.sensor = Some(sensor.to_string());
        self
    }
}

impl TemperatureSource for SessionSource {
    fn initialize(&mut self) -> Result<(), DeviceError> {
        let mut session = connect(&self.root, &self.filter)?;
        let status = session.initialize()?;

        info!("Initialized \"{}\": {status}", session.info().description);

        if let Some(sensor) = &self.sensor {
            if status.get(sensor).is_none() {
                return Err(session.init_error(format!("no \"{sensor}\" reading")));
            }
        }

        self.session = Some(session);

        Ok(())
    }

    fn read_temperature(&mut self) -> Result<f64, SensorError> {
        let session = self.session.as_ref().ok_or(SensorError::NotInitialized)?;
        let status = session.get_status()?;

        debug!("Status: {status}");

        match &self.sensor {
            Some(sensor) => status
                .get(sensor)
                .ok_or_else(|| SensorError::MissingReading(sensor.clone())),
            None => status
                .first()
                .map(|entry| entry.value)
                .ok_or(SensorError::EmptyStatus),
        }
    }

    fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Closing session with \"{}\"", session.info().description);
        }
    }
}

fn find_temp_inputs(dir: &Path) -> io::Result<Vec<TempInput>> {
    let mut inputs = Vec::new();

    for entry in fs::read_dir(dir)?.flatten() {
        let file_name = entry.file_name();
        let Some(idx) = extract_index(&file_name.to_string_lossy(), "temp", "_input")
        else {
            continue;
        };

        let key = read_trimmed(&dir.join(format!("temp{idx}_label")))
            .unwrap_or_else(|_| format!("temp{idx}"));

        inputs.push((idx, TempInput { key, path: entry.path() }));
    }

    inputs.sort_by_key(|(idx, _)| *idx);

    Ok(inputs.into_iter().map(|(_, input)| input).collect())
}

// "temp3_input" -> 3
fn extract_index(file_name: &str, prefix: &str, suffix: &str) -> Option<usize> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(suffix)?
        .parse()
        .ok()
}

// hwmon reports temperatures in millidegrees Celsius
fn read_millidegrees(path: &Path) -> Result<f64, SensorError> {
    let raw = read_trimmed(path).map_err(|source| SensorError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    raw.parse::<i64>()
        .map(|milli| milli as f64 / 1000.)
        .map_err(|_| SensorError::Parse {
            path: path.to_path_buf(),
            value: raw,
        })
}

fn read_trimmed(path: &Path) -> io::Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}
