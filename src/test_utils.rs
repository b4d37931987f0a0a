// Fakes shared by the unit tests

use std::{
    collections::VecDeque,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use crate::{
    actuator::{Actuator, ActuatorError},
    device::DeviceError,
    sensor::{SensorError, TemperatureSource},
};

#[derive(Debug, Default)]
struct ActuatorLog {
    writes: Vec<u8>,
    fail_writes: bool,
    acquired: usize,
    released: usize,
}

// Actuator recording every write, clones share the same log
#[derive(Debug, Clone)]
pub struct RecordingActuator {
    target: String,
    log: Arc<Mutex<ActuatorLog>>,
}

impl RecordingActuator {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            log: Arc::new(Mutex::new(ActuatorLog::default())),
        }
    }

    pub fn writes(&self) -> Vec<u8> {
        self.log.lock().unwrap().writes.clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.log.lock().unwrap().fail_writes = fail;
    }

    pub fn acquired(&self) -> usize {
        self.log.lock().unwrap().acquired
    }

    pub fn released(&self) -> usize {
        self.log.lock().unwrap().released
    }
}

impl Actuator for RecordingActuator {
    fn target(&self) -> String {
        self.target.clone()
    }

    fn write(&mut self, duty: u8) -> Result<(), ActuatorError> {
        let mut log = self.log.lock().unwrap();

        if log.fail_writes {
            return Err(ActuatorError::Write {
                target: PathBuf::from(&self.target),
                duty,
                source: io::Error::other("injected failure"),
            });
        }

        log.writes.push(duty);
        Ok(())
    }

    fn acquire(&mut self) -> Result<(), ActuatorError> {
        self.log.lock().unwrap().acquired += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.log.lock().unwrap().released += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SourceLog {
    readings: VecDeque<Result<f64, SensorError>>,
    fail_init: bool,
    reads: usize,
    initialized: bool,
    shut_down: bool,
}

// Temperature source replaying a script of readings,
// clones share the same script
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    log: Arc<Mutex<SourceLog>>,
}

impl ScriptedSource {
    pub fn new(temps: &[f64]) -> Self {
        let source = Self::default();
        for temp in temps {
            source.push(Ok(*temp));
        }
        source
    }

    pub fn push(&self, reading: Result<f64, SensorError>) {
        self.log.lock().unwrap().readings.push_back(reading);
    }

    pub fn fail_init(self) -> Self {
        self.log.lock().unwrap().fail_init = true;
        self
    }

    pub fn reads(&self) -> usize {
        self.log.lock().unwrap().reads
    }

    pub fn initialized(&self) -> bool {
        self.log.lock().unwrap().initialized
    }

    pub fn shut_down(&self) -> bool {
        self.log.lock().unwrap().shut_down
    }
}

impl TemperatureSource for ScriptedSource {
    fn initialize(&mut self) -> Result<(), DeviceError> {
        let mut log = self.log.lock().unwrap();

        if log.fail_init {
            return Err(DeviceError::NotFound("scripted".to_string()));
        }

        log.initialized = true;
        Ok(())
    }

    // Once the script runs out the source reports missing readings
    fn read_temperature(&mut self) -> Result<f64, SensorError> {
        let mut log = self.log.lock().unwrap();
        log.reads += 1;

        log.readings
            .pop_front()
            .unwrap_or(Err(SensorError::EmptyStatus))
    }

    fn shutdown(&mut self) {
        self.log.lock().unwrap().shut_down = true;
    }
}
