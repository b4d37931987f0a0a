use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace_span, warn};

use crate::{
    errors::LiquidfanError,
    fan_controller::{FanController, FanError},
    sensor::{SensorError, TemperatureSource},
};

// What to do when the temperature can't be read on a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    // Log the failure and try again on the next tick
    #[default]
    Skip,
    // Stop the loop with the error
    Abort,
}

// Outcome of a single tick
#[derive(Debug)]
pub struct TickReport {
    pub temperature: f64,
    // One entry per fan, in registration order
    pub duties: Vec<Result<u8, FanError>>,
}

pub struct ControlLoop {
    source: Box<dyn TemperatureSource>,
    fans: Vec<FanController>,

    interval: Duration,
    read_error_policy: ReadErrorPolicy,
}

impl ControlLoop {
    pub fn new(source: Box<dyn TemperatureSource>, interval: Duration) -> Self {
        Self {
            source,
            fans: Vec::new(),
            interval,
            read_error_policy: ReadErrorPolicy::default(),
        }
    }

    pub fn with_read_error_policy(mut self, policy: ReadErrorPolicy) -> Self {
        self.read_error_policy = policy;
        self
    }

    pub fn add_fan(&mut self, fan: FanController) {
        self.fans.push(fan);
    }

    pub fn fans(&self) -> &[FanController] {
        &self.fans
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Initialize the devices, tick until `run_token` is cancelled, then
    /// release everything.
    ///
    /// Initialization failures are returned before the first tick. With
    /// [`ReadErrorPolicy::Abort`] a failed temperature read stops the loop and
    /// is returned after the shutdown.
    pub async fn run(
        &mut self,
        run_token: CancellationToken,
    ) -> Result<(), LiquidfanError> {
        info!("Control loop: Initializing");

        self.initialize()?;

        info!(
            "Control loop: Running with {} fans every {:?}",
            self.fans.len(),
            self.interval
        );

        let result = self.run_ticks(&run_token).await;

        info!("Control loop: Quiting");

        self.shutdown();

        result
    }

    async fn run_ticks(
        &mut self,
        run_token: &CancellationToken,
    ) -> Result<(), LiquidfanError> {
        while !run_token.is_cancelled() {
            {
                let _guard = trace_span!("tick").entered();

                if let Err(err) = self.tick() {
                    match self.read_error_policy {
                        ReadErrorPolicy::Abort => return Err(err.into()),
                        ReadErrorPolicy::Skip => {
                            warn!("Skipping tick: {err}");
                        }
                    }
                }
            }

            select! {
                _ = run_token.cancelled() => {},
                _ = tokio::time::sleep(self.interval) => {},
            }
        }

        Ok(())
    }

    // Open the temperature source and take control of every fan.
    // On failure everything acquired so far is released
    pub fn initialize(&mut self) -> Result<(), LiquidfanError> {
        if let Err(err) = self.source.initialize() {
            self.source.shutdown();
            return Err(err.into());
        }

        for i in 0..self.fans.len() {
            if let Err(err) = self.fans[i].acquire() {
                for fan in self.fans[..i].iter_mut() {
                    Self::release_fan(fan);
                }
                self.source.shutdown();

                return Err(err.into());
            }
        }

        Ok(())
    }

    /// Read the temperature once and feed it to every fan in order.
    ///
    /// Only a failed read is returned as an error, per fan failures are
    /// logged and reported in the [`TickReport`].
    pub fn tick(&mut self) -> Result<TickReport, SensorError> {
        let temperature = self.source.read_temperature()?;

        if !temperature.is_finite() {
            return Err(SensorError::NonFinite(temperature));
        }

        let duties = self
            .fans
            .iter_mut()
            .map(|fan| {
                let duty = fan.tick(temperature);

                match &duty {
                    Ok(duty) => {
                        debug!("Speed for fan \"{}\": {duty}", fan.name());
                    }
                    Err(err) => {
                        error!("Fan \"{}\": {err}", fan.name());
                    }
                }

                duty
            })
            .collect();

        Ok(TickReport {
            temperature,
            duties,
        })
    }

    // Hand every fan back and close the temperature source
    pub fn shutdown(&mut self) {
        for fan in self.fans.iter_mut() {
            Self::release_fan(fan);
        }

        self.source.shutdown();
    }

    fn release_fan(fan: &mut FanController) {
        if let Err(err) = fan.release() {
            error!("Failed to release fan \"{}\": {err}", fan.name());
        }
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("fans", &self.fans)
            .field("interval", &self.interval)
            .field("read_error_policy", &self.read_error_policy)
            .finish_non_exhaustive()
    }
}
