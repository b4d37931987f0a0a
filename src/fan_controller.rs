use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    actuator::{Actuator, ActuatorError},
    fan_curve::{CurveError, FanCurve},
};

// Highest duty value accepted by a PWM control point
pub const MAX_DUTY: u8 = 255;

#[derive(Debug, Error)]
pub enum FanError {
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

// Convert a speed fraction to a duty value, rounding to the nearest step
pub fn duty_from_fraction(fraction: f64) -> u8 {
    (fraction * MAX_DUTY as f64).round().clamp(0., MAX_DUTY as f64) as u8
}

// Drive one fan from its curve, only touching
// the actuator when the duty value changes
pub struct FanController {
    name: String,

    curve: Box<dyn FanCurve + Send>,
    actuator: Box<dyn Actuator>,

    // Duty of the last successful write, None before the first one
    last_duty: Option<u8>,
}

impl FanController {
    pub fn new(
        name: &str,
        curve: Box<dyn FanCurve + Send>,
        actuator: Box<dyn Actuator>,
    ) -> Self {
        Self {
            name: name.to_string(),
            curve,
            actuator,
            last_duty: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_duty(&self) -> Option<u8> {
        self.last_duty
    }

    pub fn target(&self) -> String {
        self.actuator.target()
    }

    /// Evaluate the curve at `temp` and apply the resulting duty.
    ///
    /// The duty is returned whether or not it was written. A failed write
    /// leaves the last applied duty untouched, so the next tick computing the
    /// same duty tries again.
    pub fn tick(&mut self, temp: f64) -> Result<u8, FanError> {
        let fraction = self.curve.speed_fraction(temp)?;
        let duty = duty_from_fraction(fraction);

        if self.last_duty == Some(duty) {
            trace!("Fan \"{}\": duty {duty} unchanged", self.name);
            return Ok(duty);
        }

        self.actuator.write(duty)?;
        self.last_duty = Some(duty);

        debug!(
            "Fan \"{}\": {temp}°C -> {duty} written to {}",
            self.name,
            self.actuator.target()
        );

        Ok(duty)
    }

    pub fn acquire(&mut self) -> Result<(), ActuatorError> {
        self.actuator.acquire()
    }

    // Forget the last duty so that a later acquire starts from a fresh write
    pub fn release(&mut self) -> Result<(), ActuatorError> {
        self.last_duty = None;
        self.actuator.release()
    }
}

impl std::fmt::Debug for FanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanController")
            .field("name", &self.name)
            .field("points", &self.curve.points_num())
            .field("target", &self.actuator.target())
            .field("last_duty", &self.last_duty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fan_curve::LinearCurve, test_utils::RecordingActuator};
    use pretty_assertions::assert_eq;

    fn controller(pairs: &[(f64, f64)]) -> (FanController, RecordingActuator) {
        let actuator = RecordingActuator::new("pwm1");
        let curve = LinearCurve::from_pairs(pairs).unwrap();

        let fan = FanController::new("test", Box::new(curve), Box::new(actuator.clone()));

        (fan, actuator)
    }

    #[test]
    fn duty_rounds_to_nearest() {
        assert_eq!(duty_from_fraction(0.), 0);
        assert_eq!(duty_from_fraction(0.4), 102);
        assert_eq!(duty_from_fraction(0.43), 110);
        assert_eq!(duty_from_fraction(0.62), 158);
        assert_eq!(duty_from_fraction(1.), 255);
    }

    #[test]
    fn duty_is_clamped() {
        assert_eq!(duty_from_fraction(-0.5), 0);
        assert_eq!(duty_from_fraction(1.5), 255);
    }

    #[test]
    fn first_tick_always_writes() {
        let (mut fan, actuator) = controller(&[(20., 0.), (60., 0.)]);

        assert_eq!(fan.last_duty(), None);
        assert_eq!(fan.tick(30.).unwrap(), 0);
        assert_eq!(actuator.writes(), vec![0]);
        assert_eq!(fan.last_duty(), Some(0));
    }

    #[test]
    fn unchanged_duty_is_written_once() {
        let (mut fan, actuator) = controller(&[(20., 40.), (30., 40.)]);

        assert_eq!(fan.tick(25.).unwrap(), 102);
        assert_eq!(fan.tick(26.).unwrap(), 102);

        assert_eq!(actuator.writes(), vec![102]);
    }

    #[test]
    fn changed_duty_is_written() {
        let (mut fan, actuator) = controller(&[(20., 40.), (60., 100.)]);

        fan.tick(20.).unwrap();
        fan.tick(60.).unwrap();
        fan.tick(70.).unwrap();
        fan.tick(20.).unwrap();

        assert_eq!(actuator.writes(), vec![102, 255, 102]);
    }

    #[test]
    fn failed_write_is_retried_next_tick() {
        let (mut fan, actuator) = controller(&[(20., 40.), (30., 40.)]);

        actuator.fail_writes(true);
        assert!(matches!(fan.tick(25.), Err(FanError::Actuator(_))));
        assert_eq!(fan.last_duty(), None);

        actuator.fail_writes(false);
        assert_eq!(fan.tick(25.).unwrap(), 102);
        assert_eq!(fan.last_duty(), Some(102));
        assert_eq!(actuator.writes(), vec![102]);
    }

    #[test]
    fn failed_write_keeps_previous_duty() {
        let (mut fan, actuator) = controller(&[(20., 40.), (60., 100.)]);

        fan.tick(20.).unwrap();

        actuator.fail_writes(true);
        assert!(fan.tick(60.).is_err());
        assert_eq!(fan.last_duty(), Some(102));

        actuator.fail_writes(false);
        fan.tick(60.).unwrap();
        assert_eq!(actuator.writes(), vec![102, 255]);
    }

    #[test]
    fn curve_error_does_not_write() {
        let (mut fan, actuator) = controller(&[(20., 40.)]);

        assert!(matches!(fan.tick(f64::NAN), Err(FanError::Curve(_))));
        assert!(actuator.writes().is_empty());
    }

    #[test]
    fn release_resets_debounce() {
        let (mut fan, actuator) = controller(&[(20., 40.), (30., 40.)]);

        fan.acquire().unwrap();
        fan.tick(25.).unwrap();
        fan.release().unwrap();
        fan.acquire().unwrap();
        fan.tick(25.).unwrap();
        fan.release().unwrap();

        assert_eq!(actuator.writes(), vec![102, 102]);
        assert_eq!(actuator.acquired(), 2);
        assert_eq!(actuator.released(), 2);
        assert_eq!(fan.last_duty(), None);
    }

    #[test]
    fn debug_shows_name_and_target() {
        let (fan, _) = controller(&[(20., 40.)]);
        let debug_output = format!("{fan:?}");

        assert!(debug_output.contains("test"));
        assert!(debug_output.contains("pwm1"));
    }
}
