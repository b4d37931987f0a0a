pub mod linear_curve;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use linear_curve::LinearCurve;

#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    #[error("Fan curve has no points")]
    Empty,
    #[error("Point {index} of the fan curve is not a finite number")]
    NonFinite { index: usize },
    #[error("Point {index} has a fan speed of {speed}%, expected 0 to 100")]
    SpeedOutOfRange { index: usize, speed: f64 },
    #[error(
        "Point {index} at {temp}°C comes after a point at {previous}°C, \
         points must be in ascending temperature order"
    )]
    Descending { index: usize, temp: f64, previous: f64 },
    #[error("Cannot evaluate the fan curve at {0}°C")]
    InvalidTemperature(f64),
    #[error("Degenerate fan curve segment ending at {temp}°C")]
    DegenerateSegment { temp: f64 },
}

pub trait FanCurve {
    // Return the fan speed for the given temperature
    // as a fraction between 0 and 1
    fn speed_fraction(&self, temp: f64) -> Result<f64, CurveError>;

    // Return the number of points in the curve
    fn points_num(&self) -> usize;
}

// A (temperature, fan speed percentage) anchor of a fan curve.
// In configuration files a point is written as a `[temp, speed]` pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct CurvePoint {
    pub temp: f64,
    pub speed: f64,
}

impl CurvePoint {
    pub const fn new(temp: f64, speed: f64) -> Self {
        Self { temp, speed }
    }
}

impl From<(f64, f64)> for CurvePoint {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<CurvePoint> for (f64, f64) {
    fn from(point: CurvePoint) -> Self {
        (point.temp, point.speed)
    }
}
