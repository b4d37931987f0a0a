use std::ops::ControlFlow;

use tracing::trace;

use crate::fan_curve::{CurveError, CurvePoint, FanCurve};

// Implicit first point of every curve
const ORIGIN: CurvePoint = CurvePoint::new(0., 0.);

// Piecewise linear fan curve anchored at the origin
#[derive(Debug, Clone, PartialEq)]
pub struct LinearCurve {
    points: Vec<CurvePoint>,
}

impl LinearCurve {
    /// Build a curve from points sorted by ascending temperature.
    ///
    /// Two consecutive points may share a temperature, this describes a
    /// vertical step where the later point wins at exactly that temperature.
    pub fn new(points: &[CurvePoint]) -> Result<LinearCurve, CurveError> {
        validate(points)?;

        Ok(Self {
            points: points.to_vec(),
        })
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<LinearCurve, CurveError> {
        let points: Vec<CurvePoint> =
            pairs.iter().copied().map(CurvePoint::from).collect();

        Self::new(&points)
    }
}

impl FanCurve for LinearCurve {
    fn speed_fraction(&self, temp: f64) -> Result<f64, CurveError> {
        interpolate(&self.points, temp)
    }

    fn points_num(&self) -> usize {
        self.points.len()
    }
}

/// Evaluate the fan speed fraction for `temp` over already ordered points.
///
/// The scan keeps the last point whose temperature is not above `temp` as the
/// lower end of the bracket and stops at the first point above it. When the
/// scan runs off the end of the curve the last speed is held.
pub fn interpolate(points: &[CurvePoint], temp: f64) -> Result<f64, CurveError> {
    if !temp.is_finite() {
        return Err(CurveError::InvalidTemperature(temp));
    }

    if points.is_empty() {
        return Err(CurveError::Empty);
    }

    let (lower, upper) = bracket(points, temp);

    trace!(
        "Curve bracket for {temp}°C: ({}, {}) - ({}, {})",
        lower.temp, lower.speed, upper.temp, upper.speed
    );

    // At or past the last point
    if upper.temp <= lower.temp {
        return Ok(to_fraction(upper.speed));
    }

    // y = mx + c
    let m = (upper.speed - lower.speed) / (upper.temp - lower.temp);
    let c = upper.speed - m * upper.temp;
    let speed = m * temp + c;

    if !speed.is_finite() {
        return Err(CurveError::DegenerateSegment { temp: upper.temp });
    }

    Ok(to_fraction(speed))
}

// Fold the points into the (lower, upper) pair surrounding temp,
// starting from the origin
fn bracket(points: &[CurvePoint], temp: f64) -> (CurvePoint, CurvePoint) {
    let scan = points.iter().try_fold((ORIGIN, ORIGIN), |(lower, _), &point| {
        if point.temp > temp {
            ControlFlow::Break((lower, point))
        } else {
            ControlFlow::Continue((point, point))
        }
    });

    match scan {
        ControlFlow::Break(bracket) | ControlFlow::Continue(bracket) => bracket,
    }
}

// Below the first point the line towards the origin can go negative
fn to_fraction(speed: f64) -> f64 {
    (speed / 100.).clamp(0., 1.)
}

fn validate(points: &[CurvePoint]) -> Result<(), CurveError> {
    if points.is_empty() {
        return Err(CurveError::Empty);
    }

    let mut previous: Option<f64> = None;

    for (index, point) in points.iter().enumerate() {
        if !point.temp.is_finite() || !point.speed.is_finite() {
            return Err(CurveError::NonFinite { index });
        }

        if !(0. ..=100.).contains(&point.speed) {
            return Err(CurveError::SpeedOutOfRange {
                index,
                speed: point.speed,
            });
        }

        if let Some(previous) = previous {
            if point.temp < previous {
                return Err(CurveError::Descending {
                    index,
                    temp: point.temp,
                    previous,
                });
            }
        }

        previous = Some(point.temp);
    }

    Ok(())
}
