//! Parametric intervals and rectangles.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::ConstructionError;

/// A one-dimensional parametric domain `[min, max]`.
///
/// When `closed` is set the domain is periodic with period `max - min`, and
/// `max` denotes the same geometric location as `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamInterval {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Whether the domain is periodic.
    pub closed: bool,
}

impl ParamInterval {
    /// A bounded, non-periodic interval.
    pub fn bounded(min: f64, max: f64) -> Result<Self, ConstructionError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConstructionError::range(format!(
                "interval [{min}, {max}] is not a finite ordered range"
            )));
        }
        Ok(Self {
            min,
            max,
            closed: false,
        })
    }

    /// A periodic interval `[min, min + period)`.
    pub fn periodic(min: f64, period: f64) -> Result<Self, ConstructionError> {
        if !min.is_finite() || !period.is_finite() || period <= 0.0 {
            return Err(ConstructionError::range(format!(
                "period {period} starting at {min} is not positive and finite"
            )));
        }
        Ok(Self {
            min,
            max: min + period,
            closed: true,
        })
    }

    /// The unit interval `[0, 1]`.
    pub const fn unit() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            closed: false,
        }
    }

    /// The angular interval `[0, 2π)`.
    pub const fn full_turn() -> Self {
        Self {
            min: 0.0,
            max: TAU,
            closed: true,
        }
    }

    /// An empty interval; `include` grows it.
    pub const fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            closed: false,
        }
    }

    /// Whether the interval holds no value.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Width of the interval, zero when empty.
    pub fn length(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max - self.min
        }
    }

    /// Period of a closed interval.
    pub fn period(&self) -> Option<f64> {
        self.closed.then(|| self.max - self.min)
    }

    /// Whether `t` lies in `[min - eps, max + eps]`.
    pub fn contains(&self, t: f64, eps: f64) -> bool {
        self.min - eps <= t && t <= self.max + eps
    }

    /// Grow the interval to include `t`.
    ///
    /// A closed interval that has to grow stops being periodic.
    pub fn include(&mut self, t: f64) {
        if self.is_empty() {
            self.min = t;
            self.max = t;
            return;
        }
        if t < self.min || t > self.max {
            self.min = self.min.min(t);
            self.max = self.max.max(t);
            self.closed = false;
        }
    }

    /// Replace the bounds.
    ///
    /// Periodicity survives only when the new span equals the old period.
    pub fn set_limit(&mut self, min: f64, max: f64) -> Result<(), ConstructionError> {
        let mut next = Self::bounded(min, max)?;
        if let Some(period) = self.period() {
            next.closed = ((max - min) - period).abs() <= f64::EPSILON * period.max(1.0) * 4.0;
        }
        *self = next;
        Ok(())
    }

    /// Intersection with another interval, never periodic.
    pub fn intersect(&self, other: &Self) -> Self {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min > max {
            Self::empty()
        } else {
            Self {
                min,
                max,
                closed: false,
            }
        }
    }

    /// Saturate `t` into `[min, max]`.
    pub fn clamp(&self, t: f64) -> f64 {
        if self.is_empty() {
            t
        } else {
            t.clamp(self.min, self.max)
        }
    }

    /// Reduce `t` into `[min, max)` by whole periods.
    ///
    /// The period count is found with a single `floor`, so the result does
    /// not drift no matter how many periods away `t` starts.
    pub fn wrap(&self, t: f64) -> f64 {
        let period = self.max - self.min;
        if !(period > 0.0) || !t.is_finite() {
            return self.clamp(t);
        }
        let k = ((t - self.min) * period.recip()).floor();
        let mut r = t - k * period;
        if r < self.min {
            r += period;
        }
        if r >= self.max {
            r = self.min;
        }
        r
    }

    /// Wrap on closed domains, clamp on open ones.
    pub fn clamp_or_wrap(&self, t: f64) -> f64 {
        if self.closed {
            self.wrap(t)
        } else {
            self.clamp(t)
        }
    }

    /// Whether `a` and `b` denote the same location, honoring periodicity.
    pub fn is_same_param(&self, a: f64, b: f64, eps: f64) -> bool {
        match self.period() {
            Some(period) => {
                let d = (self.wrap(a) - self.wrap(b)).abs();
                d <= eps || period - d <= eps
            }
            None => (a - b).abs() <= eps,
        }
    }

    /// Map `t` to the normalized coordinate `w` (0 at `min`, 1 at `max`).
    pub fn to_unit(&self, t: f64) -> f64 {
        (t - self.min) / (self.max - self.min)
    }

    /// Map a normalized coordinate back to the interval.
    pub fn from_unit(&self, w: f64) -> f64 {
        self.min + w * (self.max - self.min)
    }

    /// Whether both bounds are finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

/// A rectangular parametric domain `u × v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRect {
    /// Domain of the first parameter.
    pub u: ParamInterval,
    /// Domain of the second parameter.
    pub v: ParamInterval,
}

impl ParamRect {
    /// Build a rectangle from two intervals.
    pub fn new(u: ParamInterval, v: ParamInterval) -> Self {
        Self { u, v }
    }

    /// An empty rectangle.
    pub const fn empty() -> Self {
        Self {
            u: ParamInterval::empty(),
            v: ParamInterval::empty(),
        }
    }

    /// Whether `(u, v)` lies inside, with slack `eps`.
    pub fn contains(&self, u: f64, v: f64, eps: f64) -> bool {
        self.u.contains(u, eps) && self.v.contains(v, eps)
    }

    /// Grow to include `(u, v)`.
    pub fn include_point(&mut self, u: f64, v: f64) {
        self.u.include(u);
        self.v.include(v);
    }

    /// Intersection with another rectangle.
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            u: self.u.intersect(&other.u),
            v: self.v.intersect(&other.v),
        }
    }

    /// Whether either side is empty.
    pub fn is_empty(&self) -> bool {
        self.u.is_empty() || self.v.is_empty()
    }

    /// Apply [`ParamInterval::clamp_or_wrap`] on both axes.
    pub fn clamp_or_wrap(&self, u: f64, v: f64) -> (f64, f64) {
        (self.u.clamp_or_wrap(u), self.v.clamp_or_wrap(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_bounded_rejects_inverted() {
        assert!(ParamInterval::bounded(1.0, 0.0).is_err());
        assert!(ParamInterval::bounded(0.0, f64::INFINITY).is_err());
        assert!(ParamInterval::periodic(0.0, 0.0).is_err());
    }

    #[test]
    fn test_wrap_max_maps_to_min() {
        let d = ParamInterval::full_turn();
        assert_eq!(d.clamp_or_wrap(2.0 * PI), 0.0);
        assert_eq!(d.clamp_or_wrap(0.0), 0.0);
        assert!((d.clamp_or_wrap(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_large_multiples() {
        let d = ParamInterval::periodic(-1.0, 3.0).unwrap();
        let base = 0.25;
        for k in [-1_000_000i64, -7, 0, 3, 1_000_000] {
            let w = d.clamp_or_wrap(base + k as f64 * 3.0);
            assert!((w - base).abs() < 1e-8, "k={k} -> {w}");
        }
    }

    #[test]
    fn test_clamp_saturates() {
        let d = ParamInterval::bounded(-2.0, 5.0).unwrap();
        assert_eq!(d.clamp_or_wrap(5.0 + 1e-3), 5.0);
        assert_eq!(d.clamp_or_wrap(-2.0 - 1e9), -2.0);
        assert_eq!(d.clamp_or_wrap(1.5), 1.5);
    }

    #[test]
    fn test_include_and_set_limit() {
        let mut d = ParamInterval::empty();
        assert!(d.is_empty());
        d.include(3.0);
        d.include(-1.0);
        assert_eq!((d.min, d.max), (-1.0, 3.0));

        let mut turn = ParamInterval::full_turn();
        turn.include(7.0);
        assert!(!turn.closed);

        let mut turn = ParamInterval::full_turn();
        turn.set_limit(PI, 3.0 * PI).unwrap();
        assert!(turn.closed);
        turn.set_limit(0.0, PI).unwrap();
        assert!(!turn.closed);
        assert!(turn.set_limit(2.0, 1.0).is_err());
        assert_eq!(turn.max, PI);
    }

    #[test]
    fn test_same_param_periodic() {
        let d = ParamInterval::full_turn();
        assert!(d.is_same_param(0.0, 2.0 * PI, 1e-12));
        assert!(d.is_same_param(1e-13, 2.0 * PI - 1e-13, 1e-12));
        let open = ParamInterval::unit();
        assert!(!open.is_same_param(0.0, 1.0, 1e-12));
    }

    #[test]
    fn test_rect_intersect_and_contains() {
        let a = ParamRect::new(ParamInterval::unit(), ParamInterval::unit());
        let b = ParamRect::new(
            ParamInterval::bounded(0.5, 2.0).unwrap(),
            ParamInterval::bounded(-1.0, 0.25).unwrap(),
        );
        let c = a.intersect(&b);
        assert!(c.contains(0.75, 0.1, 0.0));
        assert!(!c.contains(0.25, 0.1, 0.0));
        let far = ParamRect::new(
            ParamInterval::bounded(5.0, 6.0).unwrap(),
            ParamInterval::unit(),
        );
        assert!(a.intersect(&far).is_empty());
    }
}
