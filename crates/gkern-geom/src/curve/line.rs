use std::any::Any;
use std::sync::Arc;

use gkern_math::{ConstructionError, KernelConfig, ParamInterval, Point3, Tolerance, Vec3};

use super::{CurveKind, ParametricCurve};
use crate::archive::{ArchiveWriter, CurveRecord};
use crate::{CurveJet, Registry};

/// A straight line segment.
///
/// Parameterization: `P(t) = origin + t * direction` for `t` in the domain.
#[derive(Debug, Clone)]
pub struct LineSegment {
    origin: Point3,
    direction: Vec3,
    domain: ParamInterval,
    tol: Tolerance,
}

impl LineSegment {
    /// A line through `origin` along `direction`, trimmed to `domain`.
    pub fn new(
        origin: Point3,
        direction: Vec3,
        domain: ParamInterval,
    ) -> Result<Self, ConstructionError> {
        if !(direction.norm() > 0.0) {
            return Err(ConstructionError::degenerate("line direction is zero"));
        }
        if domain.is_empty() || !domain.is_finite() || domain.closed {
            return Err(ConstructionError::range(format!(
                "line segment needs a finite open domain, got [{}, {}]",
                domain.min, domain.max
            )));
        }
        Ok(Self {
            origin,
            direction,
            domain,
            tol: Tolerance::DEFAULT,
        })
    }

    /// A segment from `start` (t = 0) to `end` (t = 1).
    pub fn from_points(start: Point3, end: Point3) -> Result<Self, ConstructionError> {
        let direction = end - start;
        if Tolerance::DEFAULT.is_zero(direction.norm()) {
            return Err(ConstructionError::degenerate("segment endpoints coincide"));
        }
        Self::new(start, direction, ParamInterval::unit())
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Point at `t = 0`.
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// Derivative along the segment.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }
}

impl ParametricCurve for LineSegment {
    fn domain(&self) -> ParamInterval {
        self.domain
    }

    fn eval_raw(&self, t: f64) -> CurveJet {
        CurveJet {
            d1: self.direction,
            ..CurveJet::at(self.origin + self.direction * t)
        }
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn transformed(&self, reg: &mut Registry) -> Result<Arc<dyn ParametricCurve>, ConstructionError> {
        let t = reg.transform();
        let line = Self::new(t.apply_point(&self.origin), t.apply_vec(&self.direction), self.domain)?;
        Ok(Arc::new(Self { tol: self.tol, ..line }))
    }

    fn encode(&self, _writer: &mut ArchiveWriter) -> CurveRecord {
        CurveRecord::Line {
            origin: self.origin,
            direction: self.direction,
            domain: self.domain,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tolerance(&self) -> Tolerance {
        self.tol
    }

    fn is_similar(&self, other: &dyn ParametricCurve) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        let eps = self.tol.metric.max(other.tol.metric);
        (self.start_point() - other.start_point()).norm() <= eps
            && (self.end_point() - other.end_point()).norm() <= eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::testing::check_derivatives;

    #[test]
    fn test_line_eval() {
        let line = LineSegment::from_points(Point3::origin(), Point3::new(10.0, 0.0, 0.0)).unwrap();
        let pt = line.point_on(0.5);
        assert!((pt.x - 5.0).abs() < 1e-12);
        assert!((line.end_point().x - 10.0).abs() < 1e-12);
        check_derivatives(&line, 0.3, 1e-8);
    }

    #[test]
    fn test_line_rejects_bad_input() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert!(matches!(
            LineSegment::from_points(p, p),
            Err(ConstructionError::DegenerateGeometry(_))
        ));
        assert!(matches!(
            LineSegment::new(p, Vec3::x(), ParamInterval::full_turn()),
            Err(ConstructionError::InvalidParameterRange(_))
        ));
    }

    #[test]
    fn test_line_similarity_is_symmetric() {
        let a = LineSegment::from_points(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap();
        let b = LineSegment::new(
            Point3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
            ParamInterval::bounded(2.0, 4.0).unwrap(),
        )
        .unwrap();
        let c = LineSegment::from_points(Point3::origin(), Point3::new(1.0, 1.0, 0.0)).unwrap();
        assert!(a.is_similar(&b) && b.is_similar(&a));
        assert!(!a.is_similar(&c) && !c.is_similar(&a));
    }

    #[test]
    fn test_line_transform() {
        let line = LineSegment::from_points(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap();
        let mut reg = Registry::new(gkern_math::Transform::scale(2.0, 1.0, 1.0));
        let moved = line.transformed(&mut reg).unwrap();
        assert!((moved.end_point() - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
