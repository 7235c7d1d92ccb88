//! Parametric curves and the curve evaluation facade.

mod arc;
mod bezier;
mod line;
mod nurbs;

pub use arc::ArcCurve;
pub use bezier::BezierCurve;
pub use line::LineSegment;
pub use nurbs::{find_span, validate_knots, NurbsCurve};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use gkern_math::{
    reserve_for, AllocPolicy, BoundingBox, ConstructionError, Dir3, ParamInterval, Point3,
    Tolerance, Vec3,
};

use crate::archive::{ArchiveWriter, CurveRecord};
use crate::{CurveJet, DerivOrder, Extension, Registry};

/// The kind of a curve (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveKind {
    /// Straight segment.
    Line,
    /// Circular or elliptical arc.
    Arc,
    /// Bezier curve.
    Bezier,
    /// Rational B-spline.
    Nurbs,
}

/// Result of [`ParametricCurve::explore`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveEval {
    /// Parameter actually evaluated (after clamp/wrap on the checked path).
    pub t: f64,
    /// `C(t)`.
    pub point: Point3,
    /// `C'(t)`.
    pub first: Vec3,
    /// `C''(t)`, when requested.
    pub second: Option<Vec3>,
    /// `C'''(t)`, when requested.
    pub third: Option<Vec3>,
}

/// A parametric curve in 3D space.
///
/// Implementors provide the analytic jet at a literal parameter
/// ([`eval_raw`](Self::eval_raw)); every other query is built on top of it.
/// Queries without the `_ext` suffix clamp (open curves) or wrap (closed
/// curves) their parameter into [`domain`](Self::domain) first.
pub trait ParametricCurve: Send + Sync + fmt::Debug {
    /// Parameter domain.
    fn domain(&self) -> ParamInterval;

    /// Point and first three derivatives at the literal parameter `t`.
    fn eval_raw(&self, t: f64) -> CurveJet;

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// The image of this curve under the registry's transform.
    fn transformed(&self, reg: &mut Registry) -> Result<Arc<dyn ParametricCurve>, ConstructionError>;

    /// Persistent record of this curve.
    fn encode(&self, writer: &mut ArchiveWriter) -> CurveRecord;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Tolerances captured at construction.
    fn tolerance(&self) -> Tolerance {
        Tolerance::DEFAULT
    }

    /// Whether `other` describes the same geometry. Symmetric.
    fn is_similar(&self, _other: &dyn ParametricCurve) -> bool {
        false
    }

    // -------------------------------------------------------------------------
    // Facade
    // -------------------------------------------------------------------------

    /// Clamp or wrap `t` into the domain.
    fn check_param(&self, t: f64) -> f64 {
        self.domain().clamp_or_wrap(t)
    }

    /// Whether the curve is periodic.
    fn is_closed(&self) -> bool {
        self.domain().closed
    }

    /// Point and derivatives up to `order`.
    fn explore(&self, t: f64, ext: Extension, order: DerivOrder) -> CurveEval {
        let t = match ext {
            Extension::Checked => self.check_param(t),
            Extension::Extended => t,
        };
        let jet = self.eval_raw(t);
        CurveEval {
            t,
            point: jet.point,
            first: jet.d1,
            second: (order >= DerivOrder::Second).then_some(jet.d2),
            third: (order >= DerivOrder::Third).then_some(jet.d3),
        }
    }

    /// Point at `t`.
    fn point_on(&self, t: f64) -> Point3 {
        self.eval_raw(self.check_param(t)).point
    }

    /// Point at the literal `t`, extrapolating beyond the domain.
    fn point_on_ext(&self, t: f64) -> Point3 {
        self.eval_raw(t).point
    }

    /// First derivative at `t`.
    fn first_der(&self, t: f64) -> Vec3 {
        self.eval_raw(self.check_param(t)).d1
    }

    /// First derivative at the literal `t`.
    fn first_der_ext(&self, t: f64) -> Vec3 {
        self.eval_raw(t).d1
    }

    /// Second derivative at `t`.
    fn second_der(&self, t: f64) -> Vec3 {
        self.eval_raw(self.check_param(t)).d2
    }

    /// Third derivative at `t`.
    fn third_der(&self, t: f64) -> Vec3 {
        self.eval_raw(self.check_param(t)).d3
    }

    /// Unit tangent at `t`, `None` where the derivative vanishes.
    fn tangent(&self, t: f64) -> Option<Dir3> {
        Dir3::try_new(self.first_der(t), 1e-300)
    }

    /// Point at the start of the domain.
    fn start_point(&self) -> Point3 {
        self.eval_raw(self.domain().min).point
    }

    /// Point at the end of the domain.
    fn end_point(&self) -> Point3 {
        self.eval_raw(self.domain().max).point
    }

    /// Append `count` evenly spaced parameters covering the domain.
    ///
    /// Closed curves leave out the end parameter, which repeats the start.
    fn sample_params(
        &self,
        count: usize,
        out: &mut Vec<f64>,
        policy: AllocPolicy,
    ) -> Result<(), ConstructionError> {
        if count < 2 {
            return Err(ConstructionError::insufficient(
                "curve sampling needs at least two parameters",
            ));
        }
        reserve_for(out, count, policy)?;
        let d = self.domain();
        let steps = if d.closed { count } else { count - 1 };
        out.extend((0..count).map(|i| d.from_unit(i as f64 / steps as f64)));
        Ok(())
    }

    /// Box around `samples` points spread over the domain.
    fn bounding_box(&self, samples: usize) -> BoundingBox {
        let d = self.domain();
        let n = samples.max(2);
        let mut bbox = BoundingBox::empty();
        for i in 0..=n {
            bbox.include_point(&self.eval_raw(d.from_unit(i as f64 / n as f64)).point);
        }
        bbox
    }
}

/// Jet of `curve` reparameterized onto `[0, 1]`.
pub(crate) fn unit_curve_jet(curve: &dyn ParametricCurve, s: f64) -> CurveJet {
    let domain = curve.domain();
    curve.eval_raw(domain.from_unit(s)).scaled(domain.length())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Compare each analytic derivative with a central difference of the one
    /// below it.
    pub fn check_derivatives(curve: &dyn ParametricCurve, t: f64, tol: f64) {
        let h = 1e-5;
        let lo = curve.eval_raw(t - h);
        let hi = curve.eval_raw(t + h);
        let jet = curve.eval_raw(t);
        let fd1 = (hi.point - lo.point) / (2.0 * h);
        let fd2 = (hi.d1 - lo.d1) / (2.0 * h);
        let fd3 = (hi.d2 - lo.d2) / (2.0 * h);
        let scale = 1.0 + jet.d1.norm() + jet.d2.norm() + jet.d3.norm();
        assert!((fd1 - jet.d1).norm() < tol * scale, "d1 at {t}: {fd1} vs {}", jet.d1);
        assert!((fd2 - jet.d2).norm() < tol * scale, "d2 at {t}: {fd2} vs {}", jet.d2);
        assert!((fd3 - jet.d3).norm() < tol * scale, "d3 at {t}: {fd3} vs {}", jet.d3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_and_extended_paths() {
        let line = LineSegment::from_points(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap();
        assert!((line.point_on(2.0) - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-15);
        assert!((line.point_on_ext(2.0) - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-15);

        let e = line.explore(-1.0, Extension::Checked, DerivOrder::First);
        assert_eq!(e.t, 0.0);
        assert!(e.second.is_none() && e.third.is_none());
        let e = line.explore(-1.0, Extension::Extended, DerivOrder::Third);
        assert_eq!(e.t, -1.0);
        assert_eq!(e.second, Some(Vec3::zeros()));
        assert_eq!(e.third, Some(Vec3::zeros()));
    }

    #[test]
    fn test_closed_curve_wraps() {
        let circle = ArcCurve::circle(gkern_math::Placement::identity(), 2.0).unwrap();
        assert!(circle.is_closed());
        let tau = std::f64::consts::TAU;
        assert_eq!(circle.point_on(tau), circle.point_on(0.0));
        assert!((circle.point_on(tau + 1.0) - circle.point_on(1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_sample_params() {
        let line = LineSegment::from_points(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap();
        let mut out = vec![-1.0];
        line.sample_params(5, &mut out, AllocPolicy::Propagate).unwrap();
        assert_eq!(out, vec![-1.0, 0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(line.sample_params(1, &mut out, AllocPolicy::Propagate).is_err());

        let circle = ArcCurve::circle(gkern_math::Placement::identity(), 1.0).unwrap();
        let mut ts = Vec::new();
        circle.sample_params(4, &mut ts, AllocPolicy::Propagate).unwrap();
        assert_eq!(ts.len(), 4);
        assert!(ts[3] < std::f64::consts::TAU);
    }

    #[test]
    fn test_unit_curve_jet_rescales_derivatives() {
        let range = ParamInterval::bounded(2.0, 4.0).unwrap();
        let line = LineSegment::new(Point3::origin(), Vec3::new(0.0, 3.0, 4.0), range).unwrap();
        let jet = unit_curve_jet(&line, 0.5);
        assert!((jet.point - line.point_on(3.0)).norm() < 1e-12);
        assert!((jet.d1 - line.first_der(3.0) * 2.0).norm() < 1e-12);

        let circle = ArcCurve::circle(gkern_math::Placement::identity(), 1.0).unwrap();
        let jet = unit_curve_jet(&circle, 0.25);
        let tau = std::f64::consts::TAU;
        assert!((jet.point - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((jet.d1 - Vec3::new(-tau, 0.0, 0.0)).norm() < 1e-12);
        assert!((jet.d2 - Vec3::new(0.0, -tau * tau, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_tangent_and_bbox() {
        let line = LineSegment::from_points(Point3::origin(), Point3::new(0.0, 3.0, 4.0)).unwrap();
        let t = line.tangent(0.3).unwrap();
        assert!((t.as_ref() - Vec3::new(0.0, 0.6, 0.8)).norm() < 1e-12);
        let bbox = line.bounding_box(4);
        assert!((bbox.diagonal() - 5.0).abs() < 1e-12);
    }
}
