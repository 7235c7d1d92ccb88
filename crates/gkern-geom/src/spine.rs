//! Moving frames along a curve, for sweeping a profile.

use std::sync::Arc;

use gkern_math::{any_perpendicular, ConstructionError, Mat3, Tolerance, Vec3};
use tracing::trace;

use crate::deriv::unit_jet;
use crate::{CurveJet, ParametricCurve};

const DIFF_STEP: f64 = 1e-5;

/// A frame and its first two parameter derivatives.
///
/// Columns are `[N, B, T]`: `T` is the unit tangent, `N` the reference
/// vector made perpendicular to `T`, and `B = T × N`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameJet {
    /// The frame.
    pub frame: Mat3,
    /// `dF/dt`.
    pub d1: Mat3,
    /// `d²F/dt²`.
    pub d2: Mat3,
}

/// A curve carrying a reference-vector moving frame.
#[derive(Debug, Clone)]
pub struct Spine {
    curve: Arc<dyn ParametricCurve>,
    reference: Vec3,
    tol: Tolerance,
}

impl Spine {
    /// A spine along `curve` whose normal follows `reference`.
    pub fn new(curve: Arc<dyn ParametricCurve>, reference: Vec3) -> Result<Self, ConstructionError> {
        if !(reference.norm() > 0.0) || !reference.iter().all(|x| x.is_finite()) {
            return Err(ConstructionError::degenerate("spine reference vector is zero"));
        }
        if !curve.domain().is_finite() {
            return Err(ConstructionError::range("spine curve has no finite range"));
        }
        Ok(Self {
            tol: curve.tolerance(),
            curve,
            reference,
        })
    }

    /// The guiding curve.
    pub fn curve(&self) -> &Arc<dyn ParametricCurve> {
        &self.curve
    }

    /// The reference vector.
    pub fn reference(&self) -> Vec3 {
        self.reference
    }

    /// Frame and derivatives at `t`, clamped or wrapped into the domain.
    pub fn frame_jet(&self, t: f64) -> FrameJet {
        self.frame_jet_raw(self.curve.check_param(t))
    }

    /// Jet of the point `C(t) + F(t)·local` traced by a profile point with
    /// frame coordinates `local`.
    ///
    /// The first two derivatives are analytic; the third is a central
    /// difference of the second.
    pub fn sweep_jet(&self, t: f64, local: &Vec3) -> CurveJet {
        let t = self.curve.check_param(t);
        let (curve, frame) = (self.curve.eval_raw(t), self.frame_jet_raw(t));
        let h = DIFF_STEP * (1.0 + t.abs());
        let second = |s: f64| {
            let c = self.curve.eval_raw(s).d2;
            c + self.frame_jet_raw(s).d2 * local
        };
        CurveJet {
            point: curve.point + frame.frame * local,
            d1: curve.d1 + frame.d1 * local,
            d2: curve.d2 + frame.d2 * local,
            d3: (second(t + h) - second(t - h)) / (2.0 * h),
        }
    }

    fn frame_jet_raw(&self, t: f64) -> FrameJet {
        let jet = self.curve.eval_raw(t);
        let zero = Vec3::zeros();
        let (tan, tan1, tan2) = unit_jet(jet.d1, jet.d2, jet.d3)
            .unwrap_or_else(|| (self.chord_tangent(t), zero, zero));

        let mut r = self.reference;
        if r.cross(&tan).norm() <= self.tol.angular * r.norm() {
            trace!(t, "spine reference parallel to tangent");
            r = any_perpendicular(&tan);
        }
        // m = r − (r·T)T and its derivatives
        let (rt, rt1, rt2) = (r.dot(&tan), r.dot(&tan1), r.dot(&tan2));
        let m = r - tan * rt;
        let m1 = -(tan * rt1 + tan1 * rt);
        let m2 = -(tan * rt2 + tan1 * (2.0 * rt1) + tan2 * rt);
        let (n, n1, n2) =
            unit_jet(m, m1, m2).unwrap_or_else(|| (any_perpendicular(&tan), zero, zero));

        let b = tan.cross(&n);
        let b1 = tan1.cross(&n) + tan.cross(&n1);
        let b2 = tan2.cross(&n) + tan1.cross(&n1) * 2.0 + tan.cross(&n2);
        FrameJet {
            frame: Mat3::from_columns(&[n, b, tan]),
            d1: Mat3::from_columns(&[n1, b1, tan1]),
            d2: Mat3::from_columns(&[n2, b2, tan2]),
        }
    }

    /// Tangent from neighbouring points where the derivative vanishes.
    fn chord_tangent(&self, t: f64) -> Vec3 {
        let h = DIFF_STEP * (1.0 + t.abs());
        let chord = self.curve.eval_raw(t + h).point - self.curve.eval_raw(t - h).point;
        chord.try_normalize(0.0).unwrap_or_else(Vec3::z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArcCurve, BezierCurve, LineSegment};
    use gkern_math::{Placement, Point3};

    fn space_curve() -> Arc<dyn ParametricCurve> {
        Arc::new(
            BezierCurve::new(vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.5, 0.0),
                Point3::new(2.0, -0.5, 1.0),
                Point3::new(3.0, 0.0, 0.5),
            ])
            .unwrap(),
        )
    }

    fn is_orthonormal(m: &Mat3) -> bool {
        (m.transpose() * m - Mat3::identity()).norm() < 1e-12
    }

    #[test]
    fn test_line_frame_is_constant() {
        let line: Arc<dyn ParametricCurve> =
            Arc::new(LineSegment::from_points(Point3::origin(), Point3::new(2.0, 0.0, 0.0)).unwrap());
        let spine = Spine::new(line, Vec3::z()).unwrap();
        let f = spine.frame_jet(0.5);
        assert!((f.frame.column(0) - Vec3::z()).norm() < 1e-12);
        assert!((f.frame.column(1) + Vec3::y()).norm() < 1e-12);
        assert!((f.frame.column(2) - Vec3::x()).norm() < 1e-12);
        assert!(f.d1.norm() < 1e-12 && f.d2.norm() < 1e-12);
    }

    #[test]
    fn test_circle_sweep_is_wider_circle() {
        let circle: Arc<dyn ParametricCurve> =
            Arc::new(ArcCurve::circle(Placement::identity(), 1.0).unwrap());
        let spine = Spine::new(circle, Vec3::z()).unwrap();
        let t = 0.7_f64;
        let (s, c) = t.sin_cos();
        let jet = spine.sweep_jet(t, &Vec3::new(0.0, 1.0, 0.0));
        assert!((jet.point - Point3::new(2.0 * c, 2.0 * s, 0.0)).norm() < 1e-12);
        assert!((jet.d1 - Vec3::new(-2.0 * s, 2.0 * c, 0.0)).norm() < 1e-12);
        assert!((jet.d2 + Vec3::new(2.0 * c, 2.0 * s, 0.0)).norm() < 1e-12);
        assert!((jet.d3 - Vec3::new(2.0 * s, -2.0 * c, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_frame_derivatives_match_differences() {
        let spine = Spine::new(space_curve(), Vec3::new(0.0, 0.3, 1.0)).unwrap();
        let h = 1e-5;
        for &t in &[0.2, 0.5, 0.8] {
            let f = spine.frame_jet(t);
            assert!(is_orthonormal(&f.frame));
            let (a, b) = (spine.frame_jet(t + h), spine.frame_jet(t - h));
            let fd1 = (a.frame - b.frame) / (2.0 * h);
            let fd2 = (a.d1 - b.d1) / (2.0 * h);
            assert!((fd1 - f.d1).norm() < 1e-6 * (1.0 + f.d1.norm()));
            assert!((fd2 - f.d2).norm() < 1e-6 * (1.0 + f.d2.norm()));
        }
    }

    #[test]
    fn test_sweep_jet_matches_differences() {
        let spine = Spine::new(space_curve(), Vec3::z()).unwrap();
        let local = Vec3::new(0.2, -0.1, 0.05);
        let h = 1e-5;
        let t = 0.4;
        let jet = spine.sweep_jet(t, &local);
        let (a, b) = (spine.sweep_jet(t + h, &local), spine.sweep_jet(t - h, &local));
        assert!(((a.point - b.point) / (2.0 * h) - jet.d1).norm() < 1e-6 * (1.0 + jet.d1.norm()));
        assert!(((a.d1 - b.d1) / (2.0 * h) - jet.d2).norm() < 1e-6 * (1.0 + jet.d2.norm()));
    }

    #[test]
    fn test_reference_along_tangent_falls_back() {
        let line: Arc<dyn ParametricCurve> =
            Arc::new(LineSegment::from_points(Point3::origin(), Point3::new(0.0, 0.0, 1.0)).unwrap());
        let spine = Spine::new(line, Vec3::z()).unwrap();
        let f = spine.frame_jet(0.5);
        assert!(is_orthonormal(&f.frame));
        assert!(f.frame.column(0).dot(&Vec3::z()).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_zero_reference() {
        assert!(Spine::new(space_curve(), Vec3::zeros()).is_err());
    }
}
