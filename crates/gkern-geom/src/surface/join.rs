use std::any::Any;
use std::sync::Arc;

use gkern_math::{ConstructionError, KernelConfig, ParamInterval, ParamRect, Point3, Tolerance, Vec3};

use super::{ParametricSurface, SurfaceKind};
use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::blend::{hermite, BlendKind};
use crate::curve::unit_curve_jet;
use crate::{CurveJet, DerivOrder, ParametricCurve, Registry, SurfaceJet};

/// A surface spanning two curves.
///
/// Both curves are reparameterized onto `u ∈ [0, 1]`; `v` runs from the
/// first curve (`v = 0`) to the second (`v = 1`):
///
/// ```text
/// P(u, v) = w0(v)·C0(u) + w1(v)·C1(u) + h2(v)·T0 + h3(v)·T1
/// ```
///
/// `w0, w1` are the end weights of the [`BlendKind`]; the tangent terms
/// are present only when cross tangents `[T0, T1]` were given, which
/// requires the cubic blend. Then `∂P/∂v` equals `T0` along `v = 0` and
/// `T1` along `v = 1`.
#[derive(Debug, Clone)]
pub struct JoinSurface {
    first: Arc<dyn ParametricCurve>,
    second: Arc<dyn ParametricCurve>,
    blend: BlendKind,
    tangents: Option<[Vec3; 2]>,
    tol: Tolerance,
}

impl JoinSurface {
    /// Join `first` and `second`.
    pub fn new(
        first: Arc<dyn ParametricCurve>,
        second: Arc<dyn ParametricCurve>,
        blend: BlendKind,
        tangents: Option<[Vec3; 2]>,
    ) -> Result<Self, ConstructionError> {
        for curve in [&first, &second] {
            let domain = curve.domain();
            if !domain.is_finite() || domain.is_empty() {
                return Err(ConstructionError::range("joined curve has no finite range"));
            }
        }
        if let Some(t) = &tangents {
            if blend == BlendKind::Linear {
                return Err(ConstructionError::range("cross tangents need the cubic blend"));
            }
            if t.iter().any(|v| !v.iter().all(|x| x.is_finite())) {
                return Err(ConstructionError::range("cross tangents are not finite"));
            }
        }
        Ok(Self {
            first,
            second,
            blend,
            tangents,
            tol: Tolerance::DEFAULT,
        })
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Curve along `v = 0`.
    pub fn first(&self) -> &Arc<dyn ParametricCurve> {
        &self.first
    }

    /// Curve along `v = 1`.
    pub fn second(&self) -> &Arc<dyn ParametricCurve> {
        &self.second
    }

    /// End weight kind.
    pub fn blend(&self) -> BlendKind {
        self.blend
    }

    /// Cross tangents at `v = 0` and `v = 1`, if any.
    pub fn tangents(&self) -> Option<[Vec3; 2]> {
        self.tangents
    }
}

impl ParametricSurface for JoinSurface {
    fn domain(&self) -> ParamRect {
        ParamRect::new(ParamInterval::unit(), ParamInterval::unit())
    }

    fn eval_raw(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        let a = unit_curve_jet(self.first.as_ref(), u);
        let b = unit_curve_jet(self.second.as_ref(), u);
        let term = |jet: &CurveJet, i: usize| {
            if i == 0 {
                jet.point.coords
            } else {
                jet.derivative(i)
            }
        };
        let partial = |i: usize, k: usize| -> Vec3 {
            let w = self.blend.weights(v, k);
            let mut sum = term(&a, i) * w[0] + term(&b, i) * w[1];
            if let (0, Some([t0, t1])) = (i, &self.tangents) {
                let h = hermite(v, k);
                sum += t0 * h[2] + t1 * h[3];
            }
            sum
        };

        let mut jet = SurfaceJet::at(Point3::from(partial(0, 0)));
        for (i, k) in SurfaceJet::multi_indices(order) {
            jet.set_partial(i, k, partial(i, k));
        }
        jet
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Join
    }

    fn transformed(
        &self,
        reg: &mut Registry,
    ) -> Result<Arc<dyn ParametricSurface>, ConstructionError> {
        let tangents = self
            .tangents
            .map(|t| t.map(|v| reg.transform().apply_vec(&v)));
        Ok(Arc::new(Self {
            first: reg.map_curve(&self.first)?,
            second: reg.map_curve(&self.second)?,
            blend: self.blend,
            tangents,
            tol: self.tol,
        }))
    }

    fn encode(&self, writer: &mut ArchiveWriter) -> SurfaceRecord {
        SurfaceRecord::Join {
            first: writer.prepare_write_curve(&self.first),
            second: writer.prepare_write_curve(&self.second),
            blend: self.blend,
            tangents: self.tangents,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tolerance(&self) -> Tolerance {
        self.tol
    }

    fn is_similar(&self, other: &dyn ParametricSurface) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        let eps = self.tol.metric.max(other.tol.metric);
        let tangents_match = match (self.tangents, other.tangents) {
            (None, None) => true,
            (Some(a), Some(b)) => (a[0] - b[0]).norm() <= eps && (a[1] - b[1]).norm() <= eps,
            _ => false,
        };
        self.blend == other.blend
            && tangents_match
            && self.first.is_similar(other.first.as_ref())
            && self.second.is_similar(other.second.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::testing::check_partials;
    use crate::{ArcCurve, LineSegment};
    use gkern_math::Placement;

    fn lines() -> (Arc<dyn ParametricCurve>, Arc<dyn ParametricCurve>) {
        (
            Arc::new(LineSegment::from_points(Point3::origin(), Point3::new(2.0, 0.0, 0.0)).unwrap()),
            Arc::new(
                LineSegment::from_points(Point3::new(0.0, 1.0, 1.0), Point3::new(2.0, 1.0, 1.0))
                    .unwrap(),
            ),
        )
    }

    #[test]
    fn test_linear_join_is_ruled() {
        let (a, b) = lines();
        let s = JoinSurface::new(a, b, BlendKind::Linear, None).unwrap();
        assert!((s.point_on(0.5, 0.5) - Point3::new(1.0, 0.5, 0.5)).norm() < 1e-12);
        let jet = s.jet(0.3, 0.7, DerivOrder::Second);
        assert!((jet.dv - Vec3::new(0.0, 1.0, 1.0)).norm() < 1e-12);
        assert!(jet.dvv.norm() < 1e-12);
    }

    #[test]
    fn test_cross_tangents_are_honored() {
        let (a, b) = lines();
        let t0 = Vec3::new(0.0, 0.0, 2.0);
        let t1 = Vec3::new(0.0, 2.0, 0.0);
        let s = JoinSurface::new(a, b, BlendKind::Cubic, Some([t0, t1])).unwrap();
        for &u in &[0.0, 0.4, 1.0] {
            assert!((s.derive_v(u, 0.0) - t0).norm() < 1e-12);
            assert!((s.derive_v(u, 1.0) - t1).norm() < 1e-12);
        }
        assert!((s.point_on(1.0, 1.0) - Point3::new(2.0, 1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_join_partials() {
        let circle: Arc<dyn ParametricCurve> = Arc::new(
            ArcCurve::circle(
                Placement::from_axis(Point3::new(0.0, 0.0, 1.0), Vec3::z(), Vec3::x()).unwrap(),
                0.5,
            )
            .unwrap(),
        );
        let base: Arc<dyn ParametricCurve> =
            Arc::new(ArcCurve::circle(Placement::identity(), 1.0).unwrap());
        let tangents = Some([Vec3::new(0.1, 0.0, 1.0), Vec3::new(0.0, 0.2, 0.5)]);
        for (blend, t) in [
            (BlendKind::Linear, None),
            (BlendKind::Cubic, None),
            (BlendKind::Cubic, tangents),
        ] {
            let s = JoinSurface::new(Arc::clone(&base), Arc::clone(&circle), blend, t).unwrap();
            check_partials(&s, 0.3, 0.6, 1e-6);
        }
    }

    #[test]
    fn test_linear_blend_rejects_tangents() {
        let (a, b) = lines();
        assert!(JoinSurface::new(a, b, BlendKind::Linear, Some([Vec3::x(), Vec3::y()])).is_err());
    }
}
