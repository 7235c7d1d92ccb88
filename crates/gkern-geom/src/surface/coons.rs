use std::any::Any;
use std::sync::Arc;

use gkern_math::{ConstructionError, KernelConfig, ParamInterval, ParamRect, Point3, Tolerance, Vec3};
use tracing::instrument;

use super::{ParametricSurface, SurfaceKind};
use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::blend::hermite;
use crate::curve::unit_curve_jet;
use crate::{CurveJet, DerivOrder, ParametricCurve, Registry, SurfaceJet};

/// A patch interpolating four boundary curves.
///
/// Curves are ordered `[c0, c1, d0, d1]`: `c0` runs along `v = 0`, `c1`
/// along `v = 1`, `d0` along `u = 0` and `d1` along `u = 1`. Each curve is
/// reparameterized onto `[0, 1]`. With `h0, h1` the value-carrying
/// Hermite functions and `Pab` the corners:
///
/// ```text
/// P(u, v) = h0(v)·c0(u) + h1(v)·c1(u) + h0(u)·d0(v) + h1(u)·d1(v)
///         − Σ ha(u)·hb(v)·Pab
/// ```
#[derive(Debug, Clone)]
pub struct CoonsSurface {
    curves: [Arc<dyn ParametricCurve>; 4],
    corners: [Point3; 4],
    tol: Tolerance,
}

impl CoonsSurface {
    /// Build a patch from `[c0, c1, d0, d1]`.
    ///
    /// The curves must meet at the four corners within linear tolerance.
    #[instrument(level = "debug", skip_all)]
    pub fn new(curves: [Arc<dyn ParametricCurve>; 4]) -> Result<Self, ConstructionError> {
        let tol = Tolerance::DEFAULT;
        if curves.iter().any(|c| !c.domain().is_finite() || c.domain().is_empty()) {
            return Err(ConstructionError::range("coons boundary curve has no finite range"));
        }
        let corners = corners_of(&curves, &tol)?;
        Ok(Self {
            curves,
            corners,
            tol,
        })
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Boundary curves `[c0, c1, d0, d1]`.
    pub fn curves(&self) -> &[Arc<dyn ParametricCurve>; 4] {
        &self.curves
    }

    /// Corners `[P00, P10, P01, P11]`.
    pub fn corners(&self) -> &[Point3; 4] {
        &self.corners
    }
}

fn corners_of(
    curves: &[Arc<dyn ParametricCurve>; 4],
    tol: &Tolerance,
) -> Result<[Point3; 4], ConstructionError> {
    let [c0, c1, d0, d1] = curves;
    let pairs = [
        (c0.start_point(), d0.start_point()),
        (c0.end_point(), d1.start_point()),
        (c1.start_point(), d0.end_point()),
        (c1.end_point(), d1.end_point()),
    ];
    for (corner, (a, b)) in pairs.iter().enumerate() {
        if !tol.points_equal(a, b) {
            return Err(ConstructionError::degenerate(format!(
                "coons boundary curves do not meet at corner {corner}: gap {}",
                (a - b).norm()
            )));
        }
    }
    Ok(pairs.map(|(a, _)| a))
}

impl ParametricSurface for CoonsSurface {
    fn domain(&self) -> ParamRect {
        ParamRect::new(ParamInterval::unit(), ParamInterval::unit())
    }

    fn eval_raw(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        let [c0, c1, d0, d1] = &self.curves;
        let (c0, c1) = (unit_curve_jet(c0.as_ref(), u), unit_curve_jet(c1.as_ref(), u));
        let (d0, d1) = (unit_curve_jet(d0.as_ref(), v), unit_curve_jet(d1.as_ref(), v));
        let curve_term = |jet: &CurveJet, k: usize| {
            if k == 0 {
                jet.point.coords
            } else {
                jet.derivative(k)
            }
        };

        let partial = |i: usize, k: usize| -> Vec3 {
            let (hu, hv) = (hermite(u, i), hermite(v, k));
            let mut sum = curve_term(&c0, i) * hv[0]
                + curve_term(&c1, i) * hv[1]
                + curve_term(&d0, k) * hu[0]
                + curve_term(&d1, k) * hu[1];
            for (corner, p) in self.corners.iter().enumerate() {
                sum -= p.coords * (hu[corner % 2] * hv[corner / 2]);
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
        SurfaceKind::Coons
    }

    fn transformed(
        &self,
        reg: &mut Registry,
    ) -> Result<Arc<dyn ParametricSurface>, ConstructionError> {
        let [c0, c1, d0, d1] = &self.curves;
        let curves = [
            reg.map_curve(c0)?,
            reg.map_curve(c1)?,
            reg.map_curve(d0)?,
            reg.map_curve(d1)?,
        ];
        let corners = corners_of(&curves, &self.tol)?;
        Ok(Arc::new(Self {
            curves,
            corners,
            tol: self.tol,
        }))
    }

    fn encode(&self, writer: &mut ArchiveWriter) -> SurfaceRecord {
        SurfaceRecord::Coons {
            curves: self.curves.each_ref().map(|c| writer.prepare_write_curve(c)),
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
        self.curves
            .iter()
            .zip(&other.curves)
            .all(|(a, b)| a.is_similar(b.as_ref()))
    }
}
