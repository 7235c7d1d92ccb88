use std::any::Any;
use std::f64::consts::TAU;
use std::sync::Arc;

use gkern_math::{
    ConstructionError, KernelConfig, ParamInterval, ParamRect, Placement, Tolerance, Vec3,
};
use tracing::{debug, instrument};

use super::{ParametricSurface, SurfaceKind};
use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::cache::EvalCache;
use crate::deriv::trig_shift;
use crate::pole::Poles;
use crate::{CurveJet, DerivOrder, ParametricCurve, Registry, SurfaceJet};

/// A generatrix curve swept around an axis.
///
/// With `F` the placement frame (axis along local Z through the origin `o`)
/// and `R(v)` the rotation by `v` about local Z:
///
/// ```text
/// P(u, v) = o + F·R(v)·F⁻¹·(C(u) − o)
/// ```
///
/// Curve derivatives are taken into the local frame, rotated, and taken
/// back out. `∂ᵏ/∂vᵏ` of the rotation cycles with period four and has no
/// axial component for `k ≥ 1`.
#[derive(Debug, Clone)]
pub struct RevolutionSurface {
    curve: Arc<dyn ParametricCurve>,
    placement: Placement,
    angle: f64,
    domain: ParamRect,
    cache: EvalCache<f64, CurveJet>,
    u_poles: Poles,
    tol: Tolerance,
}

impl RevolutionSurface {
    /// Sweep `curve` by `angle` (in `(0, 2π]`) about the Z axis of
    /// `placement`.
    #[instrument(level = "debug", skip(curve, placement))]
    pub fn new(
        curve: Arc<dyn ParametricCurve>,
        placement: Placement,
        angle: f64,
    ) -> Result<Self, ConstructionError> {
        let tol = Tolerance::DEFAULT;
        validate_curve(curve.as_ref(), &placement, &tol)?;
        let mut surface = Self {
            domain: ParamRect::new(curve.domain(), ParamInterval::full_turn()),
            curve,
            placement,
            angle: TAU,
            cache: EvalCache::new(Default::default()),
            u_poles: Poles::new(),
            tol,
        };
        surface.set_angle(angle)?;
        surface.u_poles = surface.find_u_poles();
        Ok(surface)
    }

    /// Adopt the tolerances and cache mode of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self.u_poles = self.find_u_poles();
        self.cache = EvalCache::new(config.multithreading);
        debug!(mode = ?config.multithreading, "revolution cache mode");
        self
    }

    /// The generatrix.
    pub fn curve(&self) -> &Arc<dyn ParametricCurve> {
        &self.curve
    }

    /// Frame whose Z axis is the rotation axis.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Sweep angle.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Replace the generatrix.
    pub fn change_curve(&mut self, curve: Arc<dyn ParametricCurve>) -> Result<(), ConstructionError> {
        validate_curve(curve.as_ref(), &self.placement, &self.tol)?;
        self.domain.u = curve.domain();
        self.curve = curve;
        self.u_poles = self.find_u_poles();
        self.cache.clear();
        Ok(())
    }

    /// Change the sweep angle. A full turn makes `v` periodic.
    pub fn set_angle(&mut self, angle: f64) -> Result<(), ConstructionError> {
        if !(angle > self.tol.angular) || angle > TAU + self.tol.angular {
            return Err(ConstructionError::range(format!(
                "revolution angle {angle} outside (0, 2π]"
            )));
        }
        self.domain.v = if (angle - TAU).abs() <= self.tol.angular {
            ParamInterval::full_turn()
        } else {
            ParamInterval::bounded(0.0, angle)?
        };
        self.angle = angle;
        self.cache.clear();
        Ok(())
    }

    fn curve_jet(&self, u: f64) -> CurveJet {
        self.cache.get_or_compute(u, || self.curve.eval_raw(u))
    }

    /// Generatrix ends lying on the axis.
    fn find_u_poles(&self) -> Poles {
        let d = self.domain.u;
        if d.closed {
            return Poles::new();
        }
        [d.min, d.max]
            .into_iter()
            .filter(|&t| self.axis_distance(t) <= self.tol.linear)
            .collect()
    }

    /// Distance of the generatrix point at `t` from the axis.
    fn axis_distance(&self, t: f64) -> f64 {
        let q = self.placement.to_local_point(&self.curve.eval_raw(t).point);
        q.x.hypot(q.y)
    }
}

fn validate_curve(
    curve: &dyn ParametricCurve,
    placement: &Placement,
    tol: &Tolerance,
) -> Result<(), ConstructionError> {
    let d = curve.domain();
    if !d.is_finite() || d.is_empty() {
        return Err(ConstructionError::range("generatrix needs a finite domain"));
    }
    let off_axis = (0..=16).any(|i| {
        let q = placement.to_local_point(&curve.eval_raw(d.from_unit(i as f64 / 16.0)).point);
        q.x.hypot(q.y) > tol.linear
    });
    if off_axis {
        Ok(())
    } else {
        Err(ConstructionError::degenerate("generatrix lies on the rotation axis"))
    }
}

impl ParametricSurface for RevolutionSurface {
    fn domain(&self) -> ParamRect {
        self.domain
    }

    fn eval_raw(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        let cj = self.curve_jet(u);
        let (s, c) = v.sin_cos();
        let f = &self.placement;
        // local generatrix point and derivatives
        let q = [
            f.to_local_point(&cj.point),
            f.to_local_vec(&cj.d1),
            f.to_local_vec(&cj.d2),
            f.to_local_vec(&cj.d3),
        ];
        let rotate = |i: usize, k: usize| {
            let (ck, sk) = trig_shift(k, c, s);
            let a = q[i];
            let axial = if k == 0 { a.z } else { 0.0 };
            Vec3::new(a.x * ck - a.y * sk, a.x * sk + a.y * ck, axial)
        };
        let mut jet = SurfaceJet::at(f.to_world_point(&rotate(0, 0)));
        for (i, k) in SurfaceJet::multi_indices(order) {
            jet.set_partial(i, k, f.to_world_vec(&rotate(i, k)));
        }
        jet
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Revolution
    }

    fn transformed(
        &self,
        reg: &mut Registry,
    ) -> Result<Arc<dyn ParametricSurface>, ConstructionError> {
        let curve = reg.map_curve(&self.curve)?;
        let placement = self.placement.transformed(reg.transform())?;
        let mut image = Self::new(curve, placement, self.angle)?;
        image.tol = self.tol;
        image.u_poles = image.find_u_poles();
        image.cache = EvalCache::new(self.cache.mode());
        Ok(Arc::new(image))
    }

    fn encode(&self, writer: &mut ArchiveWriter) -> SurfaceRecord {
        SurfaceRecord::Revolution {
            curve: writer.prepare_write_curve(&self.curve),
            placement: self.placement.clone(),
            angle: self.angle,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tolerance(&self) -> Tolerance {
        self.tol
    }

    fn u_poles(&self) -> Poles {
        self.u_poles.clone()
    }

    fn is_similar(&self, other: &dyn ParametricSurface) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        let eps = self.tol.metric.max(other.tol.metric);
        let (p, q) = (&self.placement, &other.placement);
        (p.origin() - q.origin()).norm() <= eps
            && (p.z() - q.z()).norm() <= eps
            && (p.x() - q.x()).norm() <= eps
            && (self.angle - other.angle).abs() <= eps
            && self.curve.is_similar(other.curve.as_ref())
    }
}
