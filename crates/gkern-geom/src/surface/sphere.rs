use std::any::Any;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use gkern_math::{
    ConstructionError, KernelConfig, ParamInterval, ParamRect, Placement, Point3, Tolerance, Vec3,
};

use super::{ParametricSurface, SurfaceKind};
use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::deriv::trig_shift;
use crate::pole::Poles;
use crate::{DerivOrder, Registry, SurfaceJet};

/// A sphere parameterized by longitude `u` and latitude `v`.
///
/// `P(u, v) = o + r(cos v cos u·X + cos v sin u·Y + sin v·Z)`. The
/// latitudes `±π/2` are poles.
#[derive(Debug, Clone)]
pub struct SphereSurface {
    placement: Placement,
    radius: f64,
    domain: ParamRect,
    tol: Tolerance,
}

impl SphereSurface {
    /// A full sphere.
    pub fn new(placement: Placement, radius: f64) -> Result<Self, ConstructionError> {
        let tol = Tolerance::DEFAULT;
        if !(radius > tol.linear) || !radius.is_finite() {
            return Err(ConstructionError::degenerate(format!(
                "sphere radius {radius} must be positive"
            )));
        }
        Ok(Self {
            placement,
            radius,
            domain: ParamRect::new(
                ParamInterval::full_turn(),
                ParamInterval::bounded(-FRAC_PI_2, FRAC_PI_2)?,
            ),
            tol,
        })
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Replace the parameter rectangle.
    ///
    /// Latitudes must stay within `[-π/2, π/2]`.
    pub fn with_domain(mut self, domain: ParamRect) -> Result<Self, ConstructionError> {
        let v = domain.v;
        if v.closed || v.min < -FRAC_PI_2 - self.tol.angular || v.max > FRAC_PI_2 + self.tol.angular {
            return Err(ConstructionError::range(format!(
                "sphere latitude range [{}, {}] exceeds the poles",
                v.min, v.max
            )));
        }
        if domain.is_empty() || !domain.u.is_finite() {
            return Err(ConstructionError::range("sphere needs a finite longitude range"));
        }
        self.domain = domain;
        Ok(self)
    }

    /// Center of the sphere.
    pub fn center(&self) -> Point3 {
        self.placement.origin()
    }

    /// Radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Local frame.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }
}

impl ParametricSurface for SphereSurface {
    fn domain(&self) -> ParamRect {
        self.domain
    }

    fn eval_raw(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        let (su, cu) = u.sin_cos();
        let (sv, cv) = v.sin_cos();
        let r = self.radius;
        let local = |i: usize, k: usize| {
            let (cui, sui) = trig_shift(i, cu, su);
            let (cvk, svk) = trig_shift(k, cv, sv);
            let z = if i == 0 { svk } else { 0.0 };
            Vec3::new(r * cvk * cui, r * cvk * sui, r * z)
        };
        let mut jet = SurfaceJet::at(self.placement.to_world_point(&local(0, 0)));
        for (i, k) in SurfaceJet::multi_indices(order) {
            jet.set_partial(i, k, self.placement.to_world_vec(&local(i, k)));
        }
        jet
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Sphere
    }

    fn transformed(
        &self,
        reg: &mut Registry,
    ) -> Result<Arc<dyn ParametricSurface>, ConstructionError> {
        Ok(Arc::new(Self {
            placement: self.placement.transformed(reg.transform())?,
            ..self.clone()
        }))
    }

    fn encode(&self, _writer: &mut ArchiveWriter) -> SurfaceRecord {
        SurfaceRecord::Sphere {
            placement: self.placement.clone(),
            radius: self.radius,
            domain: self.domain,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tolerance(&self) -> Tolerance {
        self.tol
    }

    fn v_poles(&self) -> Poles {
        Poles::from_slice(&[-FRAC_PI_2, FRAC_PI_2])
    }

    fn is_similar(&self, other: &dyn ParametricSurface) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        let eps = self.tol.metric.max(other.tol.metric);
        (self.center() - other.center()).norm() <= eps
            && (self.radius - other.radius).abs() <= eps
            && (self.placement.z() - other.placement.z()).norm() <= eps
            && (self.domain.v.min - other.domain.v.min).abs() <= eps
            && (self.domain.v.max - other.domain.v.max).abs() <= eps
            && (self.domain.u.length() - other.domain.u.length()).abs() <= eps
    }
}
