use std::any::Any;
use std::sync::Arc;

use gkern_math::{
    ConstructionError, KernelConfig, ParamRect, Placement, Point3, Tolerance, Vec3,
};

use super::{ParametricSurface, SurfaceKind};
use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::{DerivOrder, Registry, SurfaceJet};

/// A planar rectangle.
///
/// Parameterization: `P(u, v) = origin + u * X + v * Y` over a finite
/// parameter rectangle.
#[derive(Debug, Clone)]
pub struct PlaneSurface {
    placement: Placement,
    domain: ParamRect,
    tol: Tolerance,
}

impl PlaneSurface {
    /// A plane in the XY plane of `placement`, trimmed to `domain`.
    pub fn new(placement: Placement, domain: ParamRect) -> Result<Self, ConstructionError> {
        if domain.is_empty() || !domain.u.is_finite() || !domain.v.is_finite() {
            return Err(ConstructionError::range("plane needs a finite, non-empty rectangle"));
        }
        if domain.u.closed || domain.v.closed {
            return Err(ConstructionError::range("plane rectangle cannot be periodic"));
        }
        Ok(Self {
            placement,
            domain,
            tol: Tolerance::DEFAULT,
        })
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Local frame of the plane.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Signed distance from the plane along its unit normal.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        let n = self.placement.x().cross(&self.placement.y()).normalize();
        (p - self.placement.origin()).dot(&n)
    }

    fn corners(&self) -> [Point3; 4] {
        let (u, v) = (self.domain.u, self.domain.v);
        [
            self.point_on_ext(u.min, v.min),
            self.point_on_ext(u.max, v.min),
            self.point_on_ext(u.min, v.max),
            self.point_on_ext(u.max, v.max),
        ]
    }
}

impl ParametricSurface for PlaneSurface {
    fn domain(&self) -> ParamRect {
        self.domain
    }

    fn eval_raw(&self, u: f64, v: f64, _order: DerivOrder) -> SurfaceJet {
        SurfaceJet {
            du: self.placement.x(),
            dv: self.placement.y(),
            ..SurfaceJet::at(self.placement.to_world_point(&Vec3::new(u, v, 0.0)))
        }
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
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
        SurfaceRecord::Plane {
            placement: self.placement.clone(),
            domain: self.domain,
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
        self.corners()
            .iter()
            .zip(other.corners().iter())
            .all(|(a, b)| (a - b).norm() <= eps)
    }
}
