use std::any::Any;
use std::f64::consts::TAU;
use std::sync::Arc;

use gkern_math::{
    ConstructionError, KernelConfig, ParamInterval, Placement, Point3, Tolerance, Vec3,
};

use super::{CurveKind, ParametricCurve};
use crate::archive::{ArchiveWriter, CurveRecord};
use crate::deriv::trig_shift;
use crate::{CurveJet, Registry};

/// An elliptical or circular arc in the XY plane of a placement.
///
/// Parameterization: `P(t) = o + a·cos(t)·X + b·sin(t)·Y`. The arc is
/// closed when its angular span is a full turn.
#[derive(Debug, Clone)]
pub struct ArcCurve {
    placement: Placement,
    major: f64,
    minor: f64,
    domain: ParamInterval,
    tol: Tolerance,
}

impl ArcCurve {
    /// An elliptical arc from angle `t0` to `t1`.
    pub fn new(
        placement: Placement,
        major: f64,
        minor: f64,
        t0: f64,
        t1: f64,
    ) -> Result<Self, ConstructionError> {
        let tol = Tolerance::DEFAULT;
        if !(major > tol.linear) || !(minor > tol.linear) {
            return Err(ConstructionError::degenerate(format!(
                "arc radii {major}, {minor} must be positive"
            )));
        }
        let span = t1 - t0;
        if !(span > 0.0) || span > TAU + tol.angular {
            return Err(ConstructionError::range(format!(
                "arc span {span} outside (0, 2π]"
            )));
        }
        let domain = if (span - TAU).abs() <= tol.angular {
            ParamInterval::periodic(t0, TAU)?
        } else {
            ParamInterval::bounded(t0, t1)?
        };
        Ok(Self {
            placement,
            major,
            minor,
            domain,
            tol,
        })
    }

    /// A full circle of `radius`.
    pub fn circle(placement: Placement, radius: f64) -> Result<Self, ConstructionError> {
        Self::new(placement, radius, radius, 0.0, TAU)
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Local frame of the arc.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Semi-axis along local X.
    pub fn major_radius(&self) -> f64 {
        self.major
    }

    /// Semi-axis along local Y.
    pub fn minor_radius(&self) -> f64 {
        self.minor
    }

    /// Center of the arc.
    pub fn center(&self) -> Point3 {
        self.placement.origin()
    }
}

impl ParametricCurve for ArcCurve {
    fn domain(&self) -> ParamInterval {
        self.domain
    }

    fn eval_raw(&self, t: f64) -> CurveJet {
        let (s, c) = t.sin_cos();
        let local = |k: usize| {
            let (ck, sk) = trig_shift(k, c, s);
            Vec3::new(self.major * ck, self.minor * sk, 0.0)
        };
        CurveJet {
            point: self.placement.to_world_point(&local(0)),
            d1: self.placement.to_world_vec(&local(1)),
            d2: self.placement.to_world_vec(&local(2)),
            d3: self.placement.to_world_vec(&local(3)),
        }
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Arc
    }

    fn transformed(&self, reg: &mut Registry) -> Result<Arc<dyn ParametricCurve>, ConstructionError> {
        Ok(Arc::new(Self {
            placement: self.placement.transformed(reg.transform())?,
            ..self.clone()
        }))
    }

    fn encode(&self, _writer: &mut ArchiveWriter) -> CurveRecord {
        CurveRecord::Arc {
            placement: self.placement.clone(),
            major: self.major,
            minor: self.minor,
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
        let same_frame = (self.center() - other.center()).norm() <= eps
            && (self.placement.z() - other.placement.z()).norm() <= eps;
        same_frame
            && (self.major - other.major).abs() <= eps
            && (self.minor - other.minor).abs() <= eps
            && self.is_closed() == other.is_closed()
            && (self.start_point() - other.start_point()).norm() <= eps
            && (self.end_point() - other.end_point()).norm() <= eps
    }
}
