//! Parametric surfaces and the surface evaluation facade.
//!
//! Every query on a surface walks the same short pipeline. The checked
//! path clamps or wraps `(u, v)` into the domain, runs the pole check of
//! each direction, and only then evaluates. The extended path evaluates the
//! analytic formula at the literal parameters. Nothing survives between two
//! queries except the evaluation caches of the heavier surfaces.

mod coons;
mod cone;
mod join;
pub(crate) mod normal;
mod offset;
mod plane;
mod project;
mod revolution;
mod sphere;

pub use coons::CoonsSurface;
pub use cone::ConeSurface;
pub use join::JoinSurface;
pub use offset::{OffsetLaw, OffsetSurface};
pub use plane::PlaneSurface;
pub use project::{project_point, Projection};
pub use revolution::RevolutionSurface;
pub use sphere::SphereSurface;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use gkern_math::{
    reserve_for, AllocPolicy, BoundingBox, ConstructionError, ParamInterval, ParamRect, Point3,
    Tolerance, Vec3,
};

use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::pole::{check_poles, is_pole_inside, PoleCheck, Poles};
use crate::{DerivOrder, Extension, NormalJet, Registry, SurfaceJet};

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Planar rectangle.
    Plane,
    /// Conical surface.
    Cone,
    /// Spherical surface.
    Sphere,
    /// Surface of revolution.
    Revolution,
    /// Offset of another surface.
    Offset,
    /// Coons patch over four boundary curves.
    Coons,
    /// Blend between two curves.
    Join,
}

/// What an [`explore`](ParametricSurface::explore) query must produce
/// beyond the point and first partials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalRequest {
    /// Highest partial derivative order.
    pub order: DerivOrder,
    /// Whether the unit normal is wanted.
    pub with_normal: bool,
}

impl EvalRequest {
    /// Point and first partials only.
    pub const FIRST: Self = Self {
        order: DerivOrder::First,
        with_normal: false,
    };

    /// Partials up to `order`, no normal.
    pub fn up_to(order: DerivOrder) -> Self {
        Self {
            order,
            with_normal: false,
        }
    }

    /// Also request the normal.
    pub fn with_normal(self) -> Self {
        Self {
            with_normal: true,
            ..self
        }
    }
}

impl Default for EvalRequest {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Parameters after the domain and pole stages of the checked path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckedParams {
    /// Checked first parameter.
    pub u: f64,
    /// Checked second parameter.
    pub v: f64,
    /// Whether `(u, v)` sits on a pole within parametric tolerance.
    pub at_pole: bool,
}

/// Result of [`ParametricSurface::explore`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceEval {
    /// Parameter actually evaluated.
    pub u: f64,
    /// Parameter actually evaluated.
    pub v: f64,
    /// `P(u, v)`.
    pub point: Point3,
    /// `∂P/∂u`.
    pub du: Vec3,
    /// `∂P/∂v`.
    pub dv: Vec3,
    /// `[Puu, Puv, Pvv]`, when requested.
    pub second: Option<[Vec3; 3]>,
    /// `[Puuu, Puuv, Puvv, Pvvv]`, when requested.
    pub third: Option<[Vec3; 4]>,
    /// Unit normal, when requested. Zero in a fully degenerate neighborhood.
    pub normal: Option<Vec3>,
    /// Whether the checked path landed on a pole.
    pub at_pole: bool,
}

/// A parametric surface in 3D space.
///
/// Implementors provide the analytic jet at literal parameters
/// ([`eval_raw`](Self::eval_raw)) and their poles; the checked facade,
/// normals and sampling are shared.
pub trait ParametricSurface: Send + Sync + fmt::Debug {
    /// Parameter domain.
    fn domain(&self) -> ParamRect;

    /// Point and partials up to `order` at the literal `(u, v)`.
    ///
    /// Entries above `order` may be left at zero.
    fn eval_raw(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet;

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;

    /// The image of this surface under the registry's transform.
    fn transformed(
        &self,
        reg: &mut Registry,
    ) -> Result<Arc<dyn ParametricSurface>, ConstructionError>;

    /// Persistent record of this surface, registering referenced objects.
    fn encode(&self, writer: &mut ArchiveWriter) -> SurfaceRecord;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Tolerances captured at construction.
    fn tolerance(&self) -> Tolerance {
        Tolerance::DEFAULT
    }

    /// Pole parameters in `u`.
    fn u_poles(&self) -> Poles {
        Poles::new()
    }

    /// Pole parameters in `v`.
    fn v_poles(&self) -> Poles {
        Poles::new()
    }

    /// Whether `other` describes the same geometry. Symmetric.
    fn is_similar(&self, _other: &dyn ParametricSurface) -> bool {
        false
    }

    /// Unit normal and its partials up to `order` at the literal `(u, v)`.
    fn normal_jet_raw(&self, u: f64, v: f64, order: DerivOrder) -> NormalJet {
        normal::normal_jet(self, u, v, order)
    }

    // -------------------------------------------------------------------------
    // Pole protocol
    // -------------------------------------------------------------------------

    /// Stop `u` at a pole it would otherwise cross.
    fn check_u_param(&self, u: f64) -> PoleCheck {
        check_poles(u, &self.domain().u, &self.u_poles())
    }

    /// Stop `v` at a pole it would otherwise cross.
    fn check_v_param(&self, v: f64) -> PoleCheck {
        check_poles(v, &self.domain().v, &self.v_poles())
    }

    /// Whether a `u` pole lies strictly inside `(a, b)`.
    fn is_u_pole_inside(&self, a: f64, b: f64) -> bool {
        let tol = self.tolerance().parametric;
        self.u_poles().iter().any(|&p| is_pole_inside(a, b, p, tol))
    }

    /// Whether a `v` pole lies strictly inside `(a, b)`.
    fn is_v_pole_inside(&self, a: f64, b: f64) -> bool {
        let tol = self.tolerance().parametric;
        self.v_poles().iter().any(|&p| is_pole_inside(a, b, p, tol))
    }

    // -------------------------------------------------------------------------
    // Facade
    // -------------------------------------------------------------------------

    /// Run the domain and pole stages of the checked path.
    fn check_params(&self, u: f64, v: f64) -> CheckedParams {
        let domain = self.domain();
        let (u, v) = domain.clamp_or_wrap(u, v);
        let (u_poles, v_poles) = (self.u_poles(), self.v_poles());
        let u = check_poles(u, &domain.u, &u_poles).value();
        let v = check_poles(v, &domain.v, &v_poles).value();
        let tol = self.tolerance().parametric;
        let at_pole = u_poles.iter().any(|p| (u - p).abs() <= tol)
            || v_poles.iter().any(|p| (v - p).abs() <= tol);
        CheckedParams { u, v, at_pole }
    }

    /// Point, partials and normal as requested.
    fn explore(&self, u: f64, v: f64, ext: Extension, req: EvalRequest) -> SurfaceEval {
        let checked = match ext {
            Extension::Checked => self.check_params(u, v),
            Extension::Extended => CheckedParams {
                u,
                v,
                at_pole: false,
            },
        };
        let (u, v) = (checked.u, checked.v);
        let jet = self.eval_raw(u, v, req.order);
        SurfaceEval {
            u,
            v,
            point: jet.point,
            du: jet.du,
            dv: jet.dv,
            second: (req.order >= DerivOrder::Second).then_some([jet.duu, jet.duv, jet.dvv]),
            third: (req.order >= DerivOrder::Third)
                .then_some([jet.duuu, jet.duuv, jet.duvv, jet.dvvv]),
            normal: req
                .with_normal
                .then(|| normal::normal_from_jet(self, u, v, &jet)),
            at_pole: checked.at_pole,
        }
    }

    /// Point at `(u, v)`.
    fn point_on(&self, u: f64, v: f64) -> Point3 {
        let c = self.check_params(u, v);
        self.eval_raw(c.u, c.v, DerivOrder::First).point
    }

    /// Point at the literal `(u, v)`, extrapolating beyond the domain.
    fn point_on_ext(&self, u: f64, v: f64) -> Point3 {
        self.eval_raw(u, v, DerivOrder::First).point
    }

    /// `∂P/∂u` at `(u, v)`.
    fn derive_u(&self, u: f64, v: f64) -> Vec3 {
        let c = self.check_params(u, v);
        self.eval_raw(c.u, c.v, DerivOrder::First).du
    }

    /// `∂P/∂v` at `(u, v)`.
    fn derive_v(&self, u: f64, v: f64) -> Vec3 {
        let c = self.check_params(u, v);
        self.eval_raw(c.u, c.v, DerivOrder::First).dv
    }

    /// Full jet up to `order` at `(u, v)`.
    fn jet(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        let c = self.check_params(u, v);
        let mut jet = self.eval_raw(c.u, c.v, order);
        jet.truncate(order);
        jet
    }

    /// Unit normal at `(u, v)`.
    ///
    /// Never NaN: at a pole the limit normal from inside the domain is
    /// returned, and a fully degenerate neighborhood yields zero.
    fn normal(&self, u: f64, v: f64) -> Vec3 {
        let c = self.check_params(u, v);
        let jet = self.eval_raw(c.u, c.v, DerivOrder::First);
        normal::normal_from_jet(self, c.u, c.v, &jet)
    }

    /// Unit normal at the literal `(u, v)`.
    fn normal_ext(&self, u: f64, v: f64) -> Vec3 {
        let jet = self.eval_raw(u, v, DerivOrder::First);
        normal::normal_from_jet(self, u, v, &jet)
    }

    /// Normal and its partials to third order at `(u, v)`.
    fn normal_jet(&self, u: f64, v: f64) -> NormalJet {
        let c = self.check_params(u, v);
        self.normal_jet_raw(c.u, c.v, DerivOrder::Third)
    }

    /// Whether the surface is periodic in `u`.
    fn is_u_closed(&self) -> bool {
        self.domain().u.closed
    }

    /// Whether the surface is periodic in `v`.
    fn is_v_closed(&self) -> bool {
        self.domain().v.closed
    }

    /// Append an `nu × nv` grid of parameters covering the domain, row by
    /// row in `v`. Closed directions leave out the repeated end.
    fn sample_params(
        &self,
        nu: usize,
        nv: usize,
        out: &mut Vec<(f64, f64)>,
        policy: AllocPolicy,
    ) -> Result<(), ConstructionError> {
        if nu < 2 || nv < 2 {
            return Err(ConstructionError::insufficient(
                "surface sampling needs at least two parameters per direction",
            ));
        }
        let dom = self.domain();
        if !dom.u.is_finite() || !dom.v.is_finite() || dom.is_empty() {
            return Err(ConstructionError::range("cannot sample an unbounded domain"));
        }
        reserve_for(out, nu * nv, policy)?;
        for j in 0..nv {
            let v = grid_param(&dom.v, j, nv);
            out.extend((0..nu).map(|i| (grid_param(&dom.u, i, nu), v)));
        }
        Ok(())
    }

    /// Box around a `samples × samples` grid of surface points.
    fn bounding_box(&self, samples: usize) -> BoundingBox {
        let dom = self.domain();
        let n = samples.max(2);
        let mut bbox = BoundingBox::empty();
        for j in 0..=n {
            let v = dom.v.from_unit(j as f64 / n as f64);
            for i in 0..=n {
                let u = dom.u.from_unit(i as f64 / n as f64);
                bbox.include_point(&self.eval_raw(u, v, DerivOrder::First).point);
            }
        }
        bbox
    }
}

fn grid_param(d: &ParamInterval, i: usize, count: usize) -> f64 {
    let steps = if d.closed { count } else { count - 1 };
    d.from_unit(i as f64 / steps as f64)
}


#[cfg(test)]
mod tests {
    use super::*;
    use gkern_math::Placement;
    use std::f64::consts::FRAC_PI_2;

    fn cone() -> ConeSurface {
        ConeSurface::new(Placement::identity(), 1.0, std::f64::consts::FRAC_PI_4, 2.0).unwrap()
    }

    #[test]
    fn test_explore_fills_only_requested() {
        let c = cone();
        let e = c.explore(0.3, 0.4, Extension::Checked, EvalRequest::FIRST);
        assert!(e.second.is_none() && e.third.is_none() && e.normal.is_none());
        let e = c.explore(
            0.3,
            0.4,
            Extension::Checked,
            EvalRequest::up_to(DerivOrder::Third).with_normal(),
        );
        assert!(e.second.is_some() && e.third.is_some());
        let n = e.normal.unwrap();
        assert!((n.norm() - 1.0).abs() < 1e-12);
        assert!(n.dot(&e.du).abs() < 1e-12 && n.dot(&e.dv).abs() < 1e-12);
    }

    #[test]
    fn test_checked_versus_extended() {
        let c = cone();
        let e = c.explore(0.0, 3.0, Extension::Checked, EvalRequest::FIRST);
        assert_eq!(e.v, 1.0);
        let x = c.explore(0.0, 3.0, Extension::Extended, EvalRequest::FIRST);
        assert_eq!(x.v, 3.0);
        assert!((x.point.z - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_normal_at_apex_is_finite() {
        let c = cone();
        // apex sits at v = -0.5 on the extended surface
        let n = c.normal_ext(1.0, -0.5);
        assert!(n.iter().all(|x| x.is_finite()));
        assert!((n.norm() - 1.0).abs() < 1e-9);
        // limit normal from inside the domain
        let inside = c.normal_ext(1.0, -0.4);
        assert!((n - inside).norm() < 1e-3);
    }

    #[test]
    fn test_sphere_pole_flag_and_normal() {
        let s = SphereSurface::new(Placement::identity(), 2.0).unwrap();
        let e = s.explore(0.7, 5.0, Extension::Checked, EvalRequest::FIRST.with_normal());
        assert_eq!(e.v, FRAC_PI_2);
        assert!(e.at_pole);
        let n = e.normal.unwrap();
        assert!((n - Vec3::z()).norm() < 1e-6);
    }

    #[test]
    fn test_sample_grid() {
        let c = cone();
        let mut out = Vec::new();
        c.sample_params(4, 3, &mut out, AllocPolicy::Propagate).unwrap();
        assert_eq!(out.len(), 12);
        // closed u leaves out 2π, open v reaches 1
        assert!(out.iter().all(|&(u, _)| u < std::f64::consts::TAU));
        assert_eq!(out[11].1, 1.0);
        assert!(c.sample_params(1, 3, &mut out, AllocPolicy::Propagate).is_err());
    }

    #[test]
    fn test_jet_truncates() {
        let c = cone();
        let jet = c.jet(0.2, 0.5, DerivOrder::First);
        assert_eq!(jet.duu, Vec3::zeros());
    }
}
