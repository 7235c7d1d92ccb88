use std::any::Any;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use gkern_math::{
    ConstructionError, KernelConfig, ParamInterval, ParamRect, Placement, Tolerance, Vec3,
};

use super::{ParametricSurface, SurfaceKind};
use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::deriv::trig_shift;
use crate::pole::{is_pole_inside, Poles};
use crate::{DerivOrder, Registry, SurfaceJet};

/// A conical surface.
///
/// Parameterization, in the placement frame:
///
/// ```text
/// P(u, v) = o + (r + v·h·tan α)(cos u·X + sin u·Y) + v·h·Z
/// ```
///
/// `u` is the closed angle around the axis and `v` runs from the base
/// circle (`v = 0`, radius `r`) to height `h` (`v = 1`). The apex, where
/// the radius vanishes, is the pole `v = −r / (h·tan α)`.
#[derive(Debug, Clone)]
pub struct ConeSurface {
    placement: Placement,
    radius: f64,
    angle: f64,
    height: f64,
    domain: ParamRect,
    tol: Tolerance,
}

impl ConeSurface {
    /// A full cone over `v ∈ [0, 1]`.
    ///
    /// `angle` is the half-angle, positive when the cone widens along Z. A
    /// zero angle gives a cylinder. The apex may bound the range but not
    /// lie inside it.
    pub fn new(
        placement: Placement,
        radius: f64,
        angle: f64,
        height: f64,
    ) -> Result<Self, ConstructionError> {
        Self::with_v_range(placement, radius, angle, height, 0.0, 1.0)
    }

    /// A full cone over `v ∈ [v0, v1]`.
    pub fn with_v_range(
        placement: Placement,
        radius: f64,
        angle: f64,
        height: f64,
        v0: f64,
        v1: f64,
    ) -> Result<Self, ConstructionError> {
        let tol = Tolerance::DEFAULT;
        validate(radius, angle, height, &tol)?;
        let mut v = ParamInterval::unit();
        v.set_limit(v0, v1)?;
        let cone = Self {
            placement,
            radius,
            angle,
            height,
            domain: ParamRect::new(ParamInterval::full_turn(), v),
            tol,
        };
        cone.check_apex(v.min, v.max)?;
        Ok(cone)
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Local frame of the cone.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Radius at `v = 0`.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Half-angle.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Height of the `v = 1` section.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Radius growth per unit of `v`.
    fn slope(&self) -> f64 {
        self.height * self.angle.tan()
    }

    /// The apex parameter, `None` for a cylinder.
    pub fn v_pole(&self) -> Option<f64> {
        let slope = self.slope();
        (slope.abs() > self.tol.angular * self.height.abs()).then(|| -self.radius / slope)
    }

    /// Change the base radius.
    pub fn set_radius(&mut self, radius: f64) -> Result<(), ConstructionError> {
        self.reshape(radius, self.angle, self.height)
    }

    /// Change the half-angle.
    pub fn set_angle(&mut self, angle: f64) -> Result<(), ConstructionError> {
        self.reshape(self.radius, angle, self.height)
    }

    /// Change the height.
    pub fn set_height(&mut self, height: f64) -> Result<(), ConstructionError> {
        self.reshape(self.radius, self.angle, height)
    }

    /// Trim the `v` range. The range may end on the apex but not cross it.
    pub fn set_v_limit(&mut self, v0: f64, v1: f64) -> Result<(), ConstructionError> {
        self.check_apex(v0, v1)?;
        let mut v = self.domain.v;
        v.set_limit(v0, v1)?;
        self.domain.v = v;
        Ok(())
    }

    /// Apply new shape parameters unless they move the apex into the
    /// current `v` range.
    fn reshape(&mut self, radius: f64, angle: f64, height: f64) -> Result<(), ConstructionError> {
        validate(radius, angle, height, &self.tol)?;
        let reshaped = Self {
            radius,
            angle,
            height,
            ..self.clone()
        };
        reshaped.check_apex(self.domain.v.min, self.domain.v.max)?;
        *self = reshaped;
        Ok(())
    }

    fn check_apex(&self, v0: f64, v1: f64) -> Result<(), ConstructionError> {
        match self.v_pole() {
            Some(pole) if is_pole_inside(v0, v1, pole, self.tol.parametric) => {
                Err(ConstructionError::range(format!(
                    "v range [{v0}, {v1}] crosses the apex at {pole}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Trim the `u` range; a full turn keeps the cone closed.
    pub fn set_u_limit(&mut self, u0: f64, u1: f64) -> Result<(), ConstructionError> {
        let mut u = self.domain.u;
        u.set_limit(u0, u1)?;
        self.domain.u = u;
        Ok(())
    }
}

fn validate(radius: f64, angle: f64, height: f64, tol: &Tolerance) -> Result<(), ConstructionError> {
    if !(radius >= 0.0) || !radius.is_finite() {
        return Err(ConstructionError::range(format!("cone radius {radius} is negative")));
    }
    if !(height.abs() > tol.linear) || !height.is_finite() {
        return Err(ConstructionError::degenerate(format!("cone height {height} is zero")));
    }
    if !(angle.abs() < FRAC_PI_2 - tol.angular) {
        return Err(ConstructionError::range(format!(
            "cone half-angle {angle} outside (-π/2, π/2)"
        )));
    }
    if tol.is_zero(radius) && angle.abs() <= tol.angular {
        return Err(ConstructionError::degenerate("cone collapses onto its axis"));
    }
    Ok(())
}

impl ParametricSurface for ConeSurface {
    fn domain(&self) -> ParamRect {
        self.domain
    }

    fn eval_raw(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        let (s, c) = u.sin_cos();
        let slope = self.slope();
        let rho = self.radius + v * slope;
        let world = |x: f64, y: f64, z: f64| self.placement.to_world_vec(&Vec3::new(x, y, z));

        let mut jet = SurfaceJet::at(self.placement.to_world_point(&Vec3::new(
            rho * c,
            rho * s,
            v * self.height,
        )));
        jet.dv = world(slope * c, slope * s, self.height);
        for i in 1..=order.get() {
            let (ci, si) = trig_shift(i, c, s);
            jet.set_partial(i, 0, world(rho * ci, rho * si, 0.0));
            if i < order.get() {
                jet.set_partial(i, 1, world(slope * ci, slope * si, 0.0));
            }
        }
        jet
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cone
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
        SurfaceRecord::Cone {
            placement: self.placement.clone(),
            radius: self.radius,
            angle: self.angle,
            height: self.height,
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
        self.v_pole().into_iter().collect()
    }

    fn is_similar(&self, other: &dyn ParametricSurface) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        let eps = self.tol.metric.max(other.tol.metric);
        let close = |a: Vec3, b: Vec3| (a - b).norm() <= eps;
        let (p, q) = (&self.placement, &other.placement);
        close(p.origin().coords, q.origin().coords)
            && close(p.x(), q.x())
            && close(p.y(), q.y())
            && close(p.z(), q.z())
            && (self.radius - other.radius).abs() <= eps
            && (self.angle - other.angle).abs() <= eps
            && (self.height - other.height).abs() <= eps
            && (self.domain.u.min - other.domain.u.min).abs() <= eps
            && (self.domain.u.max - other.domain.u.max).abs() <= eps
            && (self.domain.v.min - other.domain.v.min).abs() <= eps
            && (self.domain.v.max - other.domain.v.max).abs() <= eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pole::PoleCheck;
    use crate::surface::testing::check_partials;
    use gkern_math::Point3;
    use std::f64::consts::{FRAC_PI_4, PI, TAU};

    fn unit_cone() -> ConeSurface {
        ConeSurface::new(Placement::identity(), 1.0, FRAC_PI_4, 2.0).unwrap()
    }

    #[test]
    fn test_cone_scenario_points() {
        let cone = ConeSurface::new(Placement::identity(), 2.0, 0.5_f64.atan(), 4.0).unwrap();
        let p = cone.point_on(0.0, 0.0);
        assert!((p - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
        let p = cone.point_on(PI, 1.0);
        assert!((p - Point3::new(-4.0, 0.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn test_cone_pole_and_check_v_param() {
        let cone = unit_cone();
        let pole = cone.v_pole().unwrap();
        assert!((pole + 0.5).abs() < 1e-12);
        assert_eq!(cone.v_poles().as_slice(), &[pole]);

        let check = cone.check_v_param(-0.8);
        assert_eq!(check, PoleCheck::Adjusted(pole));
        assert!(check.was_adjusted());
        // outside the domain but not past the apex
        assert_eq!(cone.check_v_param(-0.3), PoleCheck::Unchanged(-0.3));
        assert_eq!(cone.check_v_param(0.5), PoleCheck::Unchanged(0.5));
        assert_eq!(cone.check_v_param(4.0), PoleCheck::Unchanged(4.0));

        assert!(cone.is_v_pole_inside(-1.0, 0.0));
        assert!(!cone.is_v_pole_inside(0.0, 1.0));
    }

    #[test]
    fn test_cylinder_has_no_pole() {
        let cyl = ConeSurface::new(Placement::identity(), 1.0, 0.0, 3.0).unwrap();
        assert!(cyl.v_pole().is_none());
        assert!(cyl.v_poles().is_empty());
        assert!(!cyl.check_v_param(-100.0).was_adjusted());
    }

    #[test]
    fn test_cone_partials() {
        let frame = Placement::from_axis(
            Point3::new(1.0, -1.0, 2.0),
            Vec3::new(0.2, 1.0, 0.3),
            Vec3::x(),
        )
        .unwrap();
        let cone = ConeSurface::new(frame, 1.5, 0.3, 2.5).unwrap();
        for &(u, v) in &[(0.3, 0.2), (2.0, 0.9), (5.5, 0.5)] {
            check_partials(&cone, u, v, 1e-7);
        }
    }

    #[test]
    fn test_cone_closed_u_wraps() {
        let cone = unit_cone();
        assert_eq!(cone.point_on(TAU, 0.5), cone.point_on(0.0, 0.5));
        assert!((cone.point_on(TAU * 3.0 + 1.0, 0.5) - cone.point_on(1.0, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn test_cone_mutators() {
        let mut cone = unit_cone();
        cone.set_radius(2.0).unwrap();
        assert!((cone.v_pole().unwrap() + 1.0).abs() < 1e-12);
        assert!(cone.set_radius(-1.0).is_err());
        assert_eq!(cone.radius(), 2.0);
        cone.set_height(4.0).unwrap();
        assert!((cone.v_pole().unwrap() + 0.5).abs() < 1e-12);
        assert!(matches!(cone.set_height(0.0), Err(ConstructionError::DegenerateGeometry(_))));
        assert!(cone.set_angle(PI).is_err());
        cone.set_angle(0.0).unwrap();
        assert!(cone.v_pole().is_none());
        cone.set_angle(FRAC_PI_4).unwrap();
        // the apex at -0.5 may bound the range but not lie inside it
        cone.set_v_limit(-0.5, 1.0).unwrap();
        assert_eq!(cone.domain().v.min, -0.5);
        assert!(cone.set_v_limit(-1.0, 1.0).is_err());
        cone.set_u_limit(0.0, PI).unwrap();
        assert!(!cone.is_u_closed());
    }

    #[test]
    fn test_construction_rejects_apex_inside_range() {
        // a negative half-angle or height moves the apex to v = 0.5
        let narrowing = ConeSurface::new(Placement::identity(), 1.0, -FRAC_PI_4, 2.0);
        assert!(matches!(narrowing, Err(ConstructionError::InvalidParameterRange(_))));
        let downward = ConeSurface::new(Placement::identity(), 1.0, FRAC_PI_4, -2.0);
        assert!(matches!(downward, Err(ConstructionError::InvalidParameterRange(_))));

        // ending on the apex is allowed
        let cone = ConeSurface::with_v_range(Placement::identity(), 1.0, -FRAC_PI_4, 2.0, 0.0, 0.5)
            .unwrap();
        assert!((cone.v_pole().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(cone.domain().v.max, 0.5);
        let cone = ConeSurface::with_v_range(Placement::identity(), 1.0, -FRAC_PI_4, 2.0, -1.0, 0.0)
            .unwrap();
        assert!(cone.point_on(0.0, -1.0).x > 1.0);
    }

    fn trimmed_to_apex() -> ConeSurface {
        // r = 2, slope = 4: apex at v = -0.5, the lower end of the range
        let mut cone = ConeSurface::new(Placement::identity(), 2.0, FRAC_PI_4, 4.0).unwrap();
        cone.set_v_limit(-0.5, 1.0).unwrap();
        cone
    }

    #[test]
    fn test_set_radius_keeps_apex_outside_range() {
        let mut cone = trimmed_to_apex();
        let err = cone.set_radius(0.5).unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidParameterRange(_)));
        assert_eq!(cone.radius(), 2.0);
        cone.set_radius(3.0).unwrap();
        assert!((cone.v_pole().unwrap() + 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_set_angle_keeps_apex_outside_range() {
        let mut cone = trimmed_to_apex();
        assert!(cone.set_angle(1.2).is_err());
        assert!(cone.set_angle(-FRAC_PI_4).is_err());
        assert_eq!(cone.angle(), FRAC_PI_4);
        cone.set_angle(0.3).unwrap();
        assert!(cone.v_pole().unwrap() < -0.5);
    }

    #[test]
    fn test_set_height_keeps_apex_outside_range() {
        let mut cone = trimmed_to_apex();
        assert!(cone.set_height(8.0).is_err());
        assert!(cone.set_height(-4.0).is_err());
        assert_eq!(cone.height(), 4.0);
        cone.set_height(2.0).unwrap();
        assert!((cone.v_pole().unwrap() + 1.0).abs() < 1e-12);
        assert!(cone.check_v_param(-2.0).was_adjusted());
    }

    #[test]
    fn test_cone_similarity() {
        let a = unit_cone();
        let b = unit_cone();
        let c = ConeSurface::new(Placement::identity(), 1.0, FRAC_PI_4, 3.0).unwrap();
        assert!(a.is_similar(&b) && b.is_similar(&a));
        assert!(!a.is_similar(&c) && !c.is_similar(&a));
        let sphere = crate::SphereSurface::new(Placement::identity(), 1.0).unwrap();
        assert!(!a.is_similar(&sphere) && !sphere.is_similar(&a));
    }
}
