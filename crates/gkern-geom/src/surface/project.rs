//! Closest-point projection onto a surface.

use gkern_math::Point3;

use super::ParametricSurface;
use crate::DerivOrder;

/// Foot point of a projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Parameter of the foot point.
    pub u: f64,
    /// Parameter of the foot point.
    pub v: f64,
    /// Foot point on the surface.
    pub point: Point3,
    /// Distance from the projected point.
    pub distance: f64,
}

const GRID: usize = 8;
const MAX_ITERATIONS: usize = 64;

/// Project `target` onto `surface`.
///
/// A coarse grid supplies the seed; Newton iterations on
/// `(P − X)·Pu = 0, (P − X)·Pv = 0` refine it. Every iterate goes through
/// the checked path, so the solver never leaves the domain or crosses a
/// pole. Iteration stops once the foot point moves less than `tol`.
///
/// Returns `None` for unbounded or empty domains.
pub fn project_point<S: ParametricSurface + ?Sized>(
    surface: &S,
    target: &Point3,
    tol: f64,
) -> Option<Projection> {
    let dom = surface.domain();
    if dom.is_empty() || !dom.u.is_finite() || !dom.v.is_finite() {
        return None;
    }

    let mut best = (dom.u.min, dom.v.min, f64::INFINITY);
    for j in 0..=GRID {
        let v = dom.v.from_unit(j as f64 / GRID as f64);
        for i in 0..=GRID {
            let u = dom.u.from_unit(i as f64 / GRID as f64);
            let d = (surface.point_on(u, v) - target).norm_squared();
            if d < best.2 {
                best = (u, v, d);
            }
        }
    }

    let checked = surface.check_params(best.0, best.1);
    let (mut u, mut v) = (checked.u, checked.v);
    for _ in 0..MAX_ITERATIONS {
        let jet = surface.eval_raw(u, v, DerivOrder::Second);
        let r = jet.point - target;
        let fu = r.dot(&jet.du);
        let fv = r.dot(&jet.dv);
        let a = jet.du.norm_squared() + r.dot(&jet.duu);
        let b = jet.du.dot(&jet.dv) + r.dot(&jet.duv);
        let c = jet.dv.norm_squared() + r.dot(&jet.dvv);
        let det = a * c - b * b;
        if !(det.abs() > 1e-300) {
            break;
        }
        let step_u = (c * fu - b * fv) / det;
        let step_v = (a * fv - b * fu) / det;
        let next = surface.check_params(u - step_u, v - step_v);
        let moved = (surface.eval_raw(next.u, next.v, DerivOrder::First).point - jet.point).norm();
        u = next.u;
        v = next.v;
        if !(moved > tol) {
            break;
        }
    }

    let point = surface.eval_raw(u, v, DerivOrder::First).point;
    let distance = (point - target).norm();
    distance.is_finite().then_some(Projection {
        u,
        v,
        point,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConeSurface, PlaneSurface, SphereSurface};
    use gkern_math::{ParamInterval, ParamRect, Placement};

    #[test]
    fn test_project_onto_plane() {
        let rect = ParamRect::new(
            ParamInterval::bounded(-5.0, 5.0).unwrap(),
            ParamInterval::bounded(-5.0, 5.0).unwrap(),
        );
        let plane = PlaneSurface::new(Placement::identity(), rect).unwrap();
        let p = project_point(&plane, &Point3::new(1.25, -2.5, 3.0), 1e-12).unwrap();
        assert!((p.u - 1.25).abs() < 1e-12);
        assert!((p.v + 2.5).abs() < 1e-12);
        assert!((p.distance - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_project_outside_domain_clamps() {
        let rect = ParamRect::new(ParamInterval::unit(), ParamInterval::unit());
        let plane = PlaneSurface::new(Placement::identity(), rect).unwrap();
        let p = project_point(&plane, &Point3::new(4.0, 0.5, 0.0), 1e-12).unwrap();
        assert_eq!(p.u, 1.0);
        assert!((p.distance - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_onto_sphere_and_cone() {
        let s = SphereSurface::new(Placement::identity(), 2.0).unwrap();
        let x = Point3::new(3.0, 4.0, 1.0);
        let p = project_point(&s, &x, 1e-12).unwrap();
        assert!((p.distance - (x.coords.norm() - 2.0)).abs() < 1e-8);
        assert!((p.point.coords.normalize() - x.coords.normalize()).norm() < 1e-8);

        let c = ConeSurface::new(Placement::identity(), 1.0, std::f64::consts::FRAC_PI_4, 2.0)
            .unwrap();
        let on = c.point_on(2.0, 0.3);
        let p = project_point(&c, &(on + c.normal(2.0, 0.3) * 0.1), 1e-12).unwrap();
        assert!((p.distance - 0.1).abs() < 1e-8);
        assert!((p.point - on).norm() < 1e-7);
    }
}
