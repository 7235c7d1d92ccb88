//! Property-based tests for the clamp/wrap domain protocol and the checked
//! evaluation path.

use std::f64::consts::{FRAC_PI_4, TAU};

use approx::assert_relative_eq;
use gkern_geom::blend::hermite;
use gkern_geom::{ConeSurface, ParametricCurve, ParametricSurface, PoleCheck, SphereSurface};
use gkern_math::{ParamInterval, Placement, Point3};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// A periodic interval with a moderate origin and period.
fn arb_periodic() -> impl Strategy<Value = ParamInterval> {
    (-100.0f64..100.0, 0.1f64..10.0)
        .prop_map(|(min, period)| ParamInterval::periodic(min, period).unwrap())
}

/// A bounded, non-periodic interval.
fn arb_bounded() -> impl Strategy<Value = ParamInterval> {
    (-100.0f64..100.0, 0.0f64..50.0)
        .prop_map(|(min, len)| ParamInterval::bounded(min, min + len).unwrap())
}

/// Distance between two parameters on a circle of circumference `period`.
fn circular_distance(a: f64, b: f64, period: f64) -> f64 {
    let d = (a - b).rem_euclid(period);
    d.min(period - d)
}

fn cone() -> ConeSurface {
    ConeSurface::new(Placement::identity(), 1.0, FRAC_PI_4, 2.0).unwrap()
}

// ---------------------------------------------------------------------------
// Wrapping
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn wrap_lands_in_half_open_domain(dom in arb_periodic(), t in -1e7f64..1e7) {
        let r = dom.wrap(t);
        prop_assert!(r >= dom.min && r < dom.max, "wrap({}) = {} outside [{}, {})", t, r, dom.min, dom.max);
    }

    #[test]
    fn wrap_ignores_whole_periods(
        dom in arb_periodic(),
        w in 0.0f64..1.0,
        k in -1_000_000i64..=1_000_000,
    ) {
        let period = dom.max - dom.min;
        let t = dom.from_unit(w);
        let shifted = t + k as f64 * period;
        let scale = dom.min.abs() + period + shifted.abs();
        let tol = 16.0 * f64::EPSILON * scale;
        prop_assert!(circular_distance(dom.wrap(shifted), dom.wrap(t), period) <= tol);
    }

    #[test]
    fn wrap_is_idempotent(dom in arb_periodic(), t in -1e6f64..1e6) {
        let once = dom.wrap(t);
        let twice = dom.wrap(once);
        let period = dom.max - dom.min;
        prop_assert!(circular_distance(once, twice, period) <= 4.0 * f64::EPSILON * (dom.max.abs() + period));
    }

    #[test]
    fn same_param_across_periods(dom in arb_periodic(), w in 0.0f64..1.0, k in -1000i64..1000) {
        let t = dom.from_unit(w);
        let period = dom.max - dom.min;
        prop_assert!(dom.is_same_param(t, t + k as f64 * period, 1e-9));
    }
}

// ---------------------------------------------------------------------------
// Clamping
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn clamp_saturates(dom in arb_bounded(), t in -1e6f64..1e6) {
        let r = dom.clamp_or_wrap(t);
        prop_assert!(r >= dom.min && r <= dom.max);
        if t < dom.min {
            prop_assert_eq!(r, dom.min);
        } else if t > dom.max {
            prop_assert_eq!(r, dom.max);
        } else {
            prop_assert_eq!(r, t);
        }
    }

    #[test]
    fn clamp_is_idempotent(dom in arb_bounded(), t in -1e6f64..1e6) {
        let once = dom.clamp(t);
        prop_assert_eq!(dom.clamp(once), once);
    }
}

// ---------------------------------------------------------------------------
// Checked evaluation
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn cone_wraps_u_and_clamps_v(u in 0.0f64..TAU, v in 0.0f64..1.0, k in -1000i64..1000, dv in 0.0f64..100.0) {
        let c = cone();
        let p = c.point_on(u, v);
        let q = c.point_on(u + k as f64 * TAU, v);
        prop_assert!((p - q).norm() < 1e-9, "{:?} vs {:?}", p, q);
        prop_assert_eq!(c.point_on(u, 1.0 + dv), c.point_on(u, 1.0));
        prop_assert_eq!(c.point_on(u, -dv), c.point_on(u, 0.0));
    }

    #[test]
    fn in_domain_params_pass_pole_check(v in 0.0f64..1.0) {
        prop_assert_eq!(cone().check_v_param(v), PoleCheck::Unchanged(v));
    }

    #[test]
    fn sphere_points_stay_on_sphere(u in -50.0f64..50.0, v in -5.0f64..5.0) {
        let s = SphereSurface::new(Placement::identity(), 3.0).unwrap();
        prop_assert!((s.point_on(u, v).coords.norm() - 3.0).abs() < 1e-12);
        prop_assert!((s.normal(u, v).norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn closed_curve_wraps(t in -1e4f64..1e4) {
        let circle = gkern_geom::ArcCurve::circle(Placement::identity(), 2.0).unwrap();
        let p = circle.point_on(t);
        let (s, c) = t.sin_cos();
        prop_assert!((p - Point3::new(2.0 * c, 2.0 * s, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn hermite_values_partition_unity(w in -2.0f64..3.0) {
        let h = hermite(w, 0);
        prop_assert!((h[0] + h[1] - 1.0).abs() < 1e-12);
        for order in 1..=3 {
            let d = hermite(w, order);
            prop_assert!((d[0] + d[1]).abs() < 1e-9);
        }
    }
}

#[test]
fn cone_scenario_points_and_pole() {
    let c = ConeSurface::new(Placement::identity(), 2.0, 0.5f64.atan(), 4.0).unwrap();
    assert_relative_eq!(c.point_on(0.0, 0.0), Point3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
    assert_relative_eq!(
        c.point_on_ext(std::f64::consts::PI, 1.0),
        Point3::new(-4.0, 0.0, 4.0),
        epsilon = 1e-12
    );
    assert_relative_eq!(c.v_pole().unwrap(), -1.0, epsilon = 1e-12);
}
