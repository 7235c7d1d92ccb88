//! Unit normals and their partial derivatives.
//!
//! The normal is `m / |m|` with `m = Pu × Pv`. Partials of `m` follow from
//! the product rule on the cross product; partials of the unit vector from
//! differentiating `n·|m| = m`. Third-order normal partials would need
//! fourth-order surface partials, so they are central differences of the
//! analytic second-order ones.

use gkern_math::{ParamInterval, Vec3};

use super::ParametricSurface;
use crate::{DerivOrder, NormalJet, SurfaceJet};

/// Cross products shorter than this fraction of `|Pu|·|Pv|` are degenerate.
const DEGENERACY: f64 = 1e-12;

/// Relative parameter step for nudging off a pole and for differencing.
const NUDGE: f64 = 1e-6;
const DIFF_STEP: f64 = 1e-5;

fn step(d: &ParamInterval, rel: f64) -> f64 {
    let len = d.length();
    if d.is_finite() && len > 0.0 {
        len * rel
    } else {
        rel
    }
}

/// Move `t` a small step toward the middle of `d`.
fn inward(d: &ParamInterval, t: f64) -> f64 {
    let h = step(d, NUDGE);
    if d.max - t >= t - d.min {
        t + h
    } else {
        t - h
    }
}

/// `m / |m|` unless the tangents are (nearly) parallel or vanish.
fn cross_normal(du: &Vec3, dv: &Vec3) -> Option<(Vec3, f64)> {
    let m = du.cross(dv);
    let len = m.norm();
    (len > 1e-300 && len > DEGENERACY * du.norm() * dv.norm()).then(|| (m / len, len))
}

/// Unit normal from an evaluated jet, falling back near degeneracies.
pub(crate) fn normal_from_jet<S: ParametricSurface + ?Sized>(
    surface: &S,
    u: f64,
    v: f64,
    jet: &SurfaceJet,
) -> Vec3 {
    match cross_normal(&jet.du, &jet.dv) {
        Some((n, _)) => n,
        None => limit_normal(surface, u, v, jet).unwrap_or_else(Vec3::zeros),
    }
}

/// Best-effort normal where `Pu × Pv` vanishes.
///
/// A vanishing `Pu` (a pole line in `v`) is left by nudging `v` into the
/// domain, a vanishing `Pv` by nudging `u`. Otherwise the normals of the
/// four neighbors are averaged.
fn limit_normal<S: ParametricSurface + ?Sized>(
    surface: &S,
    u: f64,
    v: f64,
    jet: &SurfaceJet,
) -> Option<Vec3> {
    let dom = surface.domain();
    let (lu, lv) = (jet.du.norm(), jet.dv.norm());
    let nudged = if lu <= lv * 1e-8 {
        Some((u, inward(&dom.v, v)))
    } else if lv <= lu * 1e-8 {
        Some((inward(&dom.u, u), v))
    } else {
        None
    };
    if let Some((nu, nv)) = nudged {
        let near = surface.eval_raw(nu, nv, DerivOrder::First);
        if let Some((n, _)) = cross_normal(&near.du, &near.dv) {
            return Some(n);
        }
    }

    let (hu, hv) = (step(&dom.u, NUDGE), step(&dom.v, NUDGE));
    let sum = [(u + hu, v), (u - hu, v), (u, v + hv), (u, v - hv)]
        .iter()
        .filter_map(|&(a, b)| {
            let near = surface.eval_raw(a, b, DerivOrder::First);
            cross_normal(&near.du, &near.dv).map(|(n, _)| n)
        })
        .fold(Vec3::zeros(), |acc, n| acc + n);
    let len = sum.norm();
    (len > 1e-12).then(|| sum / len)
}

/// Normal partials from a jet holding surface partials one order higher.
///
/// Returns `None` where the normal itself is degenerate.
pub(crate) fn analytic_normal_jet(jet: &SurfaceJet, order: DerivOrder) -> Option<NormalJet> {
    let (pu, pv) = (jet.du, jet.dv);
    let (n, len) = cross_normal(&pu, &pv)?;
    let mut out = NormalJet::constant(n);

    let mu = jet.duu.cross(&pv) + pu.cross(&jet.duv);
    let mv = jet.duv.cross(&pv) + pu.cross(&jet.dvv);
    let (lu, lv) = (n.dot(&mu), n.dot(&mv));
    out.nu = (mu - n * lu) / len;
    out.nv = (mv - n * lv) / len;

    if order >= DerivOrder::Second {
        let muu = jet.duuu.cross(&pv) + jet.duu.cross(&jet.duv) * 2.0 + pu.cross(&jet.duuv);
        let muv = jet.duuv.cross(&pv) + jet.duu.cross(&jet.dvv) + pu.cross(&jet.duvv);
        let mvv = jet.duvv.cross(&pv) + jet.duv.cross(&jet.dvv) * 2.0 + pu.cross(&jet.dvvv);
        // (n|m|)_ab = m_ab, with |m|_a = n·m_a
        let second = |mab: Vec3, na: Vec3, nb: Vec3, ma: Vec3, la: f64, lb: f64| {
            let lab = nb.dot(&ma) + n.dot(&mab);
            (mab - nb * la - n * lab - na * lb) / len
        };
        out.nuu = second(muu, out.nu, out.nu, mu, lu, lu);
        out.nuv = second(muv, out.nu, out.nv, mu, lu, lv);
        out.nvv = second(mvv, out.nv, out.nv, mv, lv, lv);
    }
    Some(out)
}

/// Normal jet up to `order` at the literal `(u, v)`.
pub(crate) fn normal_jet<S: ParametricSurface + ?Sized>(
    surface: &S,
    u: f64,
    v: f64,
    order: DerivOrder,
) -> NormalJet {
    let jet = surface.eval_raw(u, v, order.next());
    let Some(mut out) = analytic_normal_jet(&jet, order) else {
        return NormalJet::constant(normal_from_jet(surface, u, v, &jet));
    };
    if order < DerivOrder::Third {
        return out;
    }

    let dom = surface.domain();
    let (hu, hv) = (step(&dom.u, DIFF_STEP), step(&dom.v, DIFF_STEP));
    let second = |a: f64, b: f64| {
        analytic_normal_jet(&surface.eval_raw(a, b, DerivOrder::Third), DerivOrder::Second)
    };
    if let (Some(up), Some(um)) = (second(u + hu, v), second(u - hu, v)) {
        out.nuuu = (up.nuu - um.nuu) / (2.0 * hu);
        out.nuuv = (up.nuv - um.nuv) / (2.0 * hu);
        out.nuvv = (up.nvv - um.nvv) / (2.0 * hu);
    }
    if let (Some(vp), Some(vm)) = (second(u, v + hv), second(u, v - hv)) {
        out.nvvv = (vp.nvv - vm.nvv) / (2.0 * hv);
    }
    out
}
