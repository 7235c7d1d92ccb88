use std::any::Any;
use std::ops::Add;
use std::sync::Arc;

use gkern_math::{ConstructionError, KernelConfig, ParamRect, Tolerance};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ParametricSurface, SurfaceKind};
use crate::archive::{ArchiveWriter, SurfaceRecord};
use crate::blend::{hermite, linear};
use crate::cache::EvalCache;
use crate::deriv::binomial;
use crate::pole::Poles;
use crate::{DerivOrder, Registry, SurfaceJet};

/// Offset distance as a scalar field over the base domain.
///
/// The field is the sum of three parts: a constant, a bilinear
/// interpolation of corner values and a Hermite (flat at the corners)
/// interpolation of corner values. Corners are ordered
/// `[(u0, v0), (u1, v0), (u0, v1), (u1, v1)]`. The corner parts are
/// evaluated in normalized coordinates `w = (t − min) / (max − min)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OffsetLaw {
    /// Constant part.
    pub constant: f64,
    /// Bilinear corner values.
    pub linear: [f64; 4],
    /// Hermite-blended corner values.
    pub cubic: [f64; 4],
}

impl OffsetLaw {
    /// A constant distance.
    pub fn constant(distance: f64) -> Self {
        Self {
            constant: distance,
            ..Self::default()
        }
    }

    /// Bilinear interpolation of four corner distances.
    pub fn bilinear(corners: [f64; 4]) -> Self {
        Self {
            linear: corners,
            ..Self::default()
        }
    }

    /// Cubic interpolation of four corner distances, flat at every corner.
    pub fn cubic(corners: [f64; 4]) -> Self {
        Self {
            cubic: corners,
            ..Self::default()
        }
    }

    /// Whether the law is the same everywhere.
    pub fn is_constant(&self) -> bool {
        self.linear.iter().chain(&self.cubic).all(|&d| d == 0.0)
    }

    /// Whether the law agrees on the `u = min` and `u = max` edges.
    ///
    /// Equal corners along `u` make both corner parts independent of `u`,
    /// so the law and its partials match across a `u` seam.
    pub fn matches_across_u(&self) -> bool {
        let same = |c: &[f64; 4]| c[0] == c[1] && c[2] == c[3];
        same(&self.linear) && same(&self.cubic)
    }

    /// Whether the law agrees on the `v = min` and `v = max` edges.
    pub fn matches_across_v(&self) -> bool {
        let same = |c: &[f64; 4]| c[0] == c[2] && c[1] == c[3];
        same(&self.linear) && same(&self.cubic)
    }

    /// Multiply every part by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            constant: self.constant * factor,
            linear: self.linear.map(|d| d * factor),
            cubic: self.cubic.map(|d| d * factor),
        }
    }

    fn is_finite(&self) -> bool {
        std::iter::once(&self.constant)
            .chain(&self.linear)
            .chain(&self.cubic)
            .all(|d| d.is_finite())
    }

    /// `∂^(i+k) f / ∂u^i ∂v^k` at `(u, v)` for all `i + k <= 3`, indexed
    /// `[i][k]`.
    pub fn partials(&self, u: f64, v: f64, domain: &ParamRect) -> [[f64; 4]; 4] {
        let mut out = [[0.0; 4]; 4];
        out[0][0] = self.constant;
        if self.is_constant() {
            return out;
        }
        let (lu, lv) = (domain.u.length(), domain.v.length());
        let (wu, wv) = (domain.u.to_unit(u), domain.v.to_unit(v));
        for i in 0..4 {
            for k in 0..4 - i {
                let (lin_u, lin_v) = (linear(wu, i), linear(wv, k));
                let (cub_u, cub_v) = (hermite(wu, i), hermite(wv, k));
                let mut sum = 0.0;
                for (corner, (&dl, &dc)) in self.linear.iter().zip(&self.cubic).enumerate() {
                    let (a, b) = (corner % 2, corner / 2);
                    sum += dl * lin_u[a] * lin_v[b] + dc * cub_u[a] * cub_v[b];
                }
                // chain rule of the normalization
                out[i][k] += sum / (lu.powi(i as i32) * lv.powi(k as i32));
            }
        }
        out
    }

    /// Offset distance at `(u, v)`.
    pub fn value(&self, u: f64, v: f64, domain: &ParamRect) -> f64 {
        self.partials(u, v, domain)[0][0]
    }
}

impl Add for OffsetLaw {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let mut linear = self.linear;
        let mut cubic = self.cubic;
        for j in 0..4 {
            linear[j] += other.linear[j];
            cubic[j] += other.cubic[j];
        }
        Self {
            constant: self.constant + other.constant,
            linear,
            cubic,
        }
    }
}

/// A surface displaced along the unit normal of a base surface.
///
/// `P(u, v) = B(u, v) + f(u, v)·N(u, v)`. Partials of `P` expand the
/// product `f·N` with the Leibniz rule, which to third order gives
///
/// ```text
/// Puu  = Buu  + fuu N + 2 fu Nu + f Nuu
/// Puuv = Buuv + fuuv N + fuu Nv + 2 fuv Nu + 2 fu Nuv + fv Nuu + f Nuuv
/// ```
///
/// and their symmetric counterparts. `B` and `N` partials come from the
/// base surface's own jet and normal-jet queries.
///
/// The base is never itself an offset surface: offsetting an offset
/// surface offsets its base by the summed laws.
#[derive(Debug, Clone)]
pub struct OffsetSurface {
    base: Arc<dyn ParametricSurface>,
    law: OffsetLaw,
    cache: EvalCache<(f64, f64, DerivOrder), SurfaceJet>,
    tol: Tolerance,
}

impl OffsetSurface {
    /// Offset `base` by `law`.
    #[instrument(level = "debug", skip(base))]
    pub fn new(base: Arc<dyn ParametricSurface>, law: OffsetLaw) -> Result<Self, ConstructionError> {
        let (base, law) = match base.as_any().downcast_ref::<OffsetSurface>() {
            Some(inner) => {
                debug!("collapsing offset of an offset surface");
                (Arc::clone(&inner.base), inner.law + law)
            }
            None => (base, law),
        };
        validate_law(&law, &base.domain())?;
        Ok(Self {
            tol: base.tolerance(),
            base,
            law,
            cache: EvalCache::new(Default::default()),
        })
    }

    /// Offset `base` by a constant distance.
    pub fn constant(base: Arc<dyn ParametricSurface>, distance: f64) -> Result<Self, ConstructionError> {
        Self::new(base, OffsetLaw::constant(distance))
    }

    /// Adopt the tolerances and cache mode of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self.cache = EvalCache::new(config.multithreading);
        debug!(mode = ?config.multithreading, "offset cache mode");
        self
    }

    /// The displaced surface.
    pub fn base(&self) -> &Arc<dyn ParametricSurface> {
        &self.base
    }

    /// The offset law.
    pub fn law(&self) -> &OffsetLaw {
        &self.law
    }

    /// Replace the offset law.
    pub fn set_law(&mut self, law: OffsetLaw) -> Result<(), ConstructionError> {
        validate_law(&law, &self.base.domain())?;
        self.law = law;
        self.cache.clear();
        Ok(())
    }

    /// Offset distance at `(u, v)`.
    pub fn distance(&self, u: f64, v: f64) -> f64 {
        let c = self.check_params(u, v);
        self.law.value(c.u, c.v, &self.base.domain())
    }

    fn compute(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        let base = self.base.eval_raw(u, v, order);
        let normal = self.base.normal_jet_raw(u, v, order);
        let f = self.law.partials(u, v, &self.base.domain());

        let mut jet = SurfaceJet::at(base.point + normal.n * f[0][0]);
        for (i, k) in SurfaceJet::multi_indices(order) {
            let mut value = base.partial(i, k);
            for a in 0..=i {
                for b in 0..=k {
                    let coeff = binomial(i, a) * binomial(k, b) * f[a][b];
                    if coeff != 0.0 {
                        value += normal.partial(i - a, k - b) * coeff;
                    }
                }
            }
            jet.set_partial(i, k, value);
        }
        jet
    }
}

fn validate_law(law: &OffsetLaw, domain: &ParamRect) -> Result<(), ConstructionError> {
    if !law.is_finite() {
        return Err(ConstructionError::range("offset law is not finite"));
    }
    let bounded = domain.u.is_finite()
        && domain.v.is_finite()
        && domain.u.length() > 0.0
        && domain.v.length() > 0.0;
    if !law.is_constant() && !bounded {
        return Err(ConstructionError::range(
            "variable offset needs a bounded base domain",
        ));
    }
    if (domain.u.closed && !law.matches_across_u()) || (domain.v.closed && !law.matches_across_v()) {
        return Err(ConstructionError::range(
            "variable offset law differs across the seam of a closed direction",
        ));
    }
    Ok(())
}

impl ParametricSurface for OffsetSurface {
    fn domain(&self) -> ParamRect {
        self.base.domain()
    }

    fn eval_raw(&self, u: f64, v: f64, order: DerivOrder) -> SurfaceJet {
        self.cache
            .get_or_compute((u, v, order), || self.compute(u, v, order))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Offset
    }

    /// Exact for rigid motions and uniform scaling; the offset distance
    /// scales with the transform and flips sign under reflection.
    fn transformed(
        &self,
        reg: &mut Registry,
    ) -> Result<Arc<dyn ParametricSurface>, ConstructionError> {
        let det = reg.transform().linear().determinant();
        let factor = det.signum() * det.abs().cbrt();
        let base = reg.map_surface(&self.base)?;
        let mut image = Self::new(base, self.law.scaled(factor))?;
        image.tol = self.tol;
        image.cache = EvalCache::new(self.cache.mode());
        Ok(Arc::new(image))
    }

    fn encode(&self, writer: &mut ArchiveWriter) -> SurfaceRecord {
        SurfaceRecord::Offset {
            base: writer.prepare_write_surface(&self.base),
            law: self.law,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tolerance(&self) -> Tolerance {
        self.tol
    }

    fn u_poles(&self) -> Poles {
        self.base.u_poles()
    }

    fn v_poles(&self) -> Poles {
        self.base.v_poles()
    }

    fn is_similar(&self, other: &dyn ParametricSurface) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        let eps = self.tol.metric.max(other.tol.metric);
        let d = self.law + other.law.scaled(-1.0);
        d.constant.abs() <= eps
            && d.linear.iter().chain(&d.cubic).all(|x| x.abs() <= eps)
            && self.base.is_similar(other.base.as_ref())
    }
}
