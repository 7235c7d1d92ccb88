//! Derivative jets: a point together with its partial derivatives.

use gkern_math::{Point3, Vec3};

/// Highest derivative order an evaluation must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DerivOrder {
    /// Point and first derivatives.
    First = 1,
    /// Up to second derivatives.
    Second = 2,
    /// Up to third derivatives.
    Third = 3,
}

impl DerivOrder {
    /// The next order up, saturating at [`DerivOrder::Third`].
    pub fn next(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second | Self::Third => Self::Third,
        }
    }

    /// Numeric order.
    pub fn get(self) -> usize {
        self as usize
    }
}

/// Point and first three derivatives of a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveJet {
    /// `C(t)`.
    pub point: Point3,
    /// `C'(t)`.
    pub d1: Vec3,
    /// `C''(t)`.
    pub d2: Vec3,
    /// `C'''(t)`.
    pub d3: Vec3,
}

impl CurveJet {
    /// A jet with all derivatives zero.
    pub fn at(point: Point3) -> Self {
        Self {
            point,
            d1: Vec3::zeros(),
            d2: Vec3::zeros(),
            d3: Vec3::zeros(),
        }
    }

    /// The `k`-th derivative for `k` in `1..=3`; zero beyond.
    pub fn derivative(&self, k: usize) -> Vec3 {
        match k {
            1 => self.d1,
            2 => self.d2,
            3 => self.d3,
            _ => Vec3::zeros(),
        }
    }

    /// Reparameterize by `t = t0 + s·scale`: derivatives pick up `scaleᵏ`.
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            point: self.point,
            d1: self.d1 * scale,
            d2: self.d2 * (scale * scale),
            d3: self.d3 * (scale * scale * scale),
        }
    }
}

/// Point and partial derivatives of a surface up to third order.
///
/// Entries above the requested [`DerivOrder`] are left at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceJet {
    /// `P(u, v)`.
    pub point: Point3,
    /// `∂P/∂u`.
    pub du: Vec3,
    /// `∂P/∂v`.
    pub dv: Vec3,
    /// `∂²P/∂u²`.
    pub duu: Vec3,
    /// `∂²P/∂u∂v`.
    pub duv: Vec3,
    /// `∂²P/∂v²`.
    pub dvv: Vec3,
    /// `∂³P/∂u³`.
    pub duuu: Vec3,
    /// `∂³P/∂u²∂v`.
    pub duuv: Vec3,
    /// `∂³P/∂u∂v²`.
    pub duvv: Vec3,
    /// `∂³P/∂v³`.
    pub dvvv: Vec3,
}

impl SurfaceJet {
    /// A jet with all derivatives zero.
    pub fn at(point: Point3) -> Self {
        let z = Vec3::zeros();
        Self {
            point,
            du: z,
            dv: z,
            duu: z,
            duv: z,
            dvv: z,
            duuu: z,
            duuv: z,
            duvv: z,
            dvvv: z,
        }
    }

    /// The partial `∂^(i+k) P / ∂u^i ∂v^k` for `1 <= i + k <= 3`.
    pub fn partial(&self, i: usize, k: usize) -> Vec3 {
        match (i, k) {
            (1, 0) => self.du,
            (0, 1) => self.dv,
            (2, 0) => self.duu,
            (1, 1) => self.duv,
            (0, 2) => self.dvv,
            (3, 0) => self.duuu,
            (2, 1) => self.duuv,
            (1, 2) => self.duvv,
            (0, 3) => self.dvvv,
            _ => Vec3::zeros(),
        }
    }

    /// Store a partial; `(0, 0)` and orders above three are ignored.
    pub fn set_partial(&mut self, i: usize, k: usize, value: Vec3) {
        let slot = match (i, k) {
            (1, 0) => &mut self.du,
            (0, 1) => &mut self.dv,
            (2, 0) => &mut self.duu,
            (1, 1) => &mut self.duv,
            (0, 2) => &mut self.dvv,
            (3, 0) => &mut self.duuu,
            (2, 1) => &mut self.duuv,
            (1, 2) => &mut self.duvv,
            (0, 3) => &mut self.dvvv,
            _ => return,
        };
        *slot = value;
    }

    /// Every `(i, k)` with `1 <= i + k <= order`.
    pub fn multi_indices(order: DerivOrder) -> impl Iterator<Item = (usize, usize)> {
        let max = order.get();
        (1..=max).flat_map(|total| (0..=total).map(move |k| (total - k, k)))
    }

    /// Zero every partial above `order`.
    pub fn truncate(&mut self, order: DerivOrder) {
        let z = Vec3::zeros();
        if order < DerivOrder::Second {
            self.duu = z;
            self.duv = z;
            self.dvv = z;
        }
        if order < DerivOrder::Third {
            self.duuu = z;
            self.duuv = z;
            self.duvv = z;
            self.dvvv = z;
        }
    }
}

/// Unit normal field and its partials up to third order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalJet {
    /// Unit normal, or zero when fully degenerate.
    pub n: Vec3,
    /// `∂N/∂u`.
    pub nu: Vec3,
    /// `∂N/∂v`.
    pub nv: Vec3,
    /// `∂²N/∂u²`.
    pub nuu: Vec3,
    /// `∂²N/∂u∂v`.
    pub nuv: Vec3,
    /// `∂²N/∂v²`.
    pub nvv: Vec3,
    /// `∂³N/∂u³`.
    pub nuuu: Vec3,
    /// `∂³N/∂u²∂v`.
    pub nuuv: Vec3,
    /// `∂³N/∂u∂v²`.
    pub nuvv: Vec3,
    /// `∂³N/∂v³`.
    pub nvvv: Vec3,
}

impl NormalJet {
    /// A constant normal field.
    pub fn constant(n: Vec3) -> Self {
        let z = Vec3::zeros();
        Self {
            n,
            nu: z,
            nv: z,
            nuu: z,
            nuv: z,
            nvv: z,
            nuuu: z,
            nuuv: z,
            nuvv: z,
            nvvv: z,
        }
    }

    /// The partial `∂^(i+k) N / ∂u^i ∂v^k` for `i + k <= 3`; `(0, 0)` is
    /// the normal itself.
    pub fn partial(&self, i: usize, k: usize) -> Vec3 {
        match (i, k) {
            (0, 0) => self.n,
            (1, 0) => self.nu,
            (0, 1) => self.nv,
            (2, 0) => self.nuu,
            (1, 1) => self.nuv,
            (0, 2) => self.nvv,
            (3, 0) => self.nuuu,
            (2, 1) => self.nuuv,
            (1, 2) => self.nuvv,
            (0, 3) => self.nvvv,
            _ => Vec3::zeros(),
        }
    }
}

/// `(cos, sin)` of `x + k·π/2` given `(cos x, sin x)`.
///
/// This is the `k`-th derivative of `(cos x, sin x)`; the 4-cycle is
/// applied by table so repeated differentiation stays exact.
pub fn trig_shift(k: usize, c: f64, s: f64) -> (f64, f64) {
    match k % 4 {
        0 => (c, s),
        1 => (-s, c),
        2 => (-c, -s),
        _ => (s, -c),
    }
}

/// Normalize a one-parameter vector field and differentiate the result.
///
/// Given `m, m', m''` returns `n = m/|m|` with `n'` and `n''`, or `None`
/// when `|m|` vanishes.
pub fn unit_jet(m: Vec3, m1: Vec3, m2: Vec3) -> Option<(Vec3, Vec3, Vec3)> {
    let len = m.norm();
    if !(len > 1e-300) {
        return None;
    }
    let n = m / len;
    let len1 = n.dot(&m1);
    let n1 = (m1 - n * len1) / len;
    let n2 = (m2 - n1 * len1 - n * (n1.dot(&m1) + n.dot(&m2))) / len - n1 * (len1 / len);
    Some((n, n1, n2))
}

/// Binomial coefficient for small arguments.
pub(crate) fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}
