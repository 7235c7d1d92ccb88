//! One-dimensional blending bases shared by offset laws, Coons patches and
//! join surfaces.

/// Cubic Hermite basis `[h0, h1, h2, h3]` or one of its derivatives at `w`.
///
/// `h0`/`h1` carry the end values, `h2`/`h3` the end slopes:
///
/// ```text
/// h0 = 1 - 3w² + 2w³     h1 = 3w² - 2w³
/// h2 = w - 2w² + w³      h3 = -w² + w³
/// ```
///
/// `order` is the derivative order; orders above three are zero.
pub fn hermite(w: f64, order: usize) -> [f64; 4] {
    let w2 = w * w;
    let w3 = w2 * w;
    match order {
        0 => [
            1.0 - 3.0 * w2 + 2.0 * w3,
            3.0 * w2 - 2.0 * w3,
            w - 2.0 * w2 + w3,
            -w2 + w3,
        ],
        1 => [
            -6.0 * w + 6.0 * w2,
            6.0 * w - 6.0 * w2,
            1.0 - 4.0 * w + 3.0 * w2,
            -2.0 * w + 3.0 * w2,
        ],
        2 => [
            -6.0 + 12.0 * w,
            6.0 - 12.0 * w,
            -4.0 + 6.0 * w,
            -2.0 + 6.0 * w,
        ],
        3 => [12.0, -12.0, 6.0, 6.0],
        _ => [0.0; 4],
    }
}

/// Linear basis `[1 - w, w]` or one of its derivatives.
pub fn linear(w: f64, order: usize) -> [f64; 2] {
    match order {
        0 => [1.0 - w, w],
        1 => [-1.0, 1.0],
        _ => [0.0; 2],
    }
}

/// Which pair of end weights a two-sided blend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendKind {
    /// `[1 - w, w]`.
    Linear,
    /// `[h0, h1]`: zero slope at both ends.
    Cubic,
}

impl BlendKind {
    /// The two end weights (or a derivative of them) at `w`.
    pub fn weights(self, w: f64, order: usize) -> [f64; 2] {
        match self {
            Self::Linear => linear(w, order),
            Self::Cubic => {
                let h = hermite(w, order);
                [h[0], h[1]]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hermite_endpoint_conditions() {
        let at0 = hermite(0.0, 0);
        let at1 = hermite(1.0, 0);
        let d0 = hermite(0.0, 1);
        let d1 = hermite(1.0, 1);
        // h0: value 1 -> 0, flat at both ends
        assert_eq!((at0[0], at1[0], d0[0], d1[0]), (1.0, 0.0, 0.0, 0.0));
        // h1: value 0 -> 1, flat at both ends
        assert_eq!((at0[1], at1[1], d0[1], d1[1]), (0.0, 1.0, 0.0, 0.0));
        // h2: zero values, slope 1 at w=0, 0 at w=1
        assert_eq!((at0[2], at1[2], d0[2], d1[2]), (0.0, 0.0, 1.0, 0.0));
        // h3: zero values, slope 0 at w=0, 1 at w=1
        assert_eq!((at0[3], at1[3], d0[3], d1[3]), (0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_hermite_partition_of_unity() {
        for i in 0..=10 {
            let w = i as f64 / 10.0;
            let h = hermite(w, 0);
            assert!((h[0] + h[1] - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn test_hermite_derivatives_match_differences() {
        let eps = 1e-6;
        for &w in &[0.1, 0.45, 0.9] {
            for order in 0..3 {
                let lo = hermite(w - eps, order);
                let hi = hermite(w + eps, order);
                let d = hermite(w, order + 1);
                for j in 0..4 {
                    let fd = (hi[j] - lo[j]) / (2.0 * eps);
                    assert!((fd - d[j]).abs() < 1e-6, "order {order} basis {j}");
                }
            }
        }
        assert_eq!(hermite(0.3, 4), [0.0; 4]);
    }

    #[test]
    fn test_blend_kinds() {
        assert_eq!(BlendKind::Linear.weights(0.25, 0), [0.75, 0.25]);
        assert_eq!(BlendKind::Linear.weights(0.25, 2), [0.0, 0.0]);
        let c = BlendKind::Cubic.weights(0.5, 0);
        assert!((c[0] - 0.5).abs() < 1e-15 && (c[1] - 0.5).abs() < 1e-15);
    }
}
