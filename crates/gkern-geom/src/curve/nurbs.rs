use std::any::Any;
use std::sync::Arc;

use gkern_math::{
    reserve_for, AllocPolicy, ConstructionError, KernelConfig, ParamInterval, Point3, Tolerance,
    Vec3,
};
use tracing::instrument;

use super::{CurveKind, ParametricCurve};
use crate::archive::{ArchiveWriter, CurveRecord};
use crate::deriv::binomial;
use crate::{CurveJet, Registry};

// =============================================================================
// Knot vector utilities
// =============================================================================

/// Validate a knot vector: finite, non-decreasing, length =
/// `n_points + degree + 1`, with a non-empty parameter range.
pub fn validate_knots(knots: &[f64], n_points: usize, degree: usize) -> bool {
    if knots.len() != n_points + degree + 1 || knots.iter().any(|k| !k.is_finite()) {
        return false;
    }
    if knots.windows(2).any(|w| w[1] < w[0]) {
        return false;
    }
    knots[n_points] > knots[degree]
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to the valid
/// range `degree..=n`. Parameters outside the domain get the end spans, which
/// extends the end polynomial pieces.
pub fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = number of control points - 1 (last index)
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

fn ratio(num: f64, denom: f64) -> f64 {
    // zero-length knot interval
    if denom.abs() < 1e-30 {
        0.0
    } else {
        num / denom
    }
}

/// Non-zero basis functions and their derivatives up to `n` at `t`.
///
/// Row `k` holds the `k`-th derivatives of `N[span-degree..=span]`.
/// Requires `n <= degree`.
fn ders_basis_functions(knots: &[f64], span: usize, degree: usize, t: f64, n: usize) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            // lower triangle holds the knot differences
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ratio(ndu[r][j - 1], ndu[j][r]);
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; n + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
    for r in 0..=p {
        let (mut s1, mut s2) = (0, 1);
        a[0][0] = 1.0;
        for k in 1..=n {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if r >= k {
                let rk = rk as usize;
                a[s2][0] = ratio(a[s1][0], ndu[pk + 1][rk]);
                d = a[s2][0] * ndu[rk][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r as isize - 1 <= pk as isize { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[s2][j] = ratio(a[s1][j] - a[s1][j - 1], ndu[pk + 1][idx]);
                d += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                a[s2][k] = ratio(-a[s1][k - 1], ndu[pk + 1][r]);
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for (k, row) in ders.iter_mut().enumerate().skip(1) {
        for value in row.iter_mut() {
            *value *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

// =============================================================================
// NURBS curve
// =============================================================================

/// A rational B-spline (NURBS) curve in 3D.
///
/// Derivatives are analytic: basis function derivatives give the
/// derivatives of the homogeneous curve `A(t) = Σ Nᵢ wᵢ Pᵢ` and weight
/// `w(t) = Σ Nᵢ wᵢ`, and the quotient rule
/// `C⁽ᵏ⁾ = (A⁽ᵏ⁾ − Σᵢ₌₁ᵏ C(k,i) w⁽ⁱ⁾ C⁽ᵏ⁻ⁱ⁾) / w` recovers the curve.
#[derive(Debug, Clone)]
pub struct NurbsCurve {
    points: Vec<Point3>,
    weights: Vec<f64>,
    knots: Vec<f64>,
    degree: usize,
    domain: ParamInterval,
    tol: Tolerance,
}

impl NurbsCurve {
    /// Create a NURBS curve.
    ///
    /// The curve is closed when its two ends meet with matching first
    /// derivatives.
    #[instrument(level = "debug", skip_all, fields(points = points.len(), degree = degree))]
    pub fn new(
        points: Vec<Point3>,
        weights: Vec<f64>,
        knots: Vec<f64>,
        degree: usize,
    ) -> Result<Self, ConstructionError> {
        if degree == 0 {
            return Err(ConstructionError::range("nurbs degree must be at least 1"));
        }
        if points.len() < degree + 1 {
            return Err(ConstructionError::insufficient(format!(
                "degree {degree} nurbs needs {} control points, got {}",
                degree + 1,
                points.len()
            )));
        }
        if weights.len() != points.len() {
            return Err(ConstructionError::insufficient(format!(
                "{} weights for {} control points",
                weights.len(),
                points.len()
            )));
        }
        if weights.iter().any(|w| !(*w > 0.0) || !w.is_finite()) {
            return Err(ConstructionError::range("nurbs weights must be positive"));
        }
        if !validate_knots(&knots, points.len(), degree) {
            return Err(ConstructionError::range("invalid knot vector"));
        }
        let n = points.len() - 1;
        let mut curve = Self {
            domain: ParamInterval::bounded(knots[degree], knots[n + 1])?,
            points,
            weights,
            knots,
            degree,
            tol: Tolerance::DEFAULT,
        };
        curve.domain.closed = curve.ends_match();
        Ok(curve)
    }

    /// A non-rational B-spline.
    pub fn bspline(
        points: Vec<Point3>,
        knots: Vec<f64>,
        degree: usize,
    ) -> Result<Self, ConstructionError> {
        let weights = vec![1.0; points.len()];
        Self::new(points, weights, knots, degree)
    }

    /// A non-rational B-spline with a clamped, uniform knot vector on
    /// `[0, 1]`.
    pub fn clamped_uniform(points: Vec<Point3>, degree: usize) -> Result<Self, ConstructionError> {
        let n = points.len();
        if n < degree + 1 {
            return Err(ConstructionError::insufficient(format!(
                "degree {degree} nurbs needs {} control points, got {n}",
                degree + 1
            )));
        }
        let m = n + degree + 1;
        let mut knots = vec![0.0; m];
        let n_internal = m - 2 * (degree + 1);
        for i in 0..=degree {
            knots[m - 1 - i] = 1.0;
        }
        for i in 1..=n_internal {
            knots[degree + i] = i as f64 / (n_internal + 1) as f64;
        }
        Self::bspline(points, knots, degree)
    }

    /// A full circle of `radius` in the XY plane around `center`: 9 control
    /// points, degree 2.
    pub fn circle(center: Point3, radius: f64) -> Result<Self, ConstructionError> {
        if !(radius > 0.0) {
            return Err(ConstructionError::degenerate("circle radius must be positive"));
        }
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let r = radius;
        let c = center;
        let points = vec![
            Point3::new(c.x + r, c.y, c.z),
            Point3::new(c.x + r, c.y + r, c.z),
            Point3::new(c.x, c.y + r, c.z),
            Point3::new(c.x - r, c.y + r, c.z),
            Point3::new(c.x - r, c.y, c.z),
            Point3::new(c.x - r, c.y - r, c.z),
            Point3::new(c.x, c.y - r, c.z),
            Point3::new(c.x + r, c.y - r, c.z),
            Point3::new(c.x + r, c.y, c.z),
        ];
        let weights = vec![1.0, w, 1.0, w, 1.0, w, 1.0, w, 1.0];
        let knots = vec![0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0];
        Self::new(points, weights, knots, 2)
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(self, config: &KernelConfig) -> Self {
        self.with_tolerance(config.tolerance)
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Knot vector.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Control point weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Copy the control points into `out`.
    pub fn control_points(
        &self,
        out: &mut Vec<Point3>,
        policy: AllocPolicy,
    ) -> Result<(), ConstructionError> {
        reserve_for(out, self.points.len(), policy)?;
        out.extend_from_slice(&self.points);
        Ok(())
    }

    fn ends_match(&self) -> bool {
        let a = self.eval_raw(self.domain.min);
        let b = self.eval_raw(self.domain.max);
        let slope = 1e-9 * (1.0 + a.d1.norm().max(b.d1.norm()));
        self.tol.points_equal(&a.point, &b.point) && (a.d1 - b.d1).norm() <= slope
    }
}

impl ParametricCurve for NurbsCurve {
    fn domain(&self) -> ParamInterval {
        self.domain
    }

    fn eval_raw(&self, t: f64) -> CurveJet {
        let p = self.degree;
        let n = self.points.len() - 1;
        let order = p.min(3);
        let span = find_span(&self.knots, n, p, t);
        let ders = ders_basis_functions(&self.knots, span, p, t, order);

        // homogeneous derivatives A⁽ᵏ⁾ and w⁽ᵏ⁾
        let mut a = [Vec3::zeros(); 4];
        let mut w = [0.0; 4];
        for (k, row) in ders.iter().enumerate() {
            for (j, &b) in row.iter().enumerate() {
                let idx = span - p + j;
                let wb = b * self.weights[idx];
                a[k] += self.points[idx].coords * wb;
                w[k] += wb;
            }
        }
        if !(w[0].abs() > 1e-300) {
            return CurveJet::at(Point3::origin());
        }

        let mut c = [Vec3::zeros(); 4];
        for k in 0..4 {
            let mut v = a[k];
            for i in 1..=k {
                v -= c[k - i] * (binomial(k, i) * w[i]);
            }
            c[k] = v / w[0];
        }
        CurveJet {
            point: Point3::from(c[0]),
            d1: c[1],
            d2: c[2],
            d3: c[3],
        }
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Nurbs
    }

    fn transformed(&self, reg: &mut Registry) -> Result<Arc<dyn ParametricCurve>, ConstructionError> {
        let t = reg.transform();
        let points = self.points.iter().map(|p| t.apply_point(p)).collect();
        Ok(Arc::new(
            Self::new(points, self.weights.clone(), self.knots.clone(), self.degree)?
                .with_tolerance(self.tol),
        ))
    }

    fn encode(&self, _writer: &mut ArchiveWriter) -> CurveRecord {
        CurveRecord::Nurbs {
            points: self.points.clone(),
            weights: self.weights.clone(),
            knots: self.knots.clone(),
            degree: self.degree,
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
        self.degree == other.degree
            && self.points.len() == other.points.len()
            && self.knots.len() == other.knots.len()
            && self.knots.iter().zip(&other.knots).all(|(a, b)| (a - b).abs() <= eps)
            && self.weights.iter().zip(&other.weights).all(|(a, b)| (a - b).abs() <= eps)
            && self.points.iter().zip(&other.points).all(|(a, b)| (a - b).norm() <= eps)
    }
}

impl NurbsCurve {
    fn with_tolerance(mut self, tol: Tolerance) -> Self {
        self.tol = tol;
        self.domain.closed = self.ends_match();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::testing::check_derivatives;

    #[test]
    fn test_nurbs_circle() {
        let circle = NurbsCurve::circle(Point3::origin(), 5.0).unwrap();
        assert!(circle.is_closed());
        for i in 0..=20 {
            let p = circle.point_on(i as f64 / 20.0);
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 5.0).abs() < 1e-8, "radius at {i}: {r}");
            assert!(p.z.abs() < 1e-10);
        }
        let p = circle.point_on(0.25);
        assert!(p.x.abs() < 1e-8 && (p.y - 5.0).abs() < 1e-8);
    }

    #[test]
    fn test_nurbs_circle_derivatives() {
        let circle = NurbsCurve::circle(Point3::new(1.0, -2.0, 0.5), 3.0).unwrap();
        for &t in &[0.1, 0.4, 0.6, 0.9] {
            check_derivatives(&circle, t, 1e-6);
        }
        // tangent is perpendicular to the radius
        let p = circle.point_on(0.3);
        let d = circle.first_der(0.3);
        assert!((p - Point3::new(1.0, -2.0, 0.5)).dot(&d).abs() < 1e-8);
    }

    #[test]
    fn test_bspline_cubic_derivatives() {
        let curve = NurbsCurve::clamped_uniform(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(2.0, -1.0, 1.0),
                Point3::new(3.0, 1.0, 0.0),
                Point3::new(4.0, 0.0, 2.0),
            ],
            3,
        )
        .unwrap();
        assert!(!curve.is_closed());
        assert!((curve.start_point() - Point3::origin()).norm() < 1e-12);
        assert!((curve.end_point() - Point3::new(4.0, 0.0, 2.0)).norm() < 1e-12);
        for &t in &[0.05, 0.3, 0.7, 0.95] {
            check_derivatives(&curve, t, 1e-6);
        }
    }

    #[test]
    fn test_basis_derivative_rows() {
        let knots = vec![0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0];
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            let span = find_span(&knots, 5, 2, t);
            let ders = ders_basis_functions(&knots, span, 2, t, 2);
            let sum0: f64 = ders[0].iter().sum();
            let sum1: f64 = ders[1].iter().sum();
            let sum2: f64 = ders[2].iter().sum();
            assert!((sum0 - 1.0).abs() < 1e-10, "partition of unity at t={t}");
            assert!(sum1.abs() < 1e-9 && sum2.abs() < 1e-8);
        }
    }

    #[test]
    fn test_find_span() {
        let knots = vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0];
        assert_eq!(find_span(&knots, 3, 2, 0.0), 2);
        assert_eq!(find_span(&knots, 3, 2, 0.25), 2);
        assert_eq!(find_span(&knots, 3, 2, 0.5), 3);
        assert_eq!(find_span(&knots, 3, 2, 1.0), 3);
    }

    #[test]
    fn test_nurbs_rejects_bad_input() {
        let pts = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            NurbsCurve::clamped_uniform(pts.clone(), 3),
            Err(ConstructionError::InsufficientData(_))
        ));
        assert!(matches!(
            NurbsCurve::bspline(pts.clone(), vec![0.0, 1.0, 0.5, 1.0], 1),
            Err(ConstructionError::InvalidParameterRange(_))
        ));
        assert!(matches!(
            NurbsCurve::new(pts, vec![1.0, -1.0], vec![0.0, 0.0, 1.0, 1.0], 1),
            Err(ConstructionError::InvalidParameterRange(_))
        ));
    }

    #[test]
    fn test_nurbs_similarity() {
        let a = NurbsCurve::circle(Point3::origin(), 1.0).unwrap();
        let b = NurbsCurve::circle(Point3::origin(), 1.0).unwrap();
        let c = NurbsCurve::circle(Point3::origin(), 2.0).unwrap();
        assert!(a.is_similar(&b) && b.is_similar(&a));
        assert!(!a.is_similar(&c) && !c.is_similar(&a));
    }
}
