use std::any::Any;
use std::sync::Arc;

use gkern_math::{
    reserve_for, AllocPolicy, ConstructionError, KernelConfig, ParamInterval, Point3, Tolerance,
    Vec3,
};
use smallvec::SmallVec;

use super::{CurveKind, ParametricCurve};
use crate::archive::{ArchiveWriter, CurveRecord};
use crate::{CurveJet, Registry};

/// A polynomial Bezier curve on `[0, 1]`.
///
/// Derivatives come from the hodographs (difference nets) of the control
/// polygon, each evaluated with de Casteljau's algorithm.
#[derive(Debug, Clone)]
pub struct BezierCurve {
    points: Vec<Point3>,
    hodographs: [Vec<Vec3>; 3],
    tol: Tolerance,
}

impl BezierCurve {
    /// A Bezier curve through its control polygon.
    pub fn new(points: Vec<Point3>) -> Result<Self, ConstructionError> {
        if points.len() < 2 {
            return Err(ConstructionError::insufficient(format!(
                "bezier curve needs at least 2 control points, got {}",
                points.len()
            )));
        }
        let net: Vec<Vec3> = points.iter().map(|p| p.coords).collect();
        let d1 = difference_net(&net);
        let d2 = difference_net(&d1);
        let d3 = difference_net(&d2);
        Ok(Self {
            points,
            hodographs: [d1, d2, d3],
            tol: Tolerance::DEFAULT,
        })
    }

    /// Adopt the tolerances of `config`.
    pub fn with_config(mut self, config: &KernelConfig) -> Self {
        self.tol = config.tolerance;
        self
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.points.len() - 1
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
}

/// Scaled forward differences `n·(Pᵢ₊₁ − Pᵢ)`: the control net of the
/// derivative curve.
fn difference_net(net: &[Vec3]) -> Vec<Vec3> {
    let n = net.len().saturating_sub(1) as f64;
    net.windows(2).map(|w| (w[1] - w[0]) * n).collect()
}

fn de_casteljau(net: &[Vec3], t: f64) -> Vec3 {
    let mut work: SmallVec<[Vec3; 8]> = net.iter().copied().collect();
    let Some(len) = work.len().checked_sub(1) else {
        return Vec3::zeros();
    };
    for level in (1..=len).rev() {
        for i in 0..level {
            work[i] = work[i] * (1.0 - t) + work[i + 1] * t;
        }
    }
    work[0]
}

impl ParametricCurve for BezierCurve {
    fn domain(&self) -> ParamInterval {
        ParamInterval::unit()
    }

    fn eval_raw(&self, t: f64) -> CurveJet {
        let net: SmallVec<[Vec3; 8]> = self.points.iter().map(|p| p.coords).collect();
        CurveJet {
            point: Point3::from(de_casteljau(&net, t)),
            d1: de_casteljau(&self.hodographs[0], t),
            d2: de_casteljau(&self.hodographs[1], t),
            d3: de_casteljau(&self.hodographs[2], t),
        }
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Bezier
    }

    fn transformed(&self, reg: &mut Registry) -> Result<Arc<dyn ParametricCurve>, ConstructionError> {
        let t = reg.transform();
        let points = self.points.iter().map(|p| t.apply_point(p)).collect();
        Ok(Arc::new(Self {
            tol: self.tol,
            ..Self::new(points)?
        }))
    }

    fn encode(&self, _writer: &mut ArchiveWriter) -> CurveRecord {
        CurveRecord::Bezier {
            points: self.points.clone(),
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
        self.points.len() == other.points.len()
            && self
                .points
                .iter()
                .zip(&other.points)
                .all(|(a, b)| (a - b).norm() <= eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::testing::check_derivatives;

    fn cubic() -> BezierCurve {
        BezierCurve::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(3.0, 2.0, 1.0),
            Point3::new(4.0, 0.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_bezier_endpoints() {
        let c = cubic();
        assert_eq!(c.degree(), 3);
        assert!((c.start_point() - Point3::origin()).norm() < 1e-15);
        assert!((c.end_point() - Point3::new(4.0, 0.0, 0.0)).norm() < 1e-15);
        // end tangent is n·(P1 - P0)
        assert!((c.first_der(0.0) - Vec3::new(3.0, 6.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_bezier_derivatives() {
        let c = cubic();
        for &t in &[0.0, 0.2, 0.5, 0.9] {
            check_derivatives(&c, t, 1e-7);
        }
        // cubic: third derivative is constant
        assert!((c.third_der(0.1) - c.third_der(0.8)).norm() < 1e-12);
    }

    #[test]
    fn test_bezier_needs_two_points() {
        assert!(matches!(
            BezierCurve::new(vec![Point3::origin()]),
            Err(ConstructionError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_linear_bezier_has_no_curvature() {
        let c = BezierCurve::new(vec![Point3::origin(), Point3::new(2.0, 0.0, 0.0)]).unwrap();
        assert_eq!(c.second_der(0.5), Vec3::zeros());
        assert_eq!(c.third_der(0.5), Vec3::zeros());
        let mut out = Vec::new();
        c.control_points(&mut out, AllocPolicy::Propagate).unwrap();
        assert_eq!(out.len(), 2);
    }
}
