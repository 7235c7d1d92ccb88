//! Local coordinate frames.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::{any_perpendicular, ConstructionError, Point3, Transform, Vec3};

/// A local frame: origin plus three basis vectors.
///
/// The basis is orthonormal when built with [`Placement::from_axis`] but may
/// be any non-singular affine basis, which keeps placements exact under
/// non-uniform scaling. The inverse basis is stored alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlacementAxes", into = "PlacementAxes")]
pub struct Placement {
    origin: Point3,
    axes: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

/// Serialized form of a [`Placement`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementAxes {
    origin: Point3,
    x: Vec3,
    y: Vec3,
    z: Vec3,
}

impl Placement {
    /// The world frame.
    pub fn identity() -> Self {
        Self {
            origin: Point3::origin(),
            axes: Matrix3::identity(),
            inverse: Matrix3::identity(),
        }
    }

    /// A frame from explicit basis vectors.
    pub fn from_axes(origin: Point3, x: Vec3, y: Vec3, z: Vec3) -> Result<Self, ConstructionError> {
        let axes = Matrix3::from_columns(&[x, y, z]);
        let inverse = axes
            .try_inverse()
            .filter(|_| axes.determinant().abs() > 1e-14)
            .ok_or_else(|| ConstructionError::degenerate("placement axes are linearly dependent"))?;
        Ok(Self {
            origin,
            axes,
            inverse,
        })
    }

    /// An orthonormal frame with local Z along `axis` and local X as close
    /// to `ref_dir` as possible.
    ///
    /// A `ref_dir` parallel to `axis` falls back to an arbitrary
    /// perpendicular.
    pub fn from_axis(origin: Point3, axis: Vec3, ref_dir: Vec3) -> Result<Self, ConstructionError> {
        let len = axis.norm();
        if !(len > 1e-12) {
            return Err(ConstructionError::degenerate("placement axis has zero length"));
        }
        let z = axis / len;
        let projected = ref_dir - ref_dir.dot(&z) * z;
        let x = if projected.norm() > 1e-12 {
            projected.normalize()
        } else {
            any_perpendicular(&z)
        };
        let y = z.cross(&x);
        Self::from_axes(origin, x, y, z)
    }

    /// Origin of the frame.
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// Local X axis in world coordinates.
    pub fn x(&self) -> Vec3 {
        self.axes.column(0).into_owned()
    }

    /// Local Y axis in world coordinates.
    pub fn y(&self) -> Vec3 {
        self.axes.column(1).into_owned()
    }

    /// Local Z axis in world coordinates.
    pub fn z(&self) -> Vec3 {
        self.axes.column(2).into_owned()
    }

    /// Local coordinates to a world point.
    pub fn to_world_point(&self, local: &Vec3) -> Point3 {
        self.origin + self.axes * local
    }

    /// Local components to a world vector.
    pub fn to_world_vec(&self, local: &Vec3) -> Vec3 {
        self.axes * local
    }

    /// World point to local coordinates.
    pub fn to_local_point(&self, p: &Point3) -> Vec3 {
        self.inverse * (p - self.origin)
    }

    /// World vector to local components.
    pub fn to_local_vec(&self, v: &Vec3) -> Vec3 {
        self.inverse * v
    }

    /// The frame carried by an affine transform.
    pub fn transformed(&self, t: &Transform) -> Result<Self, ConstructionError> {
        Self::from_axes(
            t.apply_point(&self.origin),
            t.apply_vec(&self.x()),
            t.apply_vec(&self.y()),
            t.apply_vec(&self.z()),
        )
    }

    /// Whether the basis is orthonormal and right-handed within `eps`.
    pub fn is_orthonormal(&self, eps: f64) -> bool {
        (self.axes.transpose() * self.axes - Matrix3::identity()).amax() <= eps
            && self.axes.determinant() > 0.0
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::identity()
    }
}

impl TryFrom<PlacementAxes> for Placement {
    type Error = ConstructionError;

    fn try_from(p: PlacementAxes) -> Result<Self, Self::Error> {
        Self::from_axes(p.origin, p.x, p.y, p.z)
    }
}

impl From<Placement> for PlacementAxes {
    fn from(p: Placement) -> Self {
        Self {
            origin: p.origin,
            x: p.x(),
            y: p.y(),
            z: p.z(),
        }
    }
}
