#![warn(missing_docs)]

//! Math types for the gkern geometric kernel.
//!
//! Thin wrappers around nalgebra providing the vocabulary shared by every
//! curve and surface: points, vectors, affine transforms, the tolerance
//! registry, parametric intervals and rectangles, bounding boxes and local
//! placements.

use nalgebra::{Matrix3, Matrix4, Rotation3, Unit, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

mod bbox;
mod config;
mod error;
mod interval;
mod placement;

pub use bbox::BoundingBox;
pub use config::{reserve_for, AllocPolicy, KernelConfig, MultithreadingMode};
pub use error::{ConfigError, ConstructionError};
pub use interval::{ParamInterval, ParamRect};
pub use placement::Placement;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 3x3 matrix, used for frames and their derivatives.
pub type Mat3 = Matrix3<f64>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `offset`.
    pub fn translation(offset: Vec3) -> Self {
        Self {
            matrix: Matrix4::new_translation(&offset),
        }
    }

    /// Non-uniform scale about the origin.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(sx, sy, sz)),
        }
    }

    /// Rotation by `angle` radians about an axis through `origin`.
    pub fn rotation(origin: &Point3, axis: &Dir3, angle: f64) -> Self {
        let rot = Rotation3::from_axis_angle(axis, angle).to_homogeneous();
        let to = Matrix4::new_translation(&origin.coords);
        let back = Matrix4::new_translation(&-origin.coords);
        Self {
            matrix: to * rot * back,
        }
    }

    /// Compose: apply `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a vector (translation is ignored).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.linear() * v
    }

    /// Upper-left 3x3 block.
    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Whether the transform is the identity within `eps` per entry.
    pub fn is_identity(&self, eps: f64) -> bool {
        (self.matrix - Matrix4::identity()).amax() <= eps
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Named epsilons used by every geometric predicate.
///
/// Copied by value into each curve and surface at construction, so two
/// objects built with different tolerances never influence each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
    /// Tolerance on parameter values.
    pub parametric: f64,
    /// Coarse metric tolerance for similarity checks between objects.
    pub metric: f64,
}

impl Tolerance {
    /// Default kernel tolerances.
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-9,
        parametric: 1e-10,
        metric: 1e-3,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if two angles are effectively equal (in radians).
    pub fn angles_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.angular
    }

    /// Check if two parameter values are effectively equal.
    pub fn params_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.parametric
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Pick a unit vector perpendicular to `n`.
///
/// `n` is assumed non-zero.
pub fn any_perpendicular(n: &Vec3) -> Vec3 {
    let arbitrary = if n.x.abs() < 0.9 * n.norm() {
        Vec3::x()
    } else {
        Vec3::y()
    };
    arbitrary.cross(n).normalize()
}
