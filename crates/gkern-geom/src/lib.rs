#![warn(missing_docs)]

//! Parametric curves and surfaces for the gkern geometric kernel.
//!
//! Every curve and surface exposes one evaluation contract with two
//! paths. The checked path ([`Extension::Checked`]) clamps or wraps the
//! parameters into the domain and stops them at surface poles before
//! evaluating. The extended path ([`Extension::Extended`]) evaluates the
//! analytic formula at the literal parameters, which is what solvers
//! that step outside the domain need.
//!
//! Surfaces built on other geometry (revolution, offset, Coons, join)
//! share their children through `Arc`. [`Registry`] maps such graphs
//! through a transform or a deep copy, and [`ArchiveWriter`] /
//! [`ArchiveReader`] persist them, each writing or mapping a shared child
//! exactly once.
//!
//! ```
//! use std::f64::consts::FRAC_PI_4;
//! use gkern_geom::{ConeSurface, ParametricSurface};
//! use gkern_math::{Placement, Point3};
//!
//! let cone = ConeSurface::new(Placement::identity(), 1.0, FRAC_PI_4, 2.0).unwrap();
//! let apex = cone.v_pole().unwrap();
//! assert!((apex + 0.5).abs() < 1e-12);
//! assert!((cone.point_on(0.0, 0.5) - Point3::new(2.0, 0.0, 1.0)).norm() < 1e-12);
//! ```

pub mod archive;
pub mod blend;
pub mod cache;
pub mod curve;
pub mod deriv;
pub mod pole;
pub mod registry;
pub mod spine;
pub mod surface;

pub use archive::{
    Archive, ArchiveError, ArchiveReader, ArchiveWriter, CurveRecord, ObjectId, SurfaceRecord,
    ARCHIVE_VERSION,
};
pub use blend::BlendKind;
pub use cache::EvalCache;
pub use curve::{
    ArcCurve, BezierCurve, CurveEval, CurveKind, LineSegment, NurbsCurve, ParametricCurve,
};
pub use deriv::{CurveJet, DerivOrder, NormalJet, SurfaceJet};
pub use pole::{PoleCheck, Poles};
pub use registry::Registry;
pub use spine::{FrameJet, Spine};
pub use surface::{
    project_point, CheckedParams, CoonsSurface, ConeSurface, EvalRequest, JoinSurface, OffsetLaw,
    OffsetSurface, ParametricSurface, PlaneSurface, Projection, RevolutionSurface, SphereSurface,
    SurfaceEval, SurfaceKind,
};

/// Which evaluation path a query takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Extension {
    /// Clamp or wrap into the domain and stop at poles first.
    #[default]
    Checked,
    /// Evaluate at the literal parameters, outside the domain included.
    Extended,
}
