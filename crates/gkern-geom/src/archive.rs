//! Persistence of curve and surface graphs.
//!
//! An [`Archive`] holds two flat tables of records, one for curves and one
//! for surfaces. A record refers to its children by [`ObjectId`], the
//! child's index in its table. [`ArchiveWriter`] pushes children before
//! their owners and writes each shared `Arc` once, so decoding in table
//! order always finds every reference already built, and
//! [`ArchiveReader`] hands the same `Arc` to every owner of a shared child.
//!
//! ```
//! use std::sync::Arc;
//! use gkern_geom::{ArchiveReader, ArchiveWriter, LineSegment, ParametricCurve};
//! use gkern_math::{KernelConfig, Point3};
//!
//! let line: Arc<dyn ParametricCurve> =
//!     Arc::new(LineSegment::from_points(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap());
//! let mut writer = ArchiveWriter::new();
//! let id = writer.prepare_write_curve(&line);
//! let json = writer.finish().to_json().unwrap();
//!
//! let archive = gkern_geom::Archive::from_json(&json).unwrap();
//! let reader = ArchiveReader::read(&archive, &KernelConfig::default()).unwrap();
//! assert!(reader.curve(id).unwrap().is_similar(line.as_ref()));
//! ```

use std::sync::Arc;

use gkern_math::{
    ConstructionError, KernelConfig, ParamInterval, ParamRect, Placement, Point3, Vec3,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::blend::BlendKind;
use crate::registry::arc_key;
use crate::{
    ArcCurve, BezierCurve, CoonsSurface, ConeSurface, JoinSurface, LineSegment, NurbsCurve,
    OffsetLaw, OffsetSurface, ParametricCurve, ParametricSurface, PlaneSurface,
    RevolutionSurface, SphereSurface,
};

/// Format version written into every archive.
pub const ARCHIVE_VERSION: u32 = 1;

/// Index of a record in its archive table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl ObjectId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Persisted form of a curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveRecord {
    /// [`LineSegment`].
    Line {
        /// Point at `t = 0`.
        origin: Point3,
        /// Derivative.
        direction: Vec3,
        /// Parameter range.
        domain: ParamInterval,
    },
    /// [`ArcCurve`].
    Arc {
        /// Frame of the ellipse.
        placement: Placement,
        /// Radius along local X.
        major: f64,
        /// Radius along local Y.
        minor: f64,
        /// Angular range.
        domain: ParamInterval,
    },
    /// [`BezierCurve`].
    Bezier {
        /// Control points.
        points: Vec<Point3>,
    },
    /// [`NurbsCurve`].
    Nurbs {
        /// Control points.
        points: Vec<Point3>,
        /// One weight per control point.
        weights: Vec<f64>,
        /// Knot vector.
        knots: Vec<f64>,
        /// Polynomial degree.
        degree: usize,
    },
}

/// Persisted form of a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceRecord {
    /// [`PlaneSurface`].
    Plane {
        /// Frame of the plane.
        placement: Placement,
        /// Parameter rectangle.
        domain: ParamRect,
    },
    /// [`ConeSurface`].
    Cone {
        /// Frame of the cone.
        placement: Placement,
        /// Radius at `v = 0`.
        radius: f64,
        /// Half angle.
        angle: f64,
        /// Axial length of the unit `v` range.
        height: f64,
        /// Parameter rectangle.
        domain: ParamRect,
    },
    /// [`SphereSurface`].
    Sphere {
        /// Frame of the sphere.
        placement: Placement,
        /// Radius.
        radius: f64,
        /// Parameter rectangle.
        domain: ParamRect,
    },
    /// [`RevolutionSurface`].
    Revolution {
        /// Generatrix.
        curve: ObjectId,
        /// Frame whose Z axis is the rotation axis.
        placement: Placement,
        /// Sweep angle.
        angle: f64,
    },
    /// [`OffsetSurface`].
    Offset {
        /// Displaced surface.
        base: ObjectId,
        /// Offset distance field.
        law: OffsetLaw,
    },
    /// [`CoonsSurface`].
    Coons {
        /// Boundary curves `[c0, c1, d0, d1]`.
        curves: [ObjectId; 4],
    },
    /// [`JoinSurface`].
    Join {
        /// Curve along `v = 0`.
        first: ObjectId,
        /// Curve along `v = 1`.
        second: ObjectId,
        /// End weights.
        blend: BlendKind,
        /// Optional cross tangents.
        tangents: Option<[Vec3; 2]>,
    },
}

/// Errors from reading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The JSON text could not be (de)serialized.
    #[error("archive json: {0}")]
    Json(#[from] serde_json::Error),

    /// The archive was written by an incompatible format version.
    #[error("unsupported archive version {found}, expected {expected}")]
    Version {
        /// Version found in the archive.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// A record refers to an object that is not (yet) in its table.
    #[error("{kind} record {record} references missing {target} {id:?}")]
    DanglingReference {
        /// Table holding the bad record.
        kind: &'static str,
        /// Index of the bad record.
        record: usize,
        /// Table the reference points into.
        target: &'static str,
        /// The missing id.
        id: ObjectId,
    },

    /// A record decoded into parameters its constructor rejects.
    #[error("invalid record: {0}")]
    Construction(#[from] ConstructionError),
}

/// A serialized graph of curves and surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    /// Format version.
    pub version: u32,
    /// Curve table.
    pub curves: Vec<CurveRecord>,
    /// Surface table.
    pub surfaces: Vec<SurfaceRecord>,
}

impl Archive {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ArchiveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON written by [`Archive::to_json`].
    pub fn from_json(text: &str) -> Result<Self, ArchiveError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Collects records, writing each shared object once.
#[derive(Default)]
pub struct ArchiveWriter {
    curves: Vec<CurveRecord>,
    surfaces: Vec<SurfaceRecord>,
    curve_ids: FxHashMap<usize, ObjectId>,
    surface_ids: FxHashMap<usize, ObjectId>,
    // keeps registered addresses from being reused while writing
    pinned_curves: Vec<Arc<dyn ParametricCurve>>,
    pinned_surfaces: Vec<Arc<dyn ParametricSurface>>,
}

impl ArchiveWriter {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `curve`, writing its record unless it was seen before.
    pub fn prepare_write_curve(&mut self, curve: &Arc<dyn ParametricCurve>) -> ObjectId {
        let key = arc_key(curve);
        if let Some(&id) = self.curve_ids.get(&key) {
            return id;
        }
        let record = curve.encode(self);
        let id = ObjectId(self.curves.len() as u32);
        self.curves.push(record);
        self.curve_ids.insert(key, id);
        self.pinned_curves.push(Arc::clone(curve));
        id
    }

    /// Register `surface` and everything it references.
    pub fn prepare_write_surface(&mut self, surface: &Arc<dyn ParametricSurface>) -> ObjectId {
        let key = arc_key(surface);
        if let Some(&id) = self.surface_ids.get(&key) {
            return id;
        }
        // children land in the tables first
        let record = surface.encode(self);
        let id = ObjectId(self.surfaces.len() as u32);
        self.surfaces.push(record);
        self.surface_ids.insert(key, id);
        self.pinned_surfaces.push(Arc::clone(surface));
        id
    }

    /// The finished archive.
    pub fn finish(self) -> Archive {
        debug!(
            curves = self.curves.len(),
            surfaces = self.surfaces.len(),
            "archive written"
        );
        Archive {
            version: ARCHIVE_VERSION,
            curves: self.curves,
            surfaces: self.surfaces,
        }
    }
}

/// Rebuilds the objects of an [`Archive`].
pub struct ArchiveReader {
    curves: Vec<Arc<dyn ParametricCurve>>,
    surfaces: Vec<Arc<dyn ParametricSurface>>,
}

impl ArchiveReader {
    /// Decode every record in table order.
    ///
    /// Every object is built through its public constructor and then given
    /// the tolerances and cache mode of `config`.
    pub fn read(archive: &Archive, config: &KernelConfig) -> Result<Self, ArchiveError> {
        if archive.version != ARCHIVE_VERSION {
            return Err(ArchiveError::Version {
                found: archive.version,
                expected: ARCHIVE_VERSION,
            });
        }
        let mut reader = Self {
            curves: Vec::with_capacity(archive.curves.len()),
            surfaces: Vec::with_capacity(archive.surfaces.len()),
        };
        for record in &archive.curves {
            let curve = decode_curve(record, config)?;
            reader.curves.push(curve);
        }
        for (index, record) in archive.surfaces.iter().enumerate() {
            let surface = reader.decode_surface(index, record, config)?;
            reader.surfaces.push(surface);
        }
        debug!(
            curves = reader.curves.len(),
            surfaces = reader.surfaces.len(),
            "archive read"
        );
        Ok(reader)
    }

    /// Decoded curve `id`.
    pub fn curve(&self, id: ObjectId) -> Option<&Arc<dyn ParametricCurve>> {
        self.curves.get(id.index())
    }

    /// Decoded surface `id`.
    pub fn surface(&self, id: ObjectId) -> Option<&Arc<dyn ParametricSurface>> {
        self.surfaces.get(id.index())
    }

    /// Every decoded curve in table order.
    pub fn curves(&self) -> &[Arc<dyn ParametricCurve>] {
        &self.curves
    }

    /// Every decoded surface in table order.
    pub fn surfaces(&self) -> &[Arc<dyn ParametricSurface>] {
        &self.surfaces
    }

    fn linked_curve(&self, record: usize, id: ObjectId) -> Result<Arc<dyn ParametricCurve>, ArchiveError> {
        self.curve(id)
            .cloned()
            .ok_or(ArchiveError::DanglingReference {
                kind: "surface",
                record,
                target: "curve",
                id,
            })
    }

    fn linked_surface(
        &self,
        record: usize,
        id: ObjectId,
    ) -> Result<Arc<dyn ParametricSurface>, ArchiveError> {
        // only earlier records are built yet
        self.surface(id)
            .cloned()
            .ok_or(ArchiveError::DanglingReference {
                kind: "surface",
                record,
                target: "surface",
                id,
            })
    }

    fn decode_surface(
        &self,
        index: usize,
        record: &SurfaceRecord,
        config: &KernelConfig,
    ) -> Result<Arc<dyn ParametricSurface>, ArchiveError> {
        Ok(match record {
            SurfaceRecord::Plane { placement, domain } => {
                Arc::new(PlaneSurface::new(placement.clone(), *domain)?.with_config(config))
            }
            SurfaceRecord::Cone {
                placement,
                radius,
                angle,
                height,
                domain,
            } => {
                let mut cone = ConeSurface::with_v_range(
                    placement.clone(),
                    *radius,
                    *angle,
                    *height,
                    domain.v.min,
                    domain.v.max,
                )?;
                cone.set_u_limit(domain.u.min, domain.u.max)?;
                Arc::new(cone.with_config(config))
            }
            SurfaceRecord::Sphere {
                placement,
                radius,
                domain,
            } => Arc::new(
                SphereSurface::new(placement.clone(), *radius)?
                    .with_domain(*domain)?
                    .with_config(config),
            ),
            SurfaceRecord::Revolution {
                curve,
                placement,
                angle,
            } => {
                let curve = self.linked_curve(index, *curve)?;
                Arc::new(RevolutionSurface::new(curve, placement.clone(), *angle)?.with_config(config))
            }
            SurfaceRecord::Offset { base, law } => {
                let base = self.linked_surface(index, *base)?;
                Arc::new(OffsetSurface::new(base, *law)?.with_config(config))
            }
            SurfaceRecord::Coons { curves } => {
                let [c0, c1, d0, d1] = *curves;
                let curves = [
                    self.linked_curve(index, c0)?,
                    self.linked_curve(index, c1)?,
                    self.linked_curve(index, d0)?,
                    self.linked_curve(index, d1)?,
                ];
                Arc::new(CoonsSurface::new(curves)?.with_config(config))
            }
            SurfaceRecord::Join {
                first,
                second,
                blend,
                tangents,
            } => {
                let first = self.linked_curve(index, *first)?;
                let second = self.linked_curve(index, *second)?;
                Arc::new(JoinSurface::new(first, second, *blend, *tangents)?.with_config(config))
            }
        })
    }
}

fn decode_curve(
    record: &CurveRecord,
    config: &KernelConfig,
) -> Result<Arc<dyn ParametricCurve>, ArchiveError> {
    Ok(match record {
        CurveRecord::Line {
            origin,
            direction,
            domain,
        } => Arc::new(LineSegment::new(*origin, *direction, *domain)?.with_config(config)),
        CurveRecord::Arc {
            placement,
            major,
            minor,
            domain,
        } => Arc::new(
            ArcCurve::new(placement.clone(), *major, *minor, domain.min, domain.max)?
                .with_config(config),
        ),
        CurveRecord::Bezier { points } => {
            Arc::new(BezierCurve::new(points.clone())?.with_config(config))
        }
        CurveRecord::Nurbs {
            points,
            weights,
            knots,
            degree,
        } => Arc::new(
            NurbsCurve::new(points.clone(), weights.clone(), knots.clone(), *degree)?
                .with_config(config),
        ),
    })
}
