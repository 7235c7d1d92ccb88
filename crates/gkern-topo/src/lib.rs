#![warn(missing_docs)]

//! Solid boundary contract over gkern surfaces.
//!
//! A [`Solid`] is an ordered list of [`Face`]s, each referencing a shared
//! surface and an orientation. Faces only rely on what surfaces expose
//! (evaluation, normals and domain queries); how faces are stitched along
//! edges is left to the modeling layer above.

use std::sync::Arc;

use gkern_geom::{
    project_point, Archive, ArchiveError, ArchiveReader, ArchiveWriter, ObjectId,
    ParametricSurface, Registry,
};
use gkern_math::{BoundingBox, ConstructionError, KernelConfig, Point3, Transform, Vec3};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Index of a face within its solid.
pub type FaceId = usize;

/// Errors from loading a persisted solid.
#[derive(Debug, Error)]
pub enum TopoError {
    /// The embedded geometry archive is unreadable.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A face references a surface that is not in the archive.
    #[error("face {face} references missing surface {id:?}")]
    MissingSurface {
        /// Offending face.
        face: FaceId,
        /// Missing surface id.
        id: ObjectId,
    },

    /// The decoded faces do not form a valid solid.
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

/// A bounded piece of a surface with an orientation.
#[derive(Debug, Clone)]
pub struct Face {
    surface: Arc<dyn ParametricSurface>,
    sense: bool,
}

impl Face {
    /// A face on `surface`; `sense == false` flips its normal.
    pub fn new(surface: Arc<dyn ParametricSurface>, sense: bool) -> Self {
        Self { surface, sense }
    }

    /// The underlying surface.
    pub fn surface(&self) -> &Arc<dyn ParametricSurface> {
        &self.surface
    }

    /// Whether the outward normal agrees with the surface normal.
    pub fn sense(&self) -> bool {
        self.sense
    }

    /// Outward unit normal at `(u, v)`.
    pub fn normal(&self, u: f64, v: f64) -> Vec3 {
        let n = self.surface.normal(u, v);
        if self.sense {
            n
        } else {
            -n
        }
    }
}

/// Where a point lies relative to a solid's boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointClass {
    /// On a face within tolerance, with the foot point parameters.
    OnFace {
        /// The nearest face.
        face: FaceId,
        /// Foot point parameter.
        u: f64,
        /// Foot point parameter.
        v: f64,
    },
    /// Farther than tolerance from every face.
    Off,
}

/// A closed boundary made of oriented faces.
#[derive(Debug, Clone)]
pub struct Solid {
    faces: Vec<Face>,
}

impl Solid {
    /// A solid bounded by `faces`.
    pub fn new(faces: Vec<Face>) -> Result<Self, ConstructionError> {
        if faces.is_empty() {
            return Err(ConstructionError::insufficient("a solid needs at least one face"));
        }
        Ok(Self { faces })
    }

    /// All faces in order.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Face `id`.
    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }

    /// Number of faces.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Distinct surfaces in first-use order; shared surfaces appear once.
    pub fn surfaces(&self) -> Vec<Arc<dyn ParametricSurface>> {
        let mut seen = FxHashSet::default();
        self.faces
            .iter()
            .filter(|f| seen.insert(Arc::as_ptr(&f.surface) as *const () as usize))
            .map(|f| Arc::clone(&f.surface))
            .collect()
    }

    /// Outward normal of face `id` at `(u, v)`.
    pub fn face_normal(&self, id: FaceId, u: f64, v: f64) -> Option<Vec3> {
        self.face(id).map(|f| f.normal(u, v))
    }

    /// Classify `point` against the boundary.
    ///
    /// The point is projected onto every face; the nearest foot point
    /// within `tol` wins.
    pub fn classify(&self, point: &Point3, tol: f64) -> PointClass {
        let mut best: Option<(FaceId, f64, f64, f64)> = None;
        for (id, face) in self.faces.iter().enumerate() {
            let Some(p) = project_point(face.surface.as_ref(), point, tol * 1e-3) else {
                continue;
            };
            if p.distance <= tol && best.map_or(true, |(_, _, _, d)| p.distance < d) {
                best = Some((id, p.u, p.v, p.distance));
            }
        }
        match best {
            Some((face, u, v, _)) => PointClass::OnFace { face, u, v },
            None => PointClass::Off,
        }
    }

    /// Box around every face, from `samples × samples` points per face.
    pub fn bounding_box(&self, samples: usize) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for surface in self.surfaces() {
            bbox.include_box(&surface.bounding_box(samples));
        }
        bbox
    }

    /// Map every surface through `reg`, keeping shared surfaces shared.
    ///
    /// Orientation-reversing transforms flip each face sense so normals
    /// keep pointing out of the solid.
    pub fn transformed(&self, reg: &mut Registry) -> Result<Self, ConstructionError> {
        let flip = reg.transform().linear().determinant() < 0.0;
        let faces = self
            .faces
            .iter()
            .map(|f| {
                Ok(Face {
                    surface: reg.map_surface(&f.surface)?,
                    sense: f.sense != flip,
                })
            })
            .collect::<Result<Vec<_>, ConstructionError>>()?;
        debug!(faces = faces.len(), surfaces = reg.len(), flip, "solid mapped");
        Ok(Self { faces })
    }

    /// A copy of the solid under `transform`.
    pub fn transform(&self, transform: Transform) -> Result<Self, ConstructionError> {
        self.transformed(&mut Registry::new(transform))
    }

    /// A deep copy sharing nothing with `self`.
    pub fn duplicate(&self) -> Result<Self, ConstructionError> {
        self.transformed(&mut Registry::duplicating())
    }

    /// Register the surfaces with `writer` and describe the faces.
    pub fn write(&self, writer: &mut ArchiveWriter) -> SolidRecord {
        SolidRecord {
            faces: self
                .faces
                .iter()
                .map(|f| FaceRecord {
                    surface: writer.prepare_write_surface(&f.surface),
                    sense: f.sense,
                })
                .collect(),
        }
    }

    /// Rebuild a solid from decoded geometry.
    pub fn read(record: &SolidRecord, reader: &ArchiveReader) -> Result<Self, TopoError> {
        let faces = record
            .faces
            .iter()
            .enumerate()
            .map(|(face, r)| {
                reader
                    .surface(r.surface)
                    .map(|s| Face::new(Arc::clone(s), r.sense))
                    .ok_or(TopoError::MissingSurface {
                        face,
                        id: r.surface,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(faces)?)
    }

    /// The solid together with its geometry.
    pub fn to_document(&self) -> SolidDocument {
        let mut writer = ArchiveWriter::new();
        let solid = self.write(&mut writer);
        SolidDocument {
            geometry: writer.finish(),
            solid,
        }
    }

    /// Rebuild a solid saved with [`Solid::to_document`].
    pub fn from_document(doc: &SolidDocument, config: &KernelConfig) -> Result<Self, TopoError> {
        let reader = ArchiveReader::read(&doc.geometry, config)?;
        Self::read(&doc.solid, &reader)
    }
}

/// Persisted face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRecord {
    /// Surface in the geometry archive.
    pub surface: ObjectId,
    /// Orientation.
    pub sense: bool,
}

/// Persisted solid; surfaces live in a separate [`Archive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidRecord {
    /// Faces in order.
    pub faces: Vec<FaceRecord>,
}

/// A solid and its geometry in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidDocument {
    /// Curve and surface tables.
    pub geometry: Archive,
    /// Face list referencing `geometry`.
    pub solid: SolidRecord,
}

impl SolidDocument {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, TopoError> {
        serde_json::to_string_pretty(self).map_err(|e| TopoError::Archive(e.into()))
    }

    /// Parse JSON written by [`SolidDocument::to_json`].
    pub fn from_json(text: &str) -> Result<Self, TopoError> {
        serde_json::from_str(text).map_err(|e| TopoError::Archive(e.into()))
    }
}
