//! Transform/duplicate registry.
//!
//! Copying or transforming a graph of shared curves and surfaces must map
//! every shared node exactly once, so that two owners referencing the same
//! generatrix before the operation still share one generatrix afterwards.
//! The registry is the explicit visited map threaded through that traversal.

use std::sync::Arc;

use gkern_math::{ConstructionError, Transform};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{ParametricCurve, ParametricSurface};

/// Identity of an `Arc` allocation, independent of its vtable.
pub(crate) fn arc_key<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

/// Visited map for one transform or duplicate traversal.
///
/// Sources are held alongside their images so an address cannot be reused
/// by a new allocation while the traversal is running.
pub struct Registry {
    transform: Transform,
    curves: FxHashMap<usize, (Arc<dyn ParametricCurve>, Arc<dyn ParametricCurve>)>,
    surfaces: FxHashMap<usize, (Arc<dyn ParametricSurface>, Arc<dyn ParametricSurface>)>,
}

impl Registry {
    /// A registry applying `transform` to everything it maps.
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            curves: FxHashMap::default(),
            surfaces: FxHashMap::default(),
        }
    }

    /// A registry that deep-copies without moving anything.
    pub fn duplicating() -> Self {
        Self::new(Transform::identity())
    }

    /// The transform being applied.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Map a curve, reusing the image of an already visited curve.
    pub fn map_curve(
        &mut self,
        curve: &Arc<dyn ParametricCurve>,
    ) -> Result<Arc<dyn ParametricCurve>, ConstructionError> {
        let key = arc_key(curve);
        if let Some((_, image)) = self.curves.get(&key) {
            return Ok(Arc::clone(image));
        }
        let image = curve.transformed(self)?;
        self.curves.insert(key, (Arc::clone(curve), Arc::clone(&image)));
        Ok(image)
    }

    /// Map a surface, reusing the image of an already visited surface.
    pub fn map_surface(
        &mut self,
        surface: &Arc<dyn ParametricSurface>,
    ) -> Result<Arc<dyn ParametricSurface>, ConstructionError> {
        let key = arc_key(surface);
        if let Some((_, image)) = self.surfaces.get(&key) {
            return Ok(Arc::clone(image));
        }
        let image = surface.transformed(self)?;
        self.surfaces
            .insert(key, (Arc::clone(surface), Arc::clone(&image)));
        Ok(image)
    }

    /// Number of distinct objects mapped so far.
    pub fn len(&self) -> usize {
        self.curves.len() + self.surfaces.len()
    }

    /// Whether nothing has been mapped yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if !self.is_empty() {
            debug!(
                curves = self.curves.len(),
                surfaces = self.surfaces.len(),
                "registry traversal finished"
            );
        }
    }
}
