//! R-tree over a point set for popup lookups.
//!
//! Distances are planar in degrees, which is adequate for picking the
//! sample under a tap at street-level zoom.

use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};

use crate::{Bounds, RawSample};

/// `[lng, lat]` position tagged with the sample's index in the point set.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Spatial index borrowing a point set.
pub struct SampleIndex<'a> {
    samples: &'a [RawSample],
    tree: RTree<IndexedPoint>,
}

impl<'a> SampleIndex<'a> {
    /// Bulk-load an index over the valid samples.
    pub fn build(samples: &'a [RawSample]) -> Self {
        let points: Vec<IndexedPoint> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.has_valid_coords())
            .map(|(i, s)| GeomWithData::new([s.lng, s.lat], i))
            .collect();

        Self {
            samples,
            tree: RTree::bulk_load(points),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Sample closest to a position.
    pub fn nearest(&self, lat: f64, lng: f64) -> Option<&'a RawSample> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        self.tree
            .nearest_neighbor(&[lng, lat])
            .map(|p| &self.samples[p.data])
    }

    /// Samples inside the bounds, in source order.
    pub fn within(&self, bounds: &Bounds) -> Vec<&'a RawSample> {
        let envelope = AABB::from_corners([bounds.west, bounds.south], [bounds.east, bounds.north]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|p| p.data)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.samples[i]).collect()
    }
}
