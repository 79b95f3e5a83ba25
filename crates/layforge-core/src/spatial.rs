use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::{Point, Rect};

/// An entry in the R-tree spatial index, referencing a shape by its index.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    /// Index into the caller's shape vector.
    pub index: usize,
    pub bbox: Rect,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Spatial index over shape bounding boxes.
///
/// Queries are inclusive: boxes sharing only an edge or a corner match.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Build the index from a list of bounding boxes.
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Index `boxes` by their position in the iterator.
    pub fn from_boxes(boxes: impl IntoIterator<Item = Rect>) -> Self {
        let entries = boxes
            .into_iter()
            .enumerate()
            .map(|(index, bbox)| SpatialEntry { index, bbox })
            .collect();
        Self::build(entries)
    }

    /// All entries whose bounding box contains the point.
    pub fn query_point(&self, point: &Point) -> Vec<&SpatialEntry> {
        self.query_rect(&Rect::new(point.x, point.y, point.x, point.y))
    }

    /// All entries whose bounding box intersects or touches `area`.
    pub fn query_rect(&self, area: &Rect) -> Vec<&SpatialEntry> {
        let envelope = AABB::from_corners([area.min.x, area.min.y], [area.max.x, area.max.y]);
        self.tree.locate_in_envelope_intersecting(&envelope).collect()
    }

    /// Index pairs `(i, j)` with `i < j` whose boxes intersect or touch.
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for entry in self.tree.iter() {
            for other in self.query_rect(&entry.bbox) {
                if entry.index < other.index {
                    pairs.push((entry.index, other.index));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
