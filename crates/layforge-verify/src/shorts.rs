use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use layforge_core::{CellId, Layer, Layout, Rect, Shape, SpatialIndex};

/// Two differently-netted shapes on the same conductor layer that overlap
/// or touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Short {
    pub layer: Layer,
    pub net_a: String,
    pub net_b: String,
    /// Instance paths of the two shapes' owners.
    pub source_a: Option<String>,
    pub source_b: Option<String>,
    pub bounds_a: Rect,
    pub bounds_b: Rect,
}

impl fmt::Display for Short {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SHORT on {}: '{}' ({}) vs '{}' ({})",
            self.layer.name,
            self.net_a,
            self.source_a.as_deref().unwrap_or("?"),
            self.net_b,
            self.source_b.as_deref().unwrap_or("?")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortCheckResult {
    pub shorts: Vec<Short>,
    /// Netted conductor shapes considered.
    pub shapes_checked: usize,
}

impl ShortCheckResult {
    pub fn is_clean(&self) -> bool {
        self.shorts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shorts.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "No shorts detected.".to_string();
        }
        let mut lines = vec![format!("{} short(s) detected:", self.shorts.len())];
        lines.extend(self.shorts.iter().map(|s| format!("  {s}")));
        lines.join("\n")
    }
}

impl fmt::Display for ShortCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Finds shorts in the flattened, net-resolved geometry of `cell`.
///
/// Only netted shapes on connectivity layers take part. Each
/// `(layer, net pair)` is reported once, with the first offending pair of
/// shapes found.
pub fn check_shorts(layout: &Layout, cell: CellId) -> ShortCheckResult {
    let mut by_layer: BTreeMap<Layer, Vec<Shape>> = BTreeMap::new();
    for shape in layout.flatten(cell, true) {
        if shape.layer.connectivity && shape.net.is_some() {
            by_layer.entry(shape.layer.clone()).or_default().push(shape);
        }
    }

    let mut result = ShortCheckResult::default();
    let mut seen = BTreeSet::new();
    for (layer, shapes) in &by_layer {
        result.shapes_checked += shapes.len();
        let index = SpatialIndex::from_boxes(shapes.iter().map(Shape::bounds));
        for (i, j) in index.candidate_pairs() {
            let (a, b) = (&shapes[i], &shapes[j]);
            let (Some(net_a), Some(net_b)) = (a.net.as_deref(), b.net.as_deref()) else {
                continue;
            };
            if net_a == net_b || !a.intersects(b) {
                continue;
            }
            let pair = (layer.clone(), net_a.min(net_b).to_string(), net_a.max(net_b).to_string());
            if !seen.insert(pair) {
                continue;
            }
            log::warn!(
                "{}: short on {} between '{}' and '{}'",
                layout.hierarchy_name(cell),
                layer.name,
                net_a,
                net_b
            );
            result.shorts.push(Short {
                layer: layer.clone(),
                net_a: net_a.to_string(),
                net_b: net_b.to_string(),
                source_a: a.source.clone(),
                source_b: b.source.clone(),
                bounds_a: a.bounds(),
                bounds_b: b.bounds(),
            });
        }
    }
    log::debug!(
        "{}: {} shapes checked, {} shorts",
        layout.hierarchy_name(cell),
        result.shapes_checked,
        result.shorts.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use layforge_core::{CellSpec, Point};

    fn top() -> (Layout, CellId) {
        let mut layout = Layout::new("test");
        let cell = layout.create(CellSpec::new("Top")).unwrap();
        (layout, cell)
    }

    fn m1() -> Layer {
        Layer::conductor("MET1")
    }

    #[test]
    fn test_overlap_between_nets_is_one_short() {
        let (mut layout, cell) = top();
        layout.add_rect(cell, m1(), 0, 0, 100, 100, Some("A"));
        layout.add_rect(cell, m1(), 50, 50, 150, 150, Some("B"));
        let result = check_shorts(&layout, cell);
        assert_eq!(result.len(), 1);
        let short = &result.shorts[0];
        assert_eq!((short.net_a.as_str(), short.net_b.as_str()), ("A", "B"));
        assert_eq!(short.source_a.as_deref(), Some("Top"));
        assert!(result.summary().starts_with("1 short(s) detected:"));
    }

    #[test]
    fn test_same_net_and_non_conductor_are_clean() {
        let (mut layout, cell) = top();
        layout.add_rect(cell, m1(), 0, 0, 100, 100, Some("A"));
        layout.add_rect(cell, m1(), 50, 50, 150, 150, Some("A"));
        let marker = Layer::new("BOUNDARY");
        layout.add_rect(cell, marker.clone(), 0, 0, 100, 100, Some("A"));
        layout.add_rect(cell, marker, 50, 50, 150, 150, Some("B"));
        let result = check_shorts(&layout, cell);
        assert!(result.is_clean());
        assert_eq!(result.summary(), "No shorts detected.");
        assert_eq!(result.shapes_checked, 2);
    }

    #[test]
    fn test_touching_edges_short_and_unnetted_shapes_skip() {
        let (mut layout, cell) = top();
        layout.add_rect(cell, m1(), 0, 0, 100, 100, Some("A"));
        layout.add_rect(cell, m1(), 100, 0, 200, 100, Some("B"));
        layout.add_rect(cell, m1(), 0, 0, 300, 300, None);
        assert_eq!(check_shorts(&layout, cell).len(), 1);
    }

    #[test]
    fn test_duplicates_collapse_per_net_pair() {
        let (mut layout, cell) = top();
        layout.add_rect(cell, m1(), 0, 0, 100, 100, Some("B"));
        layout.add_rect(cell, m1(), 0, 0, 100, 100, Some("A"));
        layout.add_rect(cell, m1(), 10, 10, 20, 20, Some("A"));
        layout.add_rect(cell, Layer::conductor("MET2"), 0, 0, 10, 10, Some("A"));
        layout.add_rect(cell, Layer::conductor("MET2"), 5, 5, 10, 10, Some("B"));
        let result = check_shorts(&layout, cell);
        assert_eq!(result.len(), 2);
        assert_eq!(result.shorts[0].layer, m1());
    }

    #[test]
    fn test_polygon_notch_clears_rect() {
        let (mut layout, cell) = top();
        // An L whose missing corner holds a rectangle of another net.
        let l = vec![
            Point::new(0, 0),
            Point::new(200, 0),
            Point::new(200, 100),
            Point::new(100, 100),
            Point::new(100, 200),
            Point::new(0, 200),
        ];
        layout.add_polygon(cell, m1(), l, Some("A")).unwrap();
        layout.add_rect(cell, m1(), 150, 150, 200, 200, Some("B"));
        assert!(check_shorts(&layout, cell).is_clean());
    }
}
