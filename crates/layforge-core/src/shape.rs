use serde::{Deserialize, Serialize};

use crate::geometry::{Geometry, Point, Polygon, Rect, Transform};
use crate::layer::Layer;

/// A piece of geometry on a layer, optionally labeled with a net.
///
/// Shapes are never mutated after creation; moving one produces a new copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub geometry: Geometry,
    pub layer: Layer,
    pub net: Option<String>,
    /// Dotted instance path, set when the shape is flattened with net resolution.
    pub source: Option<String>,
}

impl Shape {
    pub fn rect(layer: Layer, x0: i64, y0: i64, x1: i64, y1: i64, net: Option<&str>) -> Self {
        Self {
            geometry: Geometry::Rect(Rect::new(x0, y0, x1, y1)),
            layer,
            net: net.map(str::to_string),
            source: None,
        }
    }

    pub fn polygon(layer: Layer, polygon: Polygon, net: Option<&str>) -> Self {
        Self {
            geometry: Geometry::Polygon(polygon),
            layer,
            net: net.map(str::to_string),
            source: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.geometry.bbox()
    }

    pub fn width(&self) -> i64 {
        self.bounds().width()
    }

    pub fn height(&self) -> i64 {
        self.bounds().height()
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// A copy with `transform` applied; layer, net and source are preserved.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            geometry: self.geometry.transformed(transform),
            layer: self.layer.clone(),
            net: self.net.clone(),
            source: self.source.clone(),
        }
    }

    pub fn intersects(&self, other: &Shape) -> bool {
        self.geometry.intersects(&other.geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rotation;

    #[test]
    fn test_transformed_keeps_labels() {
        let shape = Shape::rect(Layer::conductor("MET1"), 0, 0, 100, 50, Some("vdd"));
        let t = Transform {
            x: 10,
            y: 0,
            rotation: Rotation::R180,
            mirror_x: false,
        };
        let moved = shape.transformed(&t);
        assert_eq!(moved.bounds(), Rect::new(-90, -50, 10, 0));
        assert_eq!(moved.net.as_deref(), Some("vdd"));
        assert_eq!(moved.layer, shape.layer);
        // The original is untouched.
        assert_eq!(shape.bounds(), Rect::new(0, 0, 100, 50));
    }
}
