use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};

/// A 2D point in layout coordinates (integer nanometers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn translate(&self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Manhattan distance to another point.
    pub fn manhattan_to(&self, other: &Point) -> i64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl From<(i64, i64)> for Point {
    fn from((x, y): (i64, i64)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle, also used as a bounding box.
///
/// `min` is always the lower-left corner and `max` the upper-right one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self {
            min: Point::new(x0.min(x1), y0.min(y1)),
            max: Point::new(x0.max(x1), y0.max(y1)),
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut rect = Rect {
            min: *first,
            max: *first,
        };
        for p in &points[1..] {
            rect.min.x = rect.min.x.min(p.x);
            rect.min.y = rect.min.y.min(p.y);
            rect.max.x = rect.max.x.max(p.x);
            rect.max.y = rect.max.y.max(p.y);
        }
        Some(rect)
    }

    /// Rectangle of the given size centered on `center`.
    pub fn centered(center: Point, w: i64, h: i64) -> Self {
        let x0 = center.x - w.div_euclid(2);
        let y0 = center.y - h.div_euclid(2);
        Self::new(x0, y0, x0 + w, y0 + h)
    }

    /// Bounds as an `(x0, y0, x1, y1)` tuple.
    pub fn to_tuple(&self) -> (i64, i64, i64, i64) {
        (self.min.x, self.min.y, self.max.x, self.max.y)
    }

    pub fn width(&self) -> i64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x).div_euclid(2),
            (self.min.y + self.max.y).div_euclid(2),
        )
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True when the rectangles overlap or share any boundary point.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn intersection(&self, other: &Rect) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
        ))
    }

    pub fn translate(&self, dx: i64, dy: i64) -> Self {
        Self {
            min: self.min.translate(dx, dy),
            max: self.max.translate(dx, dy),
        }
    }

    /// Bounding box of the four transformed corners.
    pub fn transformed(&self, transform: &Transform) -> Self {
        let corners = self.corners().map(|c| transform.apply(&c));
        // Four corners are never empty.
        Rect::from_points(&corners).unwrap_or(*self)
    }
}

/// A rectilinear polygon given by its vertices in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    /// Builds a polygon, rejecting diagonal edges.
    pub fn new(vertices: Vec<Point>) -> LayoutResult<Self> {
        if vertices.len() < 3 {
            return Err(LayoutError::TooFewWaypoints(vertices.len()));
        }
        for (a, b) in edges(&vertices) {
            if a.x != b.x && a.y != b.y {
                return Err(LayoutError::DiagonalSegment { from: a, to: b });
            }
        }
        Ok(Self { vertices })
    }

    pub fn bbox(&self) -> Rect {
        Rect::from_points(&self.vertices).unwrap_or_default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Strict interior test (even-odd rule); boundary points are handled by edge tests.
    fn contains_interior(&self, p: &Point) -> bool {
        let mut inside = false;
        for (a, b) in edges(&self.vertices) {
            // Only vertical edges cross a horizontal ray.
            if a.x == b.x && a.x > p.x {
                let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
                if p.y >= lo && p.y < hi {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn edges(vertices: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = vertices.len();
    (0..n).map(move |i| (vertices[i], vertices[(i + 1) % n]))
}

/// Shape geometry: a rectangle or a rectilinear polygon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Geometry {
    Rect(Rect),
    Polygon(Polygon),
}

impl Geometry {
    pub fn bbox(&self) -> Rect {
        match self {
            Geometry::Rect(r) => *r,
            Geometry::Polygon(p) => p.bbox(),
        }
    }

    pub fn transformed(&self, transform: &Transform) -> Self {
        match self {
            Geometry::Rect(r) => Geometry::Rect(r.transformed(transform)),
            Geometry::Polygon(p) => Geometry::Polygon(Polygon {
                vertices: p.vertices.iter().map(|v| transform.apply(v)).collect(),
            }),
        }
    }

    fn vertices(&self) -> Vec<Point> {
        match self {
            Geometry::Rect(r) => r.corners().to_vec(),
            Geometry::Polygon(p) => p.vertices.clone(),
        }
    }

    /// Geometric intersection test. Touching boundaries count as intersecting.
    pub fn intersects(&self, other: &Geometry) -> bool {
        if !self.bbox().intersects(&other.bbox()) {
            return false;
        }
        let (a, b) = match (self, other) {
            (Geometry::Rect(_), Geometry::Rect(_)) => return true,
            _ => (self.vertices(), other.vertices()),
        };
        // Axis-aligned segments are their own bounding boxes.
        for (a0, a1) in edges(&a) {
            let ea = Rect::new(a0.x, a0.y, a1.x, a1.y);
            for (b0, b1) in edges(&b) {
                if ea.intersects(&Rect::new(b0.x, b0.y, b1.x, b1.y)) {
                    return true;
                }
            }
        }
        as_polygon(other).contains_interior(&a[0]) || as_polygon(self).contains_interior(&b[0])
    }
}

fn as_polygon(geometry: &Geometry) -> Polygon {
    match geometry {
        Geometry::Rect(r) => Polygon {
            vertices: r.corners().to_vec(),
        },
        Geometry::Polygon(p) => p.clone(),
    }
}

/// A rotation by a multiple of 90 degrees (counter-clockwise).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn from_degrees(degrees: i64) -> LayoutResult<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            _ => Err(LayoutError::InvalidRotation(degrees)),
        }
    }

    pub fn degrees(self) -> i64 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    fn quarter_turns(self) -> i64 {
        self.degrees() / 90
    }

    fn from_quarter_turns(turns: i64) -> Self {
        match turns.rem_euclid(4) {
            0 => Rotation::R0,
            1 => Rotation::R90,
            2 => Rotation::R180,
            _ => Rotation::R270,
        }
    }

    pub fn plus(self, other: Rotation) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + other.quarter_turns())
    }

    pub fn inverse(self) -> Self {
        Self::from_quarter_turns(-self.quarter_turns())
    }
}

/// Placement transform of a cell relative to its parent.
///
/// Applied to a point as: mirror about the X axis (flip y), then rotate
/// about the origin, then translate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transform {
    pub x: i64,
    pub y: i64,
    pub rotation: Rotation,
    pub mirror_x: bool,
}

impl Transform {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn translate(x: i64, y: i64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn rotate(rotation: Rotation) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    pub fn mirror() -> Self {
        Self {
            mirror_x: true,
            ..Default::default()
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    fn apply_linear(&self, p: &Point) -> Point {
        let (x, y) = (p.x, if self.mirror_x { -p.y } else { p.y });
        let (x, y) = match self.rotation {
            Rotation::R0 => (x, y),
            Rotation::R90 => (-y, x),
            Rotation::R180 => (-x, -y),
            Rotation::R270 => (y, -x),
        };
        Point::new(x, y)
    }

    pub fn apply(&self, p: &Point) -> Point {
        self.apply_linear(p).translate(self.x, self.y)
    }

    /// The transform equivalent to applying `self` first, then `other`.
    pub fn compose(&self, other: &Transform) -> Transform {
        let offset = other.apply(&Point::new(self.x, self.y));
        // Mirroring flips the sense of any rotation applied before it.
        let inner = if other.mirror_x {
            self.rotation.inverse()
        } else {
            self.rotation
        };
        Transform {
            x: offset.x,
            y: offset.y,
            rotation: other.rotation.plus(inner),
            mirror_x: self.mirror_x != other.mirror_x,
        }
    }

    pub fn inverse(&self) -> Transform {
        let linear = Transform {
            x: 0,
            y: 0,
            rotation: if self.mirror_x {
                self.rotation
            } else {
                self.rotation.inverse()
            },
            mirror_x: self.mirror_x,
        };
        let back = linear.apply_linear(&Point::new(self.x, self.y));
        Transform {
            x: -back.x,
            y: -back.y,
            ..linear
        }
    }
}
