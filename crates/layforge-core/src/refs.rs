//! Named pointers into a cell's geometry, and the points derived from them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cell::{CellId, ShapeId};
use crate::geometry::{Point, Rect};
use crate::layer::Layer;
use crate::shape::Shape;

/// Handle naming a ref on a specific cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefKey {
    pub cell: CellId,
    pub name: String,
}

impl RefKey {
    pub fn new(cell: CellId, name: &str) -> Self {
        Self {
            cell,
            name: name.to_string(),
        }
    }
}

/// A label pointing at a shape's bounds in the owning cell's frame.
///
/// A ref carrying a `terminal` is a pin: it denotes a schematic terminal and
/// is the only kind of ref with connectivity significance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub(crate) name: String,
    pub(crate) owner: CellId,
    pub(crate) shape: Shape,
    pub(crate) terminal: Option<String>,
}

impl Ref {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> CellId {
        self.owner
    }

    pub fn key(&self) -> RefKey {
        RefKey::new(self.owner, &self.name)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn layer(&self) -> &Layer {
        &self.shape.layer
    }

    pub fn net(&self) -> Option<&str> {
        self.shape.net.as_deref()
    }

    /// Bounds in the owning cell's local frame.
    pub fn bounds(&self) -> Rect {
        self.shape.bounds()
    }

    pub fn is_pin(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn terminal(&self) -> Option<&str> {
        self.terminal.as_deref()
    }

    /// Name this ref is known by on the schematic side: the pin terminal,
    /// else the shape net, else the ref name.
    pub fn connection_name(&self) -> &str {
        self.terminal()
            .or_else(|| self.net())
            .unwrap_or(&self.name)
    }
}

/// Named positions on a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compass {
    Center,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Compass {
    pub fn of(self, r: &Rect) -> Point {
        let c = r.center();
        match self {
            Compass::Center => c,
            Compass::North => Point::new(c.x, r.max.y),
            Compass::South => Point::new(c.x, r.min.y),
            Compass::East => Point::new(r.max.x, c.y),
            Compass::West => Point::new(r.min.x, c.y),
            Compass::NorthEast => r.max,
            Compass::NorthWest => Point::new(r.min.x, r.max.y),
            Compass::SouthEast => Point::new(r.max.x, r.min.y),
            Compass::SouthWest => r.min,
        }
    }
}

impl FromStr for Compass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "center" => Ok(Compass::Center),
            "north" => Ok(Compass::North),
            "south" => Ok(Compass::South),
            "east" => Ok(Compass::East),
            "west" => Ok(Compass::West),
            "northeast" => Ok(Compass::NorthEast),
            "northwest" => Ok(Compass::NorthWest),
            "southeast" => Ok(Compass::SouthEast),
            "southwest" => Ok(Compass::SouthWest),
            other => Err(format!("unknown compass point '{other}'")),
        }
    }
}

/// A point expressed in the local frame of `frame`, optionally remembering
/// the ref it was derived from and the layer/net found there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedPoint {
    pub at: Point,
    pub frame: CellId,
    pub layer: Option<Layer>,
    pub net: Option<String>,
    pub origin: Option<RefKey>,
}

impl DerivedPoint {
    pub fn new(at: Point, frame: CellId) -> Self {
        Self {
            at,
            frame,
            layer: None,
            net: None,
            origin: None,
        }
    }

    /// Shifted copy; the origin ref is kept.
    pub fn offset(&self, dx: i64, dy: i64) -> Self {
        Self {
            at: self.at.translate(dx, dy),
            ..self.clone()
        }
    }

    pub fn on_layer(&self, layer: Layer) -> Self {
        Self {
            layer: Some(layer),
            ..self.clone()
        }
    }

    pub fn with_net(&self, net: &str) -> Self {
        Self {
            net: Some(net.to_string()),
            ..self.clone()
        }
    }
}

/// Anything usable as a route endpoint or placement anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutePoint {
    /// Raw coordinates in the frame of the cell being operated on.
    Literal(Point),
    /// The center of a named ref.
    Named(RefKey),
    Derived(DerivedPoint),
}

impl From<Point> for RoutePoint {
    fn from(p: Point) -> Self {
        RoutePoint::Literal(p)
    }
}

impl From<(i64, i64)> for RoutePoint {
    fn from(p: (i64, i64)) -> Self {
        RoutePoint::Literal(p.into())
    }
}

impl From<RefKey> for RoutePoint {
    fn from(key: RefKey) -> Self {
        RoutePoint::Named(key)
    }
}

impl From<&RefKey> for RoutePoint {
    fn from(key: &RefKey) -> Self {
        RoutePoint::Named(key.clone())
    }
}

impl From<DerivedPoint> for RoutePoint {
    fn from(p: DerivedPoint) -> Self {
        RoutePoint::Derived(p)
    }
}

/// A route point resolved into the frame of a target cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPoint {
    pub at: Point,
    pub layer: Option<Layer>,
    pub net: Option<String>,
    pub origin: Option<RefKey>,
    /// Bounds of the originating ref, in the target frame.
    pub bounds: Option<Rect>,
}

/// What a new ref or pin points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// A shape owned by the cell receiving the ref.
    Shape(ShapeId),
    /// A ref owned by a cell below the one receiving the ref.
    Ref(RefKey),
    Point(DerivedPoint),
}

impl From<ShapeId> for RefTarget {
    fn from(id: ShapeId) -> Self {
        RefTarget::Shape(id)
    }
}

impl From<RefKey> for RefTarget {
    fn from(key: RefKey) -> Self {
        RefTarget::Ref(key)
    }
}

impl From<&RefKey> for RefTarget {
    fn from(key: &RefKey) -> Self {
        RefTarget::Ref(key.clone())
    }
}

impl From<DerivedPoint> for RefTarget {
    fn from(p: DerivedPoint) -> Self {
        RefTarget::Point(p)
    }
}
