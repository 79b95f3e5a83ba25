//! # Layforge Core
//!
//! Hierarchical layout model: integer geometry, layers and shapes, cell
//! transforms, named refs and pins, and the schematic connectivity checklist
//! every cell carries while it is being wired.
//!
//! Cells live in a [`Layout`] arena and are addressed by [`CellId`].

pub mod cell;
pub mod connectivity;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod layout;
pub mod refs;
pub mod replica;
pub mod shape;
pub mod spatial;

pub use cell::{encode_cell_name, CellId, CellSpec, LayoutCell, ParamValue, ShapeId};
pub use connectivity::{
    Checklist, ChecklistKey, ConnectivitySource, InstanceConnectivity, MissingConnection,
    SchematicCell,
};
pub use error::{LayoutError, LayoutResult};
pub use geometry::{Geometry, Point, Polygon, Rect, Rotation, Transform};
pub use layer::{Layer, LayerStack};
pub use layout::{Direction, Layout};
pub use refs::{Compass, DerivedPoint, Ref, RefKey, RefTarget, ResolvedPoint, RoutePoint};
pub use replica::ReplicaGroup;
pub use shape::Shape;
pub use spatial::{SpatialEntry, SpatialIndex};
