use thiserror::Error;

use crate::geometry::Point;

/// Errors raised while constructing a layout hierarchy or routing in it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Subcell '{name}' already exists in '{parent}'")]
    DuplicateInstance { parent: String, name: String },

    #[error("No ref named '{name}' in '{cell}'")]
    UnknownRef { cell: String, name: String },

    #[error("No subcell named '{name}' in '{cell}'")]
    UnknownSubcell { cell: String, name: String },

    #[error("{what} is not part of the hierarchy below '{cell}'")]
    HierarchyMismatch { cell: String, what: String },

    #[error("Invalid route pattern '{0}', expected one of '-', '|', '-|', '|-'")]
    InvalidRoutePattern(String),

    #[error("Diagonal segment from {from} to {to}")]
    DiagonalSegment { from: Point, to: Point },

    #[error("Missing {rule} rule for layer '{layer}'")]
    MissingLayerRule { layer: String, rule: String },

    #[error("Rotation of {0} degrees is not a multiple of 90")]
    InvalidRotation(i64),

    #[error("Point used for '{name}' carries no layer")]
    UnlayeredPoint { name: String },

    #[error("Too few points to draw: {0}")]
    TooFewWaypoints(usize),
}

pub type LayoutResult<T> = Result<T, LayoutError>;
