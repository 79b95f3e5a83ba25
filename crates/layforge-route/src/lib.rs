//! # Layforge Route
//!
//! Process rules, via definitions and the pattern router that draws wires
//! between route points of a [`layforge_core::Layout`].

pub mod path;
pub mod router;
pub mod rules;
pub mod via;

pub use path::{EndStyle, Route};
pub use router::{
    build_waypoints, route, track_offset, RouteLayers, RoutePattern, RouteRequest, RouteResult,
    Router,
};
pub use rules::{DesignRules, LayerRule};
pub use via::{draw_via, get_via_stack, ViaArray, ViaDefinition, ViaFootprint};
