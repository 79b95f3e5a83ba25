//! # Layforge I/O
//!
//! JSON readers and writers around the layout engine: project settings,
//! rule decks, schematic connectivity, and the flattened geometry export
//! handed to external sign-off tools.

pub mod config;
pub mod error;
pub mod export;

pub use config::{load_rules, load_schematic, ProjectSettings};
pub use error::{IoError, IoResult};
pub use export::{InstanceExport, LayoutExport, PinExport};
