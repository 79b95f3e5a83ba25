use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connectivity::{Checklist, ConnectivitySource};
use crate::geometry::{Rect, Transform};
use crate::layer::Layer;
use crate::refs::Ref;
use crate::shape::Shape;

/// Handle to a cell stored in a [`Layout`](crate::Layout) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub(crate) usize);

impl CellId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a shape owned by a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId {
    pub cell: CellId,
    pub index: usize,
}

/// A schematic or layout parameter value, encoded into cell names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Token text for this value, or `None` for null.
    ///
    /// Floats use their shortest round-trip digits with `.` written as `p`
    /// and `-` as `m`, which [`ParamValue::decode_float`] reverses.
    pub fn encode(&self) -> Option<String> {
        match self {
            ParamValue::Null => None,
            ParamValue::Bool(b) => Some(b.to_string()),
            ParamValue::Int(i) => Some(i.to_string().replace('-', "m")),
            ParamValue::Float(f) => Some(f.to_string().replace('-', "m").replace('.', "p")),
            ParamValue::Str(s) => Some(s.clone()),
        }
    }

    pub fn decode_float(token: &str) -> Option<f64> {
        token.replace('m', "-").replace('p', ".").parse().ok()
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::Null, Into::into)
    }
}

/// Builds the output name of a cell: `base_name` followed by one
/// `_NAME_VALUE` token per schematic parameter, then per non-null layout
/// parameter.
///
/// Names and string values have `$` written as `$$` and `_` as `$u`, so
/// every `_` after the base name is a separator and distinct parameter sets
/// give distinct names.
pub fn encode_cell_name(
    base_name: &str,
    schematic_params: &BTreeMap<String, ParamValue>,
    layout_params: &BTreeMap<String, ParamValue>,
) -> String {
    let mut name = base_name.to_string();
    for (key, value) in schematic_params.iter().chain(layout_params) {
        if let Some(token) = value.encode() {
            name.push('_');
            name.push_str(&escape_token(key));
            name.push('_');
            name.push_str(&escape_token(&token));
        }
    }
    name
}

fn escape_token(text: &str) -> String {
    text.replace('$', "$$").replace('_', "$u")
}

/// Everything needed to create a cell.
#[derive(Clone, Default)]
pub struct CellSpec {
    pub(crate) base_name: String,
    pub(crate) instance_name: Option<String>,
    pub(crate) parent: Option<CellId>,
    pub(crate) connectivity: Option<Arc<dyn ConnectivitySource>>,
    pub(crate) params: BTreeMap<String, ParamValue>,
}

impl CellSpec {
    pub fn new(base_name: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
            ..Default::default()
        }
    }

    pub fn instance(mut self, name: &str) -> Self {
        self.instance_name = Some(name.to_string());
        self
    }

    pub fn parent(mut self, parent: CellId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn connectivity(mut self, source: Arc<dyn ConnectivitySource>) -> Self {
        self.connectivity = Some(source);
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

impl fmt::Debug for CellSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellSpec")
            .field("base_name", &self.base_name)
            .field("instance_name", &self.instance_name)
            .field("parent", &self.parent)
            .field("connectivity", &self.connectivity.as_ref().map(|c| c.cell_name().to_string()))
            .field("params", &self.params)
            .finish()
    }
}

/// A node of the layout hierarchy.
///
/// Cells are owned by a [`Layout`](crate::Layout) arena; `parent` and
/// `subcells` are handles into the same arena.
#[derive(Debug)]
pub struct LayoutCell {
    pub(crate) cell_name: String,
    pub(crate) instance_name: String,
    pub(crate) parent: Option<CellId>,
    pub(crate) transform: Transform,
    pub(crate) shapes: Vec<Shape>,
    pub(crate) refs: BTreeMap<String, Ref>,
    pub(crate) subcells: BTreeMap<String, CellId>,
    pub(crate) connectivity: Option<Arc<dyn ConnectivitySource>>,
    pub(crate) checklist: Option<Checklist>,
}

impl LayoutCell {
    pub fn cell_name(&self) -> &str {
        &self.cell_name
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn refs(&self) -> impl Iterator<Item = &Ref> {
        self.refs.values()
    }

    pub fn pins(&self) -> impl Iterator<Item = &Ref> {
        self.refs.values().filter(|r| r.is_pin())
    }

    pub fn subcells(&self) -> impl Iterator<Item = (&str, CellId)> {
        self.subcells.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn connectivity(&self) -> Option<&Arc<dyn ConnectivitySource>> {
        self.connectivity.as_ref()
    }

    /// Bounding box of this cell's own shapes (subcells excluded).
    pub fn local_bbox(&self) -> Option<Rect> {
        self.shapes
            .iter()
            .map(Shape::bounds)
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn shapes_on_layer<'a>(&'a self, layer: &'a Layer) -> impl Iterator<Item = &'a Shape> {
        self.shapes.iter().filter(move |s| &s.layer == layer)
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn subcell_count(&self) -> usize {
        self.subcells.len()
    }
}
