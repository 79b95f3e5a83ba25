use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use layforge_core::{Layer, LayerStack, LayoutError, LayoutResult};

use crate::via::{get_via_stack, ViaDefinition};

/// Width and spacing minimums for one layer, in nm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRule {
    pub min_width: i64,
    pub min_spacing: i64,
}

/// Process rules consumed by routing: per-layer minimums, via definitions
/// and the bottom-to-top routing layer order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignRules {
    pub name: String,
    #[serde(default)]
    pub stack: LayerStack,
    /// Keyed by layer name.
    #[serde(default)]
    pub layers: BTreeMap<String, LayerRule>,
    #[serde(default)]
    pub vias: Vec<ViaDefinition>,
}

impl DesignRules {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Appends `layer` to the top of the routing stack with its minimums.
    pub fn add_routing_layer(&mut self, layer: Layer, min_width: i64, min_spacing: i64) -> &mut Self {
        self.set_layer_rule(&layer, min_width, min_spacing);
        self.stack.add_layer(layer);
        self
    }

    pub fn set_layer_rule(&mut self, layer: &Layer, min_width: i64, min_spacing: i64) -> &mut Self {
        self.layers.insert(
            layer.name.clone(),
            LayerRule {
                min_width,
                min_spacing,
            },
        );
        self
    }

    pub fn add_via(&mut self, via: ViaDefinition) -> &mut Self {
        self.vias.push(via);
        self
    }

    pub fn layer_rule(&self, layer: &Layer) -> Option<&LayerRule> {
        self.layers.get(&layer.name)
    }

    pub fn min_width(&self, layer: &Layer) -> LayoutResult<i64> {
        self.layer_rule(layer)
            .map(|r| r.min_width)
            .ok_or_else(|| missing(layer, "min_width"))
    }

    pub fn min_spacing(&self, layer: &Layer) -> LayoutResult<i64> {
        self.layer_rule(layer)
            .map(|r| r.min_spacing)
            .ok_or_else(|| missing(layer, "min_spacing"))
    }

    /// Routing layer named `name`, as stored in the stack.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.stack.get_layer_by_name(name)
    }

    pub fn via_stack(&self, a: &Layer, b: &Layer) -> LayoutResult<Vec<&ViaDefinition>> {
        get_via_stack(a, b, &self.stack, &self.vias)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn missing(layer: &Layer, rule: &str) -> LayoutError {
    LayoutError::MissingLayerRule {
        layer: layer.name.clone(),
        rule: rule.to_string(),
    }
}
