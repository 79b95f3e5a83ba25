use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A drawing layer, identified by `(name, purpose)`.
///
/// `connectivity` marks layers that carry electrical nets (metals, poly,
/// diffusion, vias). It does not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default = "default_purpose")]
    pub purpose: String,
    #[serde(default)]
    pub connectivity: bool,
}

fn default_purpose() -> String {
    "drawing".to_string()
}

impl Layer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            purpose: default_purpose(),
            connectivity: false,
        }
    }

    /// A `drawing` layer that carries connectivity.
    pub fn conductor(name: &str) -> Self {
        Self::new(name).with_connectivity(true)
    }

    pub fn with_purpose(mut self, purpose: &str) -> Self {
        self.purpose = purpose.to_string();
        self
    }

    pub fn with_connectivity(mut self, connectivity: bool) -> Self {
        self.connectivity = connectivity;
        self
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.purpose == other.purpose
    }
}

impl Eq for Layer {}

impl Hash for Layer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.purpose.hash(state);
    }
}

impl PartialOrd for Layer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Layer {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.name, &self.purpose).cmp(&(&other.name, &other.purpose))
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.purpose)
    }
}

/// The bottom-to-top ordering of routing layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn index_of(&self, layer: &Layer) -> Option<usize> {
        self.layers.iter().position(|l| l == layer)
    }

    pub fn contains(&self, layer: &Layer) -> bool {
        self.index_of(layer).is_some()
    }

    pub fn get_layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn all_layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
