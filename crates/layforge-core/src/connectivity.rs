//! Schematic connectivity as seen by the layout, and the per-cell checklist
//! of connections that still need to be made.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::{CellId, ParamValue};
use crate::error::LayoutResult;
use crate::layout::Layout;
use crate::refs::{RefKey, ResolvedPoint, RoutePoint};

/// Source of schematic connectivity for one cell.
///
/// Describes the cell's direct child instances: for each, its terminal to
/// net assignments and how many layout copies it is drawn as.
pub trait ConnectivitySource: fmt::Debug + Send + Sync {
    fn cell_name(&self) -> &str;

    fn instance_name(&self) -> Option<&str> {
        None
    }

    /// Schematic parameters, encoded into the layout cell name.
    fn parameters(&self) -> BTreeMap<String, ParamValue> {
        BTreeMap::new()
    }

    fn instances(&self) -> Vec<InstanceConnectivity>;

    fn instance(&self, name: &str) -> Option<InstanceConnectivity> {
        self.instances().into_iter().find(|i| i.name == name)
    }

    fn replica_count(&self, name: &str) -> usize {
        self.instance(name).map_or(1, |i| i.replicas.max(1))
    }
}

fn one() -> usize {
    1
}

/// Connectivity of one child instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConnectivity {
    pub name: String,
    #[serde(default = "one")]
    pub replicas: usize,
    /// Terminal name to net name; `None` for an unconnected terminal.
    #[serde(default)]
    pub terminals: BTreeMap<String, Option<String>>,
}

impl InstanceConnectivity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replicas: 1,
            terminals: BTreeMap::new(),
        }
    }

    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas.max(1);
        self
    }

    pub fn connect(mut self, terminal: &str, net: &str) -> Self {
        self.terminals.insert(terminal.to_string(), Some(net.to_string()));
        self
    }

    pub fn leave_open(mut self, terminal: &str) -> Self {
        self.terminals.insert(terminal.to_string(), None);
        self
    }

    /// Net on `terminal`, matched case-insensitively.
    pub fn terminal_net(&self, terminal: &str) -> Option<&str> {
        self.terminals
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(terminal))
            .and_then(|(_, net)| net.as_deref())
    }

    /// Layout instance names this schematic instance expands to.
    pub fn layout_names(&self) -> Vec<String> {
        (0..self.replicas.max(1))
            .map(|i| replica_name(&self.name, i, self.replicas))
            .collect()
    }
}

/// Layout instance name of copy `index` of a group of `count`.
pub fn replica_name(base: &str, index: usize, count: usize) -> String {
    if count > 1 {
        format!("{base}_{index}")
    } else {
        base.to_string()
    }
}

/// Finds the schematic instance a layout child was created for, looking
/// through the `base_N` naming of replicated instances.
pub fn schematic_instance(
    source: &dyn ConnectivitySource,
    layout_name: &str,
) -> Option<InstanceConnectivity> {
    if let Some(inst) = source.instance(layout_name) {
        return Some(inst);
    }
    let (base, index) = layout_name.rsplit_once('_')?;
    let index: usize = index.parse().ok()?;
    source
        .instance(base)
        .filter(|inst| inst.replicas > 1 && index < inst.replicas)
}

/// A plain-data schematic cell implementing [`ConnectivitySource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchematicCell {
    pub cell_name: String,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConnectivity>,
}

impl SchematicCell {
    pub fn new(cell_name: &str) -> Self {
        Self {
            cell_name: cell_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_instance_name(mut self, name: &str) -> Self {
        self.instance_name = Some(name.to_string());
        self
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn add_instance(&mut self, instance: InstanceConnectivity) -> &mut Self {
        self.instances.insert(instance.name.clone(), instance);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl ConnectivitySource for SchematicCell {
    fn cell_name(&self) -> &str {
        &self.cell_name
    }

    fn instance_name(&self) -> Option<&str> {
        self.instance_name.as_deref()
    }

    fn parameters(&self) -> BTreeMap<String, ParamValue> {
        self.parameters.clone()
    }

    fn instances(&self) -> Vec<InstanceConnectivity> {
        self.instances.values().cloned().collect()
    }

    fn instance(&self, name: &str) -> Option<InstanceConnectivity> {
        self.instances.get(name).cloned()
    }
}

/// `(instance, terminal)` key of a checklist entry. Terminals are lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChecklistKey {
    pub instance: String,
    pub terminal: String,
}

impl ChecklistKey {
    pub fn new(instance: &str, terminal: &str) -> Self {
        Self {
            instance: instance.to_string(),
            terminal: terminal.to_lowercase(),
        }
    }
}

/// A checklist entry that has not been covered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MissingConnection {
    pub instance: String,
    pub terminal: String,
    pub net: String,
}

impl fmt::Display for MissingConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}", self.instance, self.terminal, self.net)
    }
}

/// Connections a cell's layout must make between its direct children.
///
/// `entries` holds one requirement per drawn instance copy and terminal;
/// `external` holds one requirement per replicated instance and terminal
/// that some copy must connect outside its own group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(with = "keyed_nets")]
    entries: BTreeMap<ChecklistKey, String>,
    #[serde(with = "keyed_nets")]
    external: BTreeMap<ChecklistKey, String>,
    covered: BTreeSet<ChecklistKey>,
    external_covered: BTreeSet<ChecklistKey>,
}

/// Checklist maps are written as `[key, net]` pairs; JSON object keys must
/// be strings.
mod keyed_nets {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::ChecklistKey;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<ChecklistKey, String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ChecklistKey, String>, D::Error> {
        let pairs = Vec::<(ChecklistKey, String)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

impl Checklist {
    pub fn build(source: &dyn ConnectivitySource) -> Self {
        let mut checklist = Checklist::default();
        for inst in source.instances() {
            for (terminal, net) in &inst.terminals {
                let Some(net) = net else { continue };
                for name in inst.layout_names() {
                    checklist
                        .entries
                        .insert(ChecklistKey::new(&name, terminal), net.clone());
                }
                if inst.replicas > 1 {
                    checklist
                        .external
                        .insert(ChecklistKey::new(&inst.name, terminal), net.clone());
                }
            }
        }
        checklist
    }

    pub fn expected_net(&self, key: &ChecklistKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn has_external(&self, key: &ChecklistKey) -> bool {
        self.external.contains_key(key)
    }

    /// Marks an entry covered. Returns false when no such entry exists.
    pub fn cover(&mut self, key: &ChecklistKey) -> bool {
        if self.entries.contains_key(key) {
            self.covered.insert(key.clone());
            true
        } else {
            false
        }
    }

    pub fn cover_external(&mut self, key: &ChecklistKey) -> bool {
        if self.external.contains_key(key) {
            self.external_covered.insert(key.clone());
            true
        } else {
            false
        }
    }

    /// Covers every entry and external requirement on `net`.
    pub fn cover_net(&mut self, net: &str) -> usize {
        let mut count = 0;
        for (key, n) in &self.entries {
            if n == net && self.covered.insert(key.clone()) {
                count += 1;
            }
        }
        for (key, n) in &self.external {
            if n == net && self.external_covered.insert(key.clone()) {
                count += 1;
            }
        }
        count
    }

    pub fn is_covered(&self, key: &ChecklistKey) -> bool {
        self.covered.contains(key)
    }

    pub fn missing(&self) -> Vec<MissingConnection> {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| !self.covered.contains(*key));
        let external = self
            .external
            .iter()
            .filter(|(key, _)| !self.external_covered.contains(*key));
        entries
            .chain(external)
            .map(|(key, net)| MissingConnection {
                instance: key.instance.clone(),
                terminal: key.terminal.clone(),
                net: net.clone(),
            })
            .collect()
    }

    /// Number of requirements, per-copy and external.
    pub fn len(&self) -> usize {
        self.entries.len() + self.external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn covered_count(&self) -> usize {
        self.covered.len() + self.external_covered.len()
    }
}

impl Layout {
    /// Checklist of `cell` built from its connectivity source, ignoring any
    /// progress recorded so far.
    pub fn build_checklist(&self, cell: CellId) -> Checklist {
        self.cell(cell)
            .connectivity
            .as_deref()
            .map(Checklist::build)
            .unwrap_or_default()
    }

    pub fn checklist(&self, cell: CellId) -> Option<&Checklist> {
        self.cell(cell).checklist.as_ref()
    }

    fn checklist_mut(&mut self, cell: CellId) -> &mut Checklist {
        if self.cell(cell).checklist.is_none() {
            let built = self.build_checklist(cell);
            self.cell_mut(cell).checklist = Some(built);
        }
        self.cell_mut(cell).checklist.get_or_insert_with(Checklist::default)
    }

    /// Maps a ref below `cell` to the checklist key of the direct child it
    /// lives in, translating its net name level by level through the
    /// schematic of each intermediate cell.
    ///
    /// Returns `None` for refs owned by `cell` itself, refs outside its
    /// subtree, and nets internal to an intermediate cell.
    pub fn terminal_key(&self, cell: CellId, origin: &RefKey) -> Option<ChecklistKey> {
        let r = self.get_ref(origin.cell, &origin.name).ok()?;
        let mut name = r.connection_name().to_string();
        let mut owner = origin.cell;
        loop {
            let parent = self.cell(owner).parent?;
            let owner_name = &self.cell(owner).instance_name;
            if parent == cell {
                return Some(ChecklistKey::new(owner_name, &name));
            }
            if let Some(source) = self.cell(parent).connectivity.as_deref() {
                let inst = schematic_instance(source, owner_name)?;
                name = inst.terminal_net(&name)?.to_string();
            }
            owner = parent;
        }
    }

    /// Schematic group a direct child belongs to: the base name of its
    /// replica group, or its own name.
    fn replica_group(&self, cell: CellId, instance: &str) -> String {
        self.cell(cell)
            .connectivity
            .as_deref()
            .and_then(|source| schematic_instance(source, instance))
            .map_or_else(|| instance.to_string(), |inst| inst.name)
    }

    /// Checks off the checklist entry reached through `point`'s originating
    /// ref. A net disagreeing with the schematic only produces a warning.
    pub fn check_off(
        &mut self,
        cell: CellId,
        point: &RoutePoint,
        net: Option<&str>,
    ) -> LayoutResult<Option<ChecklistKey>> {
        let resolved = self.resolve(cell, point)?;
        Ok(self.check_off_resolved(cell, &resolved, net))
    }

    fn check_off_resolved(
        &mut self,
        cell: CellId,
        point: &ResolvedPoint,
        net: Option<&str>,
    ) -> Option<ChecklistKey> {
        let key = self.terminal_key(cell, point.origin.as_ref()?)?;
        let cell_name = self.hierarchy_name(cell);
        let checklist = self.checklist_mut(cell);
        if let (Some(expected), Some(net)) = (checklist.expected_net(&key), net) {
            if expected != net {
                log::warn!(
                    "{}: {}.{} expects net '{}' but is connected to '{}'",
                    cell_name,
                    key.instance,
                    key.terminal,
                    expected,
                    net
                );
            }
        }
        if checklist.cover(&key) {
            log::debug!("{}: checked off {}.{}", cell_name, key.instance, key.terminal);
            Some(key)
        } else {
            None
        }
    }

    /// Records a wire between two resolved endpoints: checks off both and
    /// satisfies external requirements of replica groups it leaves.
    pub fn record_connection(
        &mut self,
        cell: CellId,
        a: &ResolvedPoint,
        b: &ResolvedPoint,
        net: Option<&str>,
    ) {
        self.check_off_resolved(cell, a, net);
        self.check_off_resolved(cell, b, net);

        let key_a = a.origin.as_ref().and_then(|o| self.terminal_key(cell, o));
        let key_b = b.origin.as_ref().and_then(|o| self.terminal_key(cell, o));
        let boundary_a = self.is_boundary_pin(cell, a);
        let boundary_b = self.is_boundary_pin(cell, b);

        let mut externals = Vec::new();
        match (&key_a, &key_b) {
            (Some(ka), Some(kb)) => {
                let ga = self.replica_group(cell, &ka.instance);
                let gb = self.replica_group(cell, &kb.instance);
                if ga != gb {
                    externals.push(ChecklistKey::new(&ga, &ka.terminal));
                    externals.push(ChecklistKey::new(&gb, &kb.terminal));
                }
            }
            (Some(k), None) if boundary_b => {
                externals.push(ChecklistKey::new(&self.replica_group(cell, &k.instance), &k.terminal));
            }
            (None, Some(k)) if boundary_a => {
                externals.push(ChecklistKey::new(&self.replica_group(cell, &k.instance), &k.terminal));
            }
            _ => {}
        }
        let checklist = self.checklist_mut(cell);
        for key in externals {
            checklist.cover_external(&key);
        }
    }

    /// Checks off the entry a new pin exports; a pin is a declaration that
    /// the connection is made outside this cell.
    pub(crate) fn check_off_pin(&mut self, cell: CellId, origin: &RefKey, net: Option<&str>) {
        let Some(key) = self.terminal_key(cell, origin) else {
            return;
        };
        let group = self.replica_group(cell, &key.instance);
        let checklist = self.checklist_mut(cell);
        if let (Some(expected), Some(net)) = (checklist.expected_net(&key), net) {
            if expected != net {
                log::warn!(
                    "pin on {}.{} carries net '{}', schematic expects '{}'",
                    key.instance,
                    key.terminal,
                    net,
                    expected
                );
            }
        }
        checklist.cover(&key);
        checklist.cover_external(&ChecklistKey::new(&group, &key.terminal));
    }

    fn is_boundary_pin(&self, cell: CellId, point: &ResolvedPoint) -> bool {
        point
            .origin
            .as_ref()
            .filter(|o| o.cell == cell)
            .and_then(|o| self.get_ref(o.cell, &o.name).ok())
            .is_some_and(|r| r.is_pin())
    }

    /// Covers every requirement on `net`, for connections made implicitly
    /// (shared wells, abutted taps).
    pub fn check_off_net(&mut self, cell: CellId, net: &str) -> usize {
        let count = self.checklist_mut(cell).cover_net(net);
        log::debug!("{}: checked off {} entries on net '{}'", self.hierarchy_name(cell), count, net);
        count
    }

    /// Every requirement of `cell` not yet covered. Empty means fully wired.
    pub fn check_connectivity(&self, cell: CellId) -> Vec<MissingConnection> {
        match self.checklist(cell) {
            Some(checklist) => checklist.missing(),
            None => self.build_checklist(cell).missing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cell::CellSpec;
    use crate::layer::Layer;
    use crate::refs::RefTarget;

    fn inverter_schematic() -> SchematicCell {
        let mut sch = SchematicCell::new("Inverter");
        sch.add_instance(
            InstanceConnectivity::new("MN")
                .connect("D", "out")
                .connect("G", "in")
                .connect("S", "vss")
                .leave_open("B"),
        );
        sch.add_instance(
            InstanceConnectivity::new("MP")
                .with_replicas(2)
                .connect("D", "out")
                .connect("G", "in")
                .connect("S", "vdd"),
        );
        sch
    }

    fn device(layout: &mut Layout, parent: CellId, name: &str) -> CellId {
        let id = layout
            .create(CellSpec::new("Fet").instance(name).parent(parent))
            .unwrap();
        let m1 = Layer::conductor("MET1");
        for (i, terminal) in ["d", "g", "s"].iter().enumerate() {
            let x = i as i64 * 200;
            let shape = layout.add_rect(id, m1.clone(), x, 0, x + 100, 100, Some(*terminal));
            layout
                .add_ref(id, &terminal.to_uppercase(), RefTarget::Shape(shape))
                .unwrap();
        }
        id
    }

    #[test]
    fn test_build_expands_replicas() {
        let checklist = Checklist::build(&inverter_schematic());
        assert_eq!(checklist.expected_net(&ChecklistKey::new("MN", "d")), Some("out"));
        assert_eq!(checklist.expected_net(&ChecklistKey::new("MP_0", "s")), Some("vdd"));
        assert_eq!(checklist.expected_net(&ChecklistKey::new("MP_1", "g")), Some("in"));
        assert!(checklist.expected_net(&ChecklistKey::new("MN", "b")).is_none());
        assert!(checklist.has_external(&ChecklistKey::new("MP", "d")));
        // 3 for MN, 3 for each MP copy, 3 external for MP.
        assert_eq!(checklist.len(), 12);
    }

    #[test]
    fn test_checklist_json_round_trip() {
        let mut checklist = Checklist::build(&inverter_schematic());
        assert!(checklist.cover(&ChecklistKey::new("MN", "d")));
        assert!(checklist.cover_external(&ChecklistKey::new("MP", "s")));

        let json = serde_json::to_string(&checklist).unwrap();
        let back: Checklist = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checklist);
        assert!(back.is_covered(&ChecklistKey::new("MN", "d")));
        assert_eq!(back.missing().len(), checklist.missing().len());
    }

    #[test]
    fn test_unrouted_entry_reported_until_net_checked_off() {
        let mut layout = Layout::new("test");
        let mut sch = SchematicCell::new("Top");
        sch.add_instance(InstanceConnectivity::new("inst").connect("d", "X"));
        let top = layout
            .create(CellSpec::new("Top").connectivity(Arc::new(sch)))
            .unwrap();
        let missing = layout.check_connectivity(top);
        assert_eq!(
            missing,
            vec![MissingConnection {
                instance: "inst".into(),
                terminal: "d".into(),
                net: "X".into()
            }]
        );
        layout.check_off_net(top, "X");
        assert!(layout.check_connectivity(top).is_empty());
    }

    #[test]
    fn test_check_off_through_ref() {
        let mut layout = Layout::new("test");
        let top = layout
            .create(CellSpec::new("Inverter").connectivity(Arc::new(inverter_schematic())))
            .unwrap();
        let mn = device(&mut layout, top, "MN");
        let key = layout
            .check_off(top, &RefKey::new(mn, "D").into(), Some("out"))
            .unwrap();
        assert_eq!(key, Some(ChecklistKey::new("MN", "d")));
        let missing = layout.check_connectivity(top);
        assert!(!missing.iter().any(|m| m.instance == "MN" && m.terminal == "d"));
        assert!(missing.iter().any(|m| m.instance == "MN" && m.terminal == "g"));
    }

    #[test]
    fn test_net_mismatch_still_checks_off() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut layout = Layout::new("test");
        let top = layout
            .create(CellSpec::new("Inverter").connectivity(Arc::new(inverter_schematic())))
            .unwrap();
        let mn = device(&mut layout, top, "MN");
        let key = layout
            .check_off(top, &RefKey::new(mn, "G").into(), Some("wrong"))
            .unwrap();
        assert_eq!(key, Some(ChecklistKey::new("MN", "g")));
    }

    #[test]
    fn test_terminal_key_composes_nets_through_hierarchy() {
        let mut layout = Layout::new("test");
        let mut top_sch = SchematicCell::new("Top");
        top_sch.add_instance(InstanceConnectivity::new("INV").connect("out", "y"));
        let top = layout
            .create(CellSpec::new("Top").connectivity(Arc::new(top_sch)))
            .unwrap();
        let inv = layout
            .create(
                CellSpec::new("Inverter")
                    .instance("INV")
                    .parent(top)
                    .connectivity(Arc::new(inverter_schematic())),
            )
            .unwrap();
        let mn = device(&mut layout, inv, "MN");
        // MN.d is net "out" inside the inverter, which is terminal "out" of INV.
        assert_eq!(
            layout.terminal_key(top, &RefKey::new(mn, "D")),
            Some(ChecklistKey::new("INV", "out"))
        );
        // MN.s sits on "vss", which the top level never connects.
        let key = layout.terminal_key(top, &RefKey::new(mn, "S")).unwrap();
        assert_eq!(key, ChecklistKey::new("INV", "vss"));
        assert!(layout.build_checklist(top).expected_net(&key).is_none());
    }

    #[test]
    fn test_pin_covers_replica_external() {
        let mut layout = Layout::new("test");
        let top = layout
            .create(CellSpec::new("Inverter").connectivity(Arc::new(inverter_schematic())))
            .unwrap();
        let mp0 = device(&mut layout, top, "MP_0");
        layout
            .add_pin(top, "OUT", RefTarget::Ref(RefKey::new(mp0, "D")))
            .unwrap();
        let checklist = layout.checklist(top).unwrap();
        assert!(checklist.is_covered(&ChecklistKey::new("MP_0", "d")));
        let missing = layout.check_connectivity(top);
        assert!(!missing.iter().any(|m| m.instance == "MP" && m.terminal == "d"));
        assert!(missing.iter().any(|m| m.instance == "MP_1" && m.terminal == "d"));
    }

    #[test]
    fn test_schematic_instance_lookup() {
        let sch = inverter_schematic();
        assert_eq!(schematic_instance(&sch, "MP_1").map(|i| i.name), Some("MP".into()));
        assert!(schematic_instance(&sch, "MP_2").is_none());
        assert!(schematic_instance(&sch, "MN_0").is_none());
        assert_eq!(sch.replica_count("MP"), 2);
        assert_eq!(sch.replica_count("nothing"), 1);
    }

    #[test]
    fn test_schematic_json_defaults() {
        let json = r#"{"cell_name": "Buf", "instances": {"X": {"name": "X", "terminals": {"a": "in", "nc": null}}}}"#;
        let sch = SchematicCell::from_json(json).unwrap();
        let x = sch.instance("X").unwrap();
        assert_eq!(x.replicas, 1);
        assert_eq!(x.terminal_net("A"), Some("in"));
        assert_eq!(x.terminal_net("nc"), None);
        assert_eq!(SchematicCell::from_json(&sch.to_json().unwrap()).unwrap(), sch);
    }
}
