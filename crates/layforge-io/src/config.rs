//! Project settings and the JSON inputs they point at.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use layforge_core::{CellId, Layout, SchematicCell};
use layforge_route::DesignRules;

use crate::error::{IoError, IoResult};
use crate::export::{default_dbu_per_um, LayoutExport};

/// Settings of a layout project, stored as JSON. Relative paths are taken
/// from the directory holding the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub name: String,
    pub pdk: String,
    pub top_cell: Option<String>,
    pub rules: Option<PathBuf>,
    pub schematic: Option<PathBuf>,
    pub export: Option<PathBuf>,
    pub dbu_per_um: u32,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            pdk: String::new(),
            top_cell: None,
            rules: None,
            schematic: None,
            export: None,
            dbu_per_um: default_dbu_per_um(),
        }
    }
}

impl ProjectSettings {
    pub fn new(name: &str, pdk: &str) -> Self {
        Self {
            name: name.to_string(),
            pdk: pdk.to_string(),
            ..Default::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        let settings: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        log::info!("Loaded project '{}' from {}", settings.name, path.display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> IoResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads the rule deck named by `rules`, relative to `root`.
    pub fn load_rules(&self, root: impl AsRef<Path>) -> IoResult<DesignRules> {
        let file = self.rules.as_ref().ok_or(IoError::MissingSetting("rules"))?;
        load_rules(root.as_ref().join(file))
    }

    pub fn load_schematic(&self, root: impl AsRef<Path>) -> IoResult<SchematicCell> {
        let file = self
            .schematic
            .as_ref()
            .ok_or(IoError::MissingSetting("schematic"))?;
        load_schematic(root.as_ref().join(file))
    }

    /// Exports `top_cell` (a dotted instance path below `root_cell`, or
    /// `root_cell` itself when unset) to the `export` file under `root`.
    pub fn write_export(
        &self,
        root: impl AsRef<Path>,
        layout: &Layout,
        root_cell: CellId,
    ) -> IoResult<LayoutExport> {
        let file = self.export.as_ref().ok_or(IoError::MissingSetting("export"))?;
        let mut export = match self.top_cell.as_deref() {
            Some(path) => LayoutExport::build_at(layout, root_cell, path)?,
            None => LayoutExport::build(layout, root_cell),
        };
        export.dbu_per_um = self.dbu_per_um;
        export.save(root.as_ref().join(file))?;
        Ok(export)
    }
}

pub fn load_rules(path: impl AsRef<Path>) -> IoResult<DesignRules> {
    let path = path.as_ref();
    let rules = DesignRules::from_json(&fs::read_to_string(path)?)?;
    log::info!(
        "Rule deck '{}': {} routing layers, {} vias",
        rules.name,
        rules.stack.layer_count(),
        rules.vias.len()
    );
    Ok(rules)
}

pub fn load_schematic(path: impl AsRef<Path>) -> IoResult<SchematicCell> {
    let path = path.as_ref();
    let cell = SchematicCell::from_json(&fs::read_to_string(path)?)?;
    log::info!("Schematic '{}': {} instances", cell.cell_name, cell.instances.len());
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use layforge_core::{CellSpec, ConnectivitySource, InstanceConnectivity, Layer};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("layforge-io-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_partial_settings_take_defaults() {
        let settings: ProjectSettings = serde_json::from_str(r#"{"name": "amp"}"#).unwrap();
        assert_eq!(settings.name, "amp");
        assert_eq!(settings.dbu_per_um, 1000);
        assert!(matches!(
            settings.load_rules("."),
            Err(IoError::MissingSetting("rules"))
        ));
    }

    #[test]
    fn test_load_project_inputs() {
        let dir = scratch_dir("project");

        let mut rules = DesignRules::new("demo");
        rules.add_routing_layer(Layer::conductor("MET1"), 140, 140);
        fs::write(dir.join("rules.json"), rules.to_json().unwrap()).unwrap();

        let mut sch = SchematicCell::new("Inverter");
        sch.add_instance(InstanceConnectivity::new("MN").connect("D", "out"));
        fs::write(dir.join("inv.json"), sch.to_json().unwrap()).unwrap();

        let settings = ProjectSettings {
            rules: Some("rules.json".into()),
            schematic: Some("inv.json".into()),
            ..ProjectSettings::new("inv", "demo")
        };
        settings.save(dir.join("project.json")).unwrap();

        let loaded = ProjectSettings::load(dir.join("project.json")).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.load_rules(&dir).unwrap(), rules);
        let sch = loaded.load_schematic(&dir).unwrap();
        assert_eq!(sch.instance("MN").and_then(|i| i.terminal_net("d").map(str::to_string)), Some("out".into()));

        assert!(matches!(load_rules(dir.join("missing.json")), Err(IoError::Io(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_export_uses_settings() {
        let dir = scratch_dir("export");
        let mut layout = Layout::new("test");
        let top = layout.create(CellSpec::new("Top")).unwrap();
        let unit = layout
            .create(CellSpec::new("Unit").instance("U0").parent(top))
            .unwrap();
        layout.add_rect(unit, Layer::conductor("MET1"), 0, 0, 100, 100, Some("a"));

        let settings = ProjectSettings::new("demo", "demo");
        assert!(matches!(
            settings.write_export(&dir, &layout, top),
            Err(IoError::MissingSetting("export"))
        ));

        let settings = ProjectSettings {
            export: Some("unit.json".into()),
            top_cell: Some("U0".into()),
            dbu_per_um: 2000,
            ..settings
        };
        let written = settings.write_export(&dir, &layout, top).unwrap();
        let loaded = LayoutExport::load(dir.join("unit.json")).unwrap();
        assert_eq!(loaded, written);
        assert_eq!(loaded.name, "Unit");
        assert_eq!(loaded.dbu_per_um, 2000);
        assert_eq!(loaded.shapes.len(), 1);
        fs::remove_dir_all(&dir).ok();
    }
}
