//! JSON export of a built layout.
//!
//! An export holds three views of one top cell: the instance tree with each
//! cell's transform and pins, the list of distinct cell names, and the
//! flattened net-resolved shapes handed to external tools.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use layforge_core::{CellId, Layer, Layout, Rect, Shape, Transform};

use crate::error::IoResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinExport {
    pub name: String,
    pub terminal: String,
    pub layer: Layer,
    /// In the owning cell's frame.
    pub bounds: Rect,
    pub net: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceExport {
    pub instance_name: String,
    pub cell_name: String,
    /// Placement in the parent's frame.
    pub transform: Transform,
    pub pins: Vec<PinExport>,
    pub children: Vec<InstanceExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutExport {
    pub name: String,
    /// Database units per micron; coordinates are in nm at the default.
    #[serde(default = "default_dbu_per_um")]
    pub dbu_per_um: u32,
    pub bbox: Rect,
    pub tree: InstanceExport,
    /// Distinct cell names in the tree, sorted.
    pub cells: Vec<String>,
    /// Every shape in the top cell's frame with nets resolved.
    pub shapes: Vec<Shape>,
}

pub(crate) fn default_dbu_per_um() -> u32 {
    1000
}

impl LayoutExport {
    pub fn build(layout: &Layout, cell: CellId) -> Self {
        let tree = instance(layout, cell);
        let mut cells = Vec::new();
        collect_cells(&tree, &mut cells);
        cells.sort();
        cells.dedup();
        let shapes = layout.flatten(cell, true);
        log::info!(
            "Exported {}: {} cells, {} shapes",
            layout.hierarchy_name(cell),
            cells.len(),
            shapes.len()
        );
        Self {
            name: layout.cell(cell).cell_name().to_string(),
            dbu_per_um: default_dbu_per_um(),
            bbox: layout.bbox(cell),
            tree,
            cells,
            shapes,
        }
    }

    /// Export of the cell at dotted instance path `path` below `root`.
    pub fn build_at(layout: &Layout, root: CellId, path: &str) -> IoResult<Self> {
        let cell = layout.find_cell(root, path)?;
        Ok(Self::build(layout, cell))
    }

    /// Shapes on `layer`, in export order.
    pub fn shapes_on_layer<'a>(&'a self, layer: &'a Layer) -> impl Iterator<Item = &'a Shape> {
        self.shapes.iter().filter(move |s| &s.layer == layer)
    }

    pub fn to_json(&self) -> IoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> IoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> IoResult<()> {
        let mut writer = BufWriter::new(writer);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> IoResult<Self> {
        Ok(serde_json::from_reader(BufReader::new(reader))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> IoResult<()> {
        let path = path.as_ref();
        self.write_to(File::create(path)?)?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> IoResult<Self> {
        Self::read_from(File::open(path)?)
    }
}

fn instance(layout: &Layout, id: CellId) -> InstanceExport {
    let cell = layout.cell(id);
    let pins = cell
        .pins()
        .map(|r| PinExport {
            name: r.name().to_string(),
            terminal: r.terminal().unwrap_or(r.name()).to_string(),
            layer: r.layer().clone(),
            bounds: r.bounds(),
            net: r.net().map(str::to_string),
        })
        .collect();
    InstanceExport {
        instance_name: cell.instance_name().to_string(),
        cell_name: cell.cell_name().to_string(),
        transform: *cell.transform(),
        pins,
        children: cell.subcells().map(|(_, sub)| instance(layout, sub)).collect(),
    }
}

fn collect_cells(tree: &InstanceExport, out: &mut Vec<String>) {
    out.push(tree.cell_name.clone());
    for child in &tree.children {
        collect_cells(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layforge_core::{CellSpec, Point};

    fn sample() -> (Layout, CellId) {
        let mut layout = Layout::new("test");
        let top = layout.create(CellSpec::new("Top")).unwrap();
        for (i, name) in ["A", "B"].into_iter().enumerate() {
            let id = layout
                .create(CellSpec::new("Unit").instance(name).parent(top))
                .unwrap();
            let pad = layout.add_rect(id, Layer::conductor("MET1"), 0, 0, 100, 100, Some("p"));
            layout.add_pin(id, "P", pad).unwrap();
            layout.move_by(id, 200 * i as i64, 0);
        }
        (layout, top)
    }

    #[test]
    fn test_export_tree_and_cells() {
        let (layout, top) = sample();
        let export = LayoutExport::build(&layout, top);
        assert_eq!(export.cells, vec!["Top".to_string(), "Unit".to_string()]);
        assert_eq!(export.tree.children.len(), 2);
        let b = &export.tree.children[1];
        assert_eq!(b.instance_name, "B");
        assert_eq!(b.transform.x, 200);
        assert_eq!(b.pins[0].terminal, "P");
        assert_eq!(export.bbox, Rect::new(0, 0, 300, 100));
        assert_eq!(export.shapes.len(), 2);
        assert_eq!(export.shapes[1].center(), Point::new(250, 50));
        assert_eq!(export.shapes[1].source.as_deref(), Some("Top.B"));
    }

    #[test]
    fn test_json_round_trip_through_writer() {
        let (layout, top) = sample();
        let export = LayoutExport::build(&layout, top);
        let mut buf = Vec::new();
        export.write_to(&mut buf).unwrap();
        let loaded = LayoutExport::read_from(buf.as_slice()).unwrap();
        assert_eq!(loaded, export);
        assert_eq!(loaded.dbu_per_um, 1000);
        assert_eq!(loaded.shapes_on_layer(&Layer::new("MET1")).count(), 2);
        assert!(LayoutExport::from_json("{").is_err());
    }

    #[test]
    fn test_build_at_path() {
        let (layout, top) = sample();
        let export = LayoutExport::build_at(&layout, top, "B").unwrap();
        assert_eq!(export.name, "Unit");
        assert_eq!(export.shapes[0].bounds(), Rect::new(0, 0, 100, 100));
        assert!(matches!(
            LayoutExport::build_at(&layout, top, "C"),
            Err(crate::IoError::Layout(_))
        ));
    }
}
