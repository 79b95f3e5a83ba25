use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::cell::{encode_cell_name, CellId, CellSpec, LayoutCell, ShapeId};
use crate::connectivity::{replica_name, schematic_instance};
use crate::error::{LayoutError, LayoutResult};
use crate::geometry::{Point, Polygon, Rect, Rotation, Transform};
use crate::layer::Layer;
use crate::refs::{Compass, DerivedPoint, Ref, RefKey, RefTarget, ResolvedPoint, RoutePoint};
use crate::replica::ReplicaGroup;
use crate::shape::Shape;

/// Side of another cell to align against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Left,
    Above,
    Below,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "right" => Ok(Direction::Right),
            "left" => Ok(Direction::Left),
            "above" | "top" => Ok(Direction::Above),
            "below" | "bottom" => Ok(Direction::Below),
            other => Err(format!("unknown alignment direction '{other}'")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Right => "right",
            Direction::Left => "left",
            Direction::Above => "above",
            Direction::Below => "below",
        };
        f.write_str(s)
    }
}

/// Arena owning every cell of one or more layout trees.
///
/// Cells refer to their parent and subcells through [`CellId`] handles into
/// this arena. A `CellId` is only meaningful for the `Layout` that issued it;
/// passing one from another arena panics or addresses the wrong cell.
#[derive(Debug, Default)]
pub struct Layout {
    name: String,
    cells: Vec<LayoutCell>,
}

impl Layout {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Cell management ──────────────────────────────────────────────

    /// Creates a cell and, if it has a parent, registers it there
    /// as a subcell.
    pub fn create(&mut self, spec: CellSpec) -> LayoutResult<CellId> {
        let CellSpec {
            base_name,
            instance_name,
            parent,
            connectivity,
            params,
        } = spec;

        let instance_name = instance_name
            .or_else(|| {
                connectivity
                    .as_deref()
                    .and_then(|c| c.instance_name().map(str::to_string))
            })
            .unwrap_or_else(|| base_name.clone());
        let schematic_params = connectivity
            .as_deref()
            .map(|c| c.parameters())
            .unwrap_or_default();
        let cell_name = encode_cell_name(&base_name, &schematic_params, &params);

        if let Some(parent) = parent {
            if self.cell(parent).subcells.contains_key(&instance_name) {
                return Err(LayoutError::DuplicateInstance {
                    parent: self.hierarchy_name(parent),
                    name: instance_name,
                });
            }
        }

        let id = CellId(self.cells.len());
        self.cells.push(LayoutCell {
            cell_name,
            instance_name: instance_name.clone(),
            parent,
            transform: Transform::identity(),
            shapes: Vec::new(),
            refs: BTreeMap::new(),
            subcells: BTreeMap::new(),
            connectivity,
            checklist: None,
        });
        if let Some(parent) = parent {
            self.cell_mut(parent).subcells.insert(instance_name, id);
        }
        log::debug!(
            "Created cell {} ({})",
            self.hierarchy_name(id),
            self.cell(id).cell_name
        );
        Ok(id)
    }

    /// Creates every layout copy of schematic instance `instance` of
    /// `parent`. The copy count comes from the parent's connectivity source;
    /// copies of a replicated instance are named `instance_0`, `instance_1`…
    pub fn instantiate(
        &mut self,
        parent: CellId,
        instance: &str,
        mut make: impl FnMut(usize) -> CellSpec,
    ) -> LayoutResult<ReplicaGroup<CellId>> {
        let count = self
            .cell(parent)
            .connectivity
            .as_deref()
            .map_or(1, |c| c.replica_count(instance));
        let mut ids = Vec::with_capacity(count);
        for index in 0..count {
            let name = replica_name(instance, index, count);
            ids.push(self.create(make(index).instance(&name).parent(parent))?);
        }
        Ok(ReplicaGroup::new(instance, ids))
    }

    pub fn cell(&self, id: CellId) -> &LayoutCell {
        &self.cells[id.0]
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> &mut LayoutCell {
        &mut self.cells[id.0]
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellId, &LayoutCell)> {
        self.cells.iter().enumerate().map(|(i, c)| (CellId(i), c))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells without a parent.
    pub fn roots(&self) -> Vec<CellId> {
        self.cells()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn get_subcell(&self, cell: CellId, name: &str) -> LayoutResult<CellId> {
        self.cell(cell)
            .subcells
            .get(name)
            .copied()
            .ok_or_else(|| LayoutError::UnknownSubcell {
                cell: self.hierarchy_name(cell),
                name: name.to_string(),
            })
    }

    /// Follows a dotted path of instance names below `cell`.
    pub fn find_cell(&self, cell: CellId, path: &str) -> LayoutResult<CellId> {
        path.split('.')
            .filter(|part| !part.is_empty())
            .try_fold(cell, |current, part| self.get_subcell(current, part))
    }

    pub fn get_ref(&self, cell: CellId, name: &str) -> LayoutResult<&Ref> {
        self.cell(cell)
            .refs
            .get(name)
            .ok_or_else(|| LayoutError::UnknownRef {
                cell: self.hierarchy_name(cell),
                name: name.to_string(),
            })
    }

    /// Key of an existing ref.
    pub fn ref_key(&self, cell: CellId, name: &str) -> LayoutResult<RefKey> {
        self.get_ref(cell, name).map(Ref::key)
    }

    /// Resolves `"A.B.ref"` to the ref `ref` of subcell `A.B` of `cell`.
    pub fn lookup(&self, cell: CellId, path: &str) -> LayoutResult<RefKey> {
        let (cells, name) = path.rsplit_once('.').unwrap_or(("", path));
        let owner = self.find_cell(cell, cells)?;
        self.ref_key(owner, name)
    }

    /// Dotted instance path from the root of `cell`'s tree.
    pub fn hierarchy_name(&self, cell: CellId) -> String {
        let mut parts = vec![self.cell(cell).instance_name.as_str()];
        let mut current = self.cell(cell).parent;
        while let Some(id) = current {
            parts.push(&self.cell(id).instance_name);
            current = self.cell(id).parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Dotted instance path from `root` down to `cell`, both included.
    fn relative_path(&self, root: CellId, cell: CellId) -> String {
        let mut parts = vec![self.cell(cell).instance_name.as_str()];
        let mut current = cell;
        while current != root {
            match self.cell(current).parent {
                Some(parent) => {
                    parts.push(&self.cell(parent).instance_name);
                    current = parent;
                }
                None => break,
            }
        }
        parts.reverse();
        parts.join(".")
    }

    /// True when `ancestor` is `cell` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: CellId, cell: CellId) -> bool {
        let mut current = Some(cell);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.cell(id).parent;
        }
        false
    }

    pub fn root_of(&self, cell: CellId) -> CellId {
        let mut current = cell;
        while let Some(parent) = self.cell(current).parent {
            current = parent;
        }
        current
    }

    // ── Geometry ─────────────────────────────────────────────────────

    pub fn add_shape(&mut self, cell: CellId, shape: Shape) -> ShapeId {
        let shapes = &mut self.cell_mut(cell).shapes;
        shapes.push(shape);
        ShapeId {
            cell,
            index: shapes.len() - 1,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_rect(
        &mut self,
        cell: CellId,
        layer: Layer,
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        net: Option<&str>,
    ) -> ShapeId {
        self.add_shape(cell, Shape::rect(layer, x0, y0, x1, y1, net))
    }

    pub fn add_polygon(
        &mut self,
        cell: CellId,
        layer: Layer,
        vertices: Vec<Point>,
        net: Option<&str>,
    ) -> LayoutResult<ShapeId> {
        let polygon = Polygon::new(vertices)?;
        Ok(self.add_shape(cell, Shape::polygon(layer, polygon, net)))
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.cell(id.cell).shapes.get(id.index)
    }

    /// Bounding box of `cell` in its local frame: own shapes plus the four
    /// transformed corners of every subcell's bounding box. `(0,0,0,0)` for
    /// an empty cell.
    pub fn bbox(&self, cell: CellId) -> Rect {
        let c = self.cell(cell);
        let subcells = c
            .subcells
            .values()
            .map(|&sub| self.bbox(sub).transformed(&self.cell(sub).transform));
        c.local_bbox()
            .into_iter()
            .chain(subcells)
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or_else(|| Rect::new(0, 0, 0, 0))
    }

    // ── Refs and pins ────────────────────────────────────────────────

    /// Names a shape of `cell`, a ref below it, or a layered point.
    ///
    /// The ref keeps a snapshot of the target's bounds, layer and net, all
    /// expressed in `cell`'s frame. Re-using a name replaces the old ref.
    pub fn add_ref(
        &mut self,
        cell: CellId,
        name: &str,
        target: impl Into<RefTarget>,
    ) -> LayoutResult<RefKey> {
        let shape = self.ref_shape(cell, name, &target.into())?;
        Ok(self.insert_ref(cell, name, shape, None))
    }

    /// Like [`Layout::add_ref`], but marks the ref as terminal `name` of
    /// `cell`. Pinning a subcell's ref checks off that connection in the
    /// checklist of `cell`.
    pub fn add_pin(
        &mut self,
        cell: CellId,
        name: &str,
        target: impl Into<RefTarget>,
    ) -> LayoutResult<RefKey> {
        let target = target.into();
        let mut shape = self.ref_shape(cell, name, &target)?;
        let origin = match &target {
            RefTarget::Shape(_) => None,
            RefTarget::Ref(key) => Some(key.clone()),
            RefTarget::Point(p) => p.origin.clone(),
        };
        if shape.net.is_none() {
            shape.net = Some(name.to_string());
        }
        let net = shape.net.clone();
        let key = self.insert_ref(cell, name, shape, Some(name.to_string()));
        if let Some(origin) = origin {
            self.check_off_pin(cell, &origin, net.as_deref());
        }
        Ok(key)
    }

    fn ref_shape(&self, cell: CellId, name: &str, target: &RefTarget) -> LayoutResult<Shape> {
        match target {
            RefTarget::Shape(id) => {
                let shape = if id.cell == cell { self.shape(*id) } else { None };
                shape.cloned().ok_or_else(|| LayoutError::HierarchyMismatch {
                    cell: self.hierarchy_name(cell),
                    what: format!("Shape {} of '{}'", id.index, self.hierarchy_name(id.cell)),
                })
            }
            RefTarget::Ref(key) => {
                let r = self.get_ref(key.cell, &key.name)?;
                let transform = self.project(key.cell, Some(cell))?;
                let mut shape = r.shape.transformed(&transform);
                shape.net = r.net().map(|n| self.map_net(key.cell, Some(cell), n));
                Ok(shape)
            }
            RefTarget::Point(p) => {
                let layer = p.layer.clone().ok_or_else(|| LayoutError::UnlayeredPoint {
                    name: name.to_string(),
                })?;
                let at = self.project(p.frame, Some(cell))?.apply(&p.at);
                let net = p.net.as_deref().map(|n| self.map_net(p.frame, Some(cell), n));
                Ok(Shape::rect(layer, at.x, at.y, at.x, at.y, net.as_deref()))
            }
        }
    }

    fn insert_ref(
        &mut self,
        cell: CellId,
        name: &str,
        shape: Shape,
        terminal: Option<String>,
    ) -> RefKey {
        let r = Ref {
            name: name.to_string(),
            owner: cell,
            shape,
            terminal,
        };
        if self.cell_mut(cell).refs.insert(name.to_string(), r).is_some() {
            log::debug!("{}: replaced ref '{}'", self.hierarchy_name(cell), name);
        }
        RefKey::new(cell, name)
    }

    // ── Transforms ───────────────────────────────────────────────────

    pub fn set_transform(&mut self, cell: CellId, transform: Transform) {
        self.cell_mut(cell).transform = transform;
    }

    pub fn move_by(&mut self, cell: CellId, dx: i64, dy: i64) {
        let t = &mut self.cell_mut(cell).transform;
        t.x += dx;
        t.y += dy;
    }

    /// Adds `degrees` to the cell's rotation, keeping its position.
    pub fn rotate(&mut self, cell: CellId, degrees: i64) -> LayoutResult<()> {
        let rotation = Rotation::from_degrees(degrees)?;
        let t = &mut self.cell_mut(cell).transform;
        t.rotation = t.rotation.plus(rotation);
        Ok(())
    }

    /// Toggles mirroring about the cell's local X axis.
    pub fn mirror_x(&mut self, cell: CellId) {
        let t = &mut self.cell_mut(cell).transform;
        t.mirror_x = !t.mirror_x;
    }

    /// Transform taking coordinates in `frame`'s local frame into `to`'s
    /// local frame, or into world coordinates when `to` is `None`.
    ///
    /// `to` must be `frame` itself or one of its ancestors.
    pub fn project(&self, frame: CellId, to: Option<CellId>) -> LayoutResult<Transform> {
        let mut transform = Transform::identity();
        let mut current = frame;
        loop {
            if Some(current) == to {
                return Ok(transform);
            }
            transform = transform.compose(&self.cell(current).transform);
            match self.cell(current).parent {
                Some(parent) => current = parent,
                None if to.is_none() => return Ok(transform),
                None => {
                    return Err(LayoutError::HierarchyMismatch {
                        cell: to.map_or_else(String::new, |c| self.hierarchy_name(c)),
                        what: format!("Frame of '{}'", self.hierarchy_name(frame)),
                    })
                }
            }
        }
    }

    // ── Points ───────────────────────────────────────────────────────

    /// Resolves a route point into the frame of `cell`. Literal
    /// coordinates are taken to be in that frame already.
    pub fn resolve(&self, cell: CellId, point: &RoutePoint) -> LayoutResult<ResolvedPoint> {
        self.resolve_in(Some(cell), point)
    }

    fn resolve_in(&self, to: Option<CellId>, point: &RoutePoint) -> LayoutResult<ResolvedPoint> {
        match point {
            RoutePoint::Literal(at) => Ok(ResolvedPoint {
                at: *at,
                layer: None,
                net: None,
                origin: None,
                bounds: None,
            }),
            RoutePoint::Named(key) => {
                let r = self.get_ref(key.cell, &key.name)?;
                let bounds = r.bounds().transformed(&self.project(key.cell, to)?);
                Ok(ResolvedPoint {
                    at: bounds.center(),
                    layer: Some(r.layer().clone()),
                    net: r.net().map(|n| self.map_net(key.cell, to, n)),
                    origin: Some(key.clone()),
                    bounds: Some(bounds),
                })
            }
            RoutePoint::Derived(d) => {
                let at = self.project(d.frame, to)?.apply(&d.at);
                let bounds = match &d.origin {
                    Some(origin) => {
                        let r = self.get_ref(origin.cell, &origin.name)?;
                        Some(r.bounds().transformed(&self.project(origin.cell, to)?))
                    }
                    None => None,
                };
                Ok(ResolvedPoint {
                    at,
                    layer: d.layer.clone(),
                    net: d.net.as_deref().map(|n| self.map_net(d.frame, to, n)),
                    origin: d.origin.clone(),
                    bounds,
                })
            }
        }
    }

    /// A compass point of a ref's bounds expressed in `frame`, which must be
    /// the ref's owner or one of its ancestors. `None` means the root of the
    /// owner's tree.
    pub fn compass(
        &self,
        key: &RefKey,
        compass: Compass,
        frame: Option<CellId>,
    ) -> LayoutResult<DerivedPoint> {
        let frame = frame.unwrap_or_else(|| self.root_of(key.cell));
        let r = self.get_ref(key.cell, &key.name)?;
        let bounds = r.bounds().transformed(&self.project(key.cell, Some(frame))?);
        Ok(DerivedPoint {
            at: compass.of(&bounds),
            frame,
            layer: Some(r.layer().clone()),
            net: r.net().map(|n| self.map_net(key.cell, Some(frame), n)),
            origin: Some(key.clone()),
        })
    }

    // ── Placement ────────────────────────────────────────────────────

    /// Moves `cell` so that `anchor` lands on `at`.
    ///
    /// `at` is resolved in the parent's frame (literal coordinates are
    /// parent coordinates); `anchor` must lie in `cell`'s own subtree
    /// (literal coordinates are `cell`-local).
    pub fn place(&mut self, cell: CellId, at: &RoutePoint, anchor: &RoutePoint) -> LayoutResult<()> {
        let parent = self.cell(cell).parent;
        let target = self.resolve_in(parent, at)?.at;
        let anchor_frame = match anchor {
            RoutePoint::Literal(_) => cell,
            RoutePoint::Named(key) => key.cell,
            RoutePoint::Derived(d) => d.frame,
        };
        if !self.is_ancestor(cell, anchor_frame) {
            return Err(LayoutError::HierarchyMismatch {
                cell: self.hierarchy_name(cell),
                what: format!("Anchor in '{}'", self.hierarchy_name(anchor_frame)),
            });
        }
        let current = match anchor {
            RoutePoint::Literal(p) => self.cell(cell).transform.apply(p),
            other => self.resolve_in(parent, other)?.at,
        };
        self.move_by(cell, target.x - current.x, target.y - current.y);
        Ok(())
    }

    /// Moves `cell` next to `other` on side `direction`, leaving `margin`
    /// between the facing bbox edges. With `match_edges`, the bottom (for
    /// left/right) or left (for above/below) edges are lined up as well.
    pub fn align(
        &mut self,
        cell: CellId,
        direction: Direction,
        other: CellId,
        margin: i64,
        match_edges: bool,
    ) -> LayoutResult<()> {
        if self.is_ancestor(cell, other) {
            return Err(LayoutError::HierarchyMismatch {
                cell: self.hierarchy_name(cell),
                what: format!("Alignment target '{}'", self.hierarchy_name(other)),
            });
        }
        let frame = self.cell(cell).parent;
        let s = self.bbox(cell).transformed(&self.cell(cell).transform);
        let o = self.bbox(other).transformed(&self.project(other, frame)?);

        let (dx, dy) = match direction {
            Direction::Right => (o.max.x + margin - s.min.x, 0),
            Direction::Left => (o.min.x - margin - s.max.x, 0),
            Direction::Above => (0, o.max.y + margin - s.min.y),
            Direction::Below => (0, o.min.y - margin - s.max.y),
        };
        let (dx, dy) = match (direction, match_edges) {
            (Direction::Right | Direction::Left, true) => (dx, o.min.y - s.min.y),
            (Direction::Above | Direction::Below, true) => (o.min.x - s.min.x, dy),
            _ => (dx, dy),
        };
        self.move_by(cell, dx, dy);
        Ok(())
    }

    /// Lines cells up one after another: each is aligned (with matching
    /// edges) on side `direction` of the previous one.
    pub fn stack(&mut self, cells: &[CellId], direction: Direction, margin: i64) -> LayoutResult<()> {
        for pair in cells.windows(2) {
            self.align(pair[1], direction, pair[0], margin, true)?;
        }
        Ok(())
    }

    // ── Flattening ───────────────────────────────────────────────────

    /// Every shape below `cell`, expressed in `cell`'s frame.
    ///
    /// With `resolve_nets`, each net is renamed to what it is called at
    /// `cell`'s level and `source` is set to the dotted instance path of the
    /// shape's owner, starting with `cell`'s own instance name.
    pub fn flatten(&self, cell: CellId, resolve_nets: bool) -> Vec<Shape> {
        let mut shapes = Vec::new();
        self.flatten_into(cell, cell, &Transform::identity(), resolve_nets, &mut shapes);
        shapes
    }

    fn flatten_into(
        &self,
        root: CellId,
        id: CellId,
        transform: &Transform,
        resolve_nets: bool,
        out: &mut Vec<Shape>,
    ) {
        let c = self.cell(id);
        let source = resolve_nets.then(|| self.relative_path(root, id));
        out.extend(c.shapes.iter().map(|shape| {
            let mut flat = shape.transformed(transform);
            if resolve_nets {
                flat.net = flat.net.map(|n| self.map_net(id, Some(root), &n));
                flat.source = source.clone();
            }
            flat
        }));
        for &sub in c.subcells.values() {
            let child = self.cell(sub).transform.compose(transform);
            self.flatten_into(root, sub, &child, resolve_nets, out);
        }
    }

    /// Renames `net`, local to `from`, to its name in `to`'s scope.
    ///
    /// At each level a net connected to a terminal of the child instance
    /// takes the parent net's name; any other net is qualified as
    /// `instance.net`. Levels whose parent has no connectivity source, or
    /// whose source does not list the child, pass names through unchanged.
    pub fn map_net(&self, from: CellId, to: Option<CellId>, net: &str) -> String {
        let mut net = net.to_string();
        let mut current = from;
        while Some(current) != to {
            let Some(parent) = self.cell(current).parent else {
                break;
            };
            let instance = &self.cell(current).instance_name;
            if let Some(source) = self.cell(parent).connectivity.as_deref() {
                if let Some(inst) = schematic_instance(source, instance) {
                    net = match inst.terminal_net(&net) {
                        Some(parent_net) => parent_net.to_string(),
                        None => format!("{instance}.{net}"),
                    };
                }
            }
            current = parent;
        }
        net
    }
}
