//! Via definitions between adjacent routing layers and the cut arrays drawn
//! from them.

use serde::{Deserialize, Serialize};

use layforge_core::{
    CellId, Layer, LayerStack, Layout, LayoutError, LayoutResult, Point, Rect, Shape, ShapeId,
};

/// Cut and enclosure rules for a via between two adjacent routing layers.
///
/// `*_enc` is the enclosure required on every side. `*_enc_adjacent` is the
/// larger enclosure required on one of two adjacent sides; it is always
/// applied along X, the plain enclosure along Y.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaDefinition {
    pub name: String,
    pub bottom_layer: Layer,
    pub cut_layer: Layer,
    pub top_layer: Layer,
    pub cut_w: i64,
    pub cut_h: i64,
    pub cut_spacing: i64,
    pub bottom_enc: i64,
    pub bottom_enc_adjacent: i64,
    pub top_enc: i64,
    pub top_enc_adjacent: i64,
}

/// Metal pad sizes `(w, h)` needed around a cut array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaFootprint {
    pub bottom: (i64, i64),
    pub top: (i64, i64),
}

impl ViaFootprint {
    /// Largest pad dimension on either metal.
    pub fn max_dimension(&self) -> i64 {
        [self.bottom.0, self.bottom.1, self.top.0, self.top.1]
            .into_iter()
            .max()
            .unwrap_or(0)
    }
}

impl ViaDefinition {
    /// Largest `(nx, ny)` cut grid fitting in `w × h`, at least `1 × 1`.
    /// Enclosures are not included; subtract them first.
    pub fn max_cuts(&self, w: i64, h: i64) -> (usize, usize) {
        let fit = |avail: i64, cut: i64| {
            let n = (avail + self.cut_spacing).div_euclid(cut + self.cut_spacing);
            n.max(1) as usize
        };
        (fit(w, self.cut_w), fit(h, self.cut_h))
    }

    /// Size of an `nx × ny` cut array, enclosures excluded.
    pub fn array_extent(&self, nx: usize, ny: usize) -> (i64, i64) {
        let span = |n: usize, cut: i64| {
            let n = n.max(1) as i64;
            n * cut + (n - 1) * self.cut_spacing
        };
        (span(nx, self.cut_w), span(ny, self.cut_h))
    }

    pub fn metal_footprint(&self, nx: usize, ny: usize) -> ViaFootprint {
        let (w, h) = self.array_extent(nx, ny);
        ViaFootprint {
            bottom: (w + 2 * self.bottom_enc_adjacent, h + 2 * self.bottom_enc),
            top: (w + 2 * self.top_enc_adjacent, h + 2 * self.top_enc),
        }
    }

    /// Two-cut arrangement for a route corner: `1 × 2` or `2 × 1`, whichever
    /// keeps the larger pad dimension smaller. Ties go to `1 × 2`.
    pub fn corner_cuts(&self) -> (usize, usize) {
        let column = self.metal_footprint(1, 2).max_dimension();
        let row = self.metal_footprint(2, 1).max_dimension();
        if row < column {
            (2, 1)
        } else {
            (1, 2)
        }
    }

    /// Narrowest straight wire that can host a corner via.
    pub fn min_route_width(&self) -> i64 {
        let (nx, ny) = self.corner_cuts();
        let fp = self.metal_footprint(nx, ny);
        fp.bottom.0.min(fp.bottom.1).max(fp.top.0.min(fp.top.1))
    }

    /// True when this via joins `a` and `b`, in either order.
    pub fn connects(&self, a: &Layer, b: &Layer) -> bool {
        (&self.bottom_layer == a && &self.top_layer == b)
            || (&self.bottom_layer == b && &self.top_layer == a)
    }

    /// Geometry of an `nx × ny` array centered on `center`.
    pub fn array(&self, center: Point, nx: usize, ny: usize, net: Option<&str>) -> ViaArray {
        let (nx, ny) = (nx.max(1), ny.max(1));
        let (w, h) = self.array_extent(nx, ny);
        let area = Rect::centered(center, w, h);
        let mut cuts = Vec::with_capacity(nx * ny);
        for j in 0..ny as i64 {
            for i in 0..nx as i64 {
                let x0 = area.min.x + i * (self.cut_w + self.cut_spacing);
                let y0 = area.min.y + j * (self.cut_h + self.cut_spacing);
                cuts.push(Shape::rect(
                    self.cut_layer.clone(),
                    x0,
                    y0,
                    x0 + self.cut_w,
                    y0 + self.cut_h,
                    net,
                ));
            }
        }
        let fp = self.metal_footprint(nx, ny);
        let pad = |layer: &Layer, (w, h): (i64, i64)| {
            let r = Rect::centered(center, w, h);
            Shape::rect(layer.clone(), r.min.x, r.min.y, r.max.x, r.max.y, net)
        };
        ViaArray {
            name: self.name.clone(),
            nx,
            ny,
            bottom: pad(&self.bottom_layer, fp.bottom),
            top: pad(&self.top_layer, fp.top),
            cuts,
        }
    }
}

/// Shapes of one drawn via array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaArray {
    pub name: String,
    pub nx: usize,
    pub ny: usize,
    pub bottom: Shape,
    pub top: Shape,
    pub cuts: Vec<Shape>,
}

impl ViaArray {
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        [&self.bottom, &self.top].into_iter().chain(self.cuts.iter())
    }
}

/// Via definitions needed to go from layer `a` to layer `b`, ordered
/// bottom-up whatever the argument order. Empty when `a == b`.
pub fn get_via_stack<'a>(
    a: &Layer,
    b: &Layer,
    stack: &LayerStack,
    vias: &'a [ViaDefinition],
) -> LayoutResult<Vec<&'a ViaDefinition>> {
    let index = |layer: &Layer| {
        stack
            .index_of(layer)
            .ok_or_else(|| LayoutError::MissingLayerRule {
                layer: layer.name.clone(),
                rule: "routing stack".to_string(),
            })
    };
    let (ia, ib) = (index(a)?, index(b)?);
    let layers = stack.all_layers();
    (ia.min(ib)..ia.max(ib))
        .map(|i| {
            let (bottom, top) = (&layers[i], &layers[i + 1]);
            vias.iter()
                .find(|v| &v.bottom_layer == bottom && &v.top_layer == top)
                .ok_or_else(|| LayoutError::MissingLayerRule {
                    layer: format!("{}-{}", bottom.name, top.name),
                    rule: "via".to_string(),
                })
        })
        .collect()
}

/// Draws an `nx × ny` array of `def` into `cell` and returns its shapes.
pub fn draw_via(
    layout: &mut Layout,
    cell: CellId,
    def: &ViaDefinition,
    center: Point,
    (nx, ny): (usize, usize),
    net: Option<&str>,
) -> Vec<ShapeId> {
    let array = def.array(center, nx, ny, net);
    log::debug!(
        "{}: {} {}x{} at {}",
        layout.hierarchy_name(cell),
        array.name,
        array.nx,
        array.ny,
        center
    );
    array
        .shapes()
        .map(|shape| layout.add_shape(cell, shape.clone()))
        .collect()
}
