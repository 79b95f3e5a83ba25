//! Pattern routing between two route points.
//!
//! A request names two endpoints, one or two layers and a pattern (`-`, `|`,
//! `-|`, `|-`). The router turns symbolic tracks into perpendicular offsets,
//! builds the waypoint list, draws the wire, drops vias where the layer
//! changes, and checks the connection off the target cell's checklist.

use std::fmt;
use std::str::FromStr;

use layforge_core::{
    CellId, DerivedPoint, Layer, Layout, LayoutError, LayoutResult, Point, Rect, ResolvedPoint,
    RoutePoint, ShapeId,
};

use crate::path::{EndStyle, Route};
use crate::rules::DesignRules;
use crate::via::{draw_via, ViaDefinition};

/// Shape of a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RoutePattern {
    /// `-`: one horizontal run at the start's y.
    #[default]
    Horizontal,
    /// `|`: one vertical run at the start's x.
    Vertical,
    /// `-|`: horizontal, then vertical onto the end.
    HorizontalVertical,
    /// `|-`: vertical, then horizontal onto the end.
    VerticalHorizontal,
}

impl RoutePattern {
    pub fn starts_horizontal(self) -> bool {
        matches!(self, RoutePattern::Horizontal | RoutePattern::HorizontalVertical)
    }

    pub fn ends_horizontal(self) -> bool {
        matches!(self, RoutePattern::Horizontal | RoutePattern::VerticalHorizontal)
    }
}

impl FromStr for RoutePattern {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" => Ok(RoutePattern::Horizontal),
            "|" => Ok(RoutePattern::Vertical),
            "-|" => Ok(RoutePattern::HorizontalVertical),
            "|-" => Ok(RoutePattern::VerticalHorizontal),
            other => Err(LayoutError::InvalidRoutePattern(other.to_string())),
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutePattern::Horizontal => "-",
            RoutePattern::Vertical => "|",
            RoutePattern::HorizontalVertical => "-|",
            RoutePattern::VerticalHorizontal => "|-",
        };
        f.write_str(s)
    }
}

/// Layers of a route. With two layers, runs along the pattern's first
/// direction use the first layer and perpendicular runs the second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteLayers {
    Single(Layer),
    Split(Layer, Layer),
}

impl RouteLayers {
    pub fn first(&self) -> &Layer {
        match self {
            RouteLayers::Single(l) | RouteLayers::Split(l, _) => l,
        }
    }

    pub fn second(&self) -> &Layer {
        match self {
            RouteLayers::Single(l) | RouteLayers::Split(_, l) => l,
        }
    }

    fn distinct(&self) -> Vec<&Layer> {
        match self {
            RouteLayers::Split(a, b) if a != b => vec![a, b],
            _ => vec![self.first()],
        }
    }
}

impl From<Layer> for RouteLayers {
    fn from(layer: Layer) -> Self {
        RouteLayers::Single(layer)
    }
}

impl From<&Layer> for RouteLayers {
    fn from(layer: &Layer) -> Self {
        RouteLayers::Single(layer.clone())
    }
}

impl From<(Layer, Layer)> for RouteLayers {
    fn from((a, b): (Layer, Layer)) -> Self {
        RouteLayers::Split(a, b)
    }
}

/// Everything describing one route call.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub start: RoutePoint,
    pub end: RoutePoint,
    pub layers: RouteLayers,
    /// Defaults to the widest minimum width among the route's layers.
    pub width: Option<i64>,
    pub pattern: RoutePattern,
    pub jog_start: i64,
    pub jog_end: i64,
    /// Wire pitches to shift the first run sideways; may be fractional.
    pub track: f64,
    pub track_end: f64,
    pub net: Option<String>,
    pub end_style: EndStyle,
    /// Cut array `(nx, ny)` for the via at the start, overriding sizing.
    pub via_start: Option<(usize, usize)>,
    pub via_end: Option<(usize, usize)>,
}

impl RouteRequest {
    pub fn new(
        start: impl Into<RoutePoint>,
        end: impl Into<RoutePoint>,
        layers: impl Into<RouteLayers>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            layers: layers.into(),
            width: None,
            pattern: RoutePattern::default(),
            jog_start: 0,
            jog_end: 0,
            track: 0.0,
            track_end: 0.0,
            net: None,
            end_style: EndStyle::default(),
            via_start: None,
            via_end: None,
        }
    }

    pub fn pattern(mut self, pattern: RoutePattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Sets the pattern from its string form.
    pub fn how(self, how: &str) -> LayoutResult<Self> {
        Ok(self.pattern(how.parse()?))
    }

    pub fn width(mut self, width: i64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn jog_start(mut self, jog: i64) -> Self {
        self.jog_start = jog;
        self
    }

    pub fn jog_end(mut self, jog: i64) -> Self {
        self.jog_end = jog;
        self
    }

    pub fn track(mut self, track: f64) -> Self {
        self.track = track;
        self
    }

    pub fn track_end(mut self, track: f64) -> Self {
        self.track_end = track;
        self
    }

    pub fn net(mut self, net: &str) -> Self {
        self.net = Some(net.to_string());
        self
    }

    pub fn end_style(mut self, end_style: EndStyle) -> Self {
        self.end_style = end_style;
        self
    }

    pub fn via_start(mut self, nx: usize, ny: usize) -> Self {
        self.via_start = Some((nx, ny));
        self
    }

    pub fn via_end(mut self, nx: usize, ny: usize) -> Self {
        self.via_end = Some((nx, ny));
        self
    }
}

/// What a route drew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResult {
    pub waypoints: Vec<Point>,
    pub segment_layers: Vec<Layer>,
    pub width: i64,
    pub net: Option<String>,
    /// Wire segments, then corner vias, then endpoint vias.
    pub shapes: Vec<ShapeId>,
    /// First waypoint, on the first segment's layer.
    pub start: DerivedPoint,
    /// Last waypoint, on the last segment's layer.
    pub end: DerivedPoint,
}

/// Perpendicular offset of a run placed `track` pitches away from an
/// endpoint whose reference shape spans `clearance` across the run.
pub fn track_offset(track: f64, width: i64, min_spacing: i64, clearance: i64) -> i64 {
    if track == 0.0 {
        return 0;
    }
    let (w, s) = (width as f64, min_spacing as f64);
    let magnitude = clearance as f64 / 2.0 + s + w / 2.0 + (track.abs() - 1.0) * (w + s);
    (magnitude * track.signum()).round() as i64
}

/// Waypoints of `pattern` from `start` to `end`. `start_offset` shifts the
/// first run and `end_offset` the last run sideways.
///
/// Repeated points and points in the middle of a straight run are dropped;
/// a route collapsing to one point comes back as that point twice.
pub fn build_waypoints(
    start: Point,
    end: Point,
    pattern: RoutePattern,
    start_offset: i64,
    end_offset: i64,
) -> Vec<Point> {
    let (s, e) = (start, end);
    let points = match pattern {
        RoutePattern::Horizontal => {
            let y = s.y + start_offset;
            vec![s, Point::new(s.x, y), Point::new(e.x, y), Point::new(e.x, y + end_offset)]
        }
        RoutePattern::Vertical => {
            let x = s.x + start_offset;
            vec![s, Point::new(x, s.y), Point::new(x, e.y), Point::new(x + end_offset, e.y)]
        }
        RoutePattern::HorizontalVertical => {
            let y = s.y + start_offset;
            let x = e.x + end_offset;
            vec![s, Point::new(s.x, y), Point::new(x, y), Point::new(x, e.y), e]
        }
        RoutePattern::VerticalHorizontal => {
            let x = s.x + start_offset;
            let y = e.y + end_offset;
            vec![s, Point::new(x, s.y), Point::new(x, y), Point::new(e.x, y), e]
        }
    };
    simplify(points)
}

fn simplify(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() == Some(&p) {
            continue;
        }
        if let [.., a, b] = out[..] {
            if strictly_between(a, b, p) {
                out.pop();
            }
        }
        out.push(p);
    }
    if let [only] = out[..] {
        out.push(only);
    }
    out
}

/// True when `b` lies strictly inside the straight run from `a` to `c`.
fn strictly_between(a: Point, b: Point, c: Point) -> bool {
    let inside = |p: i64, q: i64, r: i64| (p < q && q < r) || (p > q && q > r);
    (a.x == b.x && b.x == c.x && inside(a.y, b.y, c.y))
        || (a.y == b.y && b.y == c.y && inside(a.x, b.x, c.x))
}

/// Routes wires in a layout according to a rule deck.
pub struct Router<'a> {
    rules: &'a DesignRules,
}

impl<'a> Router<'a> {
    pub fn new(rules: &'a DesignRules) -> Self {
        Self { rules }
    }

    /// Draws `request` into `cell` and checks the connection off `cell`'s
    /// checklist.
    pub fn route(
        &self,
        layout: &mut Layout,
        cell: CellId,
        request: &RouteRequest,
    ) -> LayoutResult<RouteResult> {
        let start = layout.resolve(cell, &request.start)?;
        let end = layout.resolve(cell, &request.end)?;
        let layers = &request.layers;
        let pattern = request.pattern;

        let width = match request.width {
            Some(w) => w,
            None => self.widest(layers, |l| self.rules.min_width(l))?,
        };
        let net = request
            .net
            .clone()
            .or_else(|| start.net.clone())
            .or_else(|| end.net.clone());

        let start_offset = request.jog_start
            + self.track_offset(request.track, layers, width, &start, pattern.starts_horizontal())?;
        let end_offset = request.jog_end
            + self.track_offset(request.track_end, layers, width, &end, pattern.ends_horizontal())?;

        let waypoints = build_waypoints(start.at, end.at, pattern, start_offset, end_offset);
        let segment_layers: Vec<Layer> = waypoints
            .windows(2)
            .map(|w| {
                let horizontal = w[0].y == w[1].y;
                if horizontal == pattern.starts_horizontal() {
                    layers.first().clone()
                } else {
                    layers.second().clone()
                }
            })
            .collect();

        let route = Route::with_segment_layers(
            waypoints.clone(),
            segment_layers.clone(),
            width,
            net.as_deref(),
        )?
        .with_end_style(request.end_style);
        let mut shapes = route.draw(layout, cell);

        for (i, pair) in segment_layers.windows(2).enumerate() {
            if pair[0] != pair[1] {
                for def in self.rules.via_stack(&pair[0], &pair[1])? {
                    let cuts = def.corner_cuts();
                    shapes.extend(draw_via(layout, cell, def, waypoints[i + 1], cuts, net.as_deref()));
                }
            }
        }

        let first_layer = segment_layers.first().unwrap_or(layers.first());
        let last_layer = segment_layers.last().unwrap_or(layers.first());
        shapes.extend(self.endpoint_via(layout, cell, &start, first_layer, request.via_start, net.as_deref())?);
        shapes.extend(self.endpoint_via(layout, cell, &end, last_layer, request.via_end, net.as_deref())?);

        layout.record_connection(cell, &start, &end, net.as_deref());

        log::debug!(
            "{}: routed {} '{}' {} -> {} ({} segments, width {})",
            layout.hierarchy_name(cell),
            net.as_deref().unwrap_or("<unnamed>"),
            pattern,
            start.at,
            end.at,
            segment_layers.len(),
            width
        );

        let endpoint = |at: Point, layer: &Layer, origin: &ResolvedPoint| DerivedPoint {
            at,
            frame: cell,
            layer: Some(layer.clone()),
            net: net.clone(),
            origin: origin.origin.clone(),
        };
        let start_point = endpoint(waypoints[0], first_layer, &start);
        let end_point = endpoint(waypoints[waypoints.len() - 1], last_layer, &end);

        Ok(RouteResult {
            start: start_point,
            end: end_point,
            waypoints,
            segment_layers,
            width,
            net,
            shapes,
        })
    }

    fn widest(
        &self,
        layers: &RouteLayers,
        rule: impl Fn(&Layer) -> LayoutResult<i64>,
    ) -> LayoutResult<i64> {
        layers
            .distinct()
            .into_iter()
            .map(rule)
            .try_fold(0, |acc, v| v.map(|v| acc.max(v)))
    }

    /// Offset for `track` at an endpoint. Only endpoints derived from a ref
    /// reserve clearance for the ref's extent across the run.
    fn track_offset(
        &self,
        track: f64,
        layers: &RouteLayers,
        width: i64,
        point: &ResolvedPoint,
        run_horizontal: bool,
    ) -> LayoutResult<i64> {
        if track == 0.0 {
            return Ok(0);
        }
        let spacing = self.widest(layers, |l| self.rules.min_spacing(l))?;
        let clearance = match (&point.origin, point.bounds) {
            (Some(_), Some(bounds)) => {
                let extent = if run_horizontal {
                    bounds.height()
                } else {
                    bounds.width()
                };
                extent.min(2 * spacing + width)
            }
            _ => 0,
        };
        Ok(track_offset(track, width, spacing, clearance))
    }

    /// Via stack joining an endpoint's own layer to the route, if they
    /// differ and both are routing layers.
    fn endpoint_via(
        &self,
        layout: &mut Layout,
        cell: CellId,
        point: &ResolvedPoint,
        route_layer: &Layer,
        cuts: Option<(usize, usize)>,
        net: Option<&str>,
    ) -> LayoutResult<Vec<ShapeId>> {
        let Some(layer) = &point.layer else {
            return Ok(Vec::new());
        };
        if layer == route_layer {
            return Ok(Vec::new());
        }
        if !self.rules.stack.contains(layer) || !self.rules.stack.contains(route_layer) {
            log::debug!(
                "{}: no via between {} and {} at {}",
                layout.hierarchy_name(cell),
                layer.name,
                route_layer.name,
                point.at
            );
            return Ok(Vec::new());
        }
        let defs = self.rules.via_stack(layer, route_layer)?;
        let Some(&landing) = defs.first() else {
            return Ok(Vec::new());
        };
        // Room on the pad around the endpoint, symmetric so the centred
        // array stays on the pad.
        let room = point.bounds.map(|b| {
            let at = point.at;
            (
                2 * (at.x - b.min.x).min(b.max.x - at.x).max(0),
                2 * (at.y - b.min.y).min(b.max.y - at.y).max(0),
            )
        });
        let count = |def: &ViaDefinition| {
            cuts.unwrap_or_else(|| match room {
                Some((w, h)) => def.max_cuts(
                    w - 2 * def.bottom_enc_adjacent.max(def.top_enc_adjacent),
                    h - 2 * def.bottom_enc.max(def.top_enc),
                ),
                None => (1, 1),
            })
        };
        let center = match point.bounds {
            Some(b) => landing_center(landing, layer, count(landing), point.at, &b),
            None => point.at,
        };
        let mut shapes = Vec::new();
        for def in defs {
            shapes.extend(draw_via(layout, cell, def, center, count(def), net));
        }
        Ok(shapes)
    }
}

/// Centre for the via that lands on `pad`: `at`, pulled inward just enough
/// for the cut array and its enclosure on `pad_layer` to sit inside the pad.
/// Arrays larger than the pad are centred on it.
fn landing_center(
    def: &ViaDefinition,
    pad_layer: &Layer,
    (nx, ny): (usize, usize),
    at: Point,
    pad: &Rect,
) -> Point {
    let (enc_x, enc_y) = if def.bottom_layer == *pad_layer {
        (def.bottom_enc_adjacent, def.bottom_enc)
    } else {
        (def.top_enc_adjacent, def.top_enc)
    };
    let (w, h) = def.array_extent(nx, ny);
    let fit = |c: i64, lo: i64, hi: i64, size: i64| {
        let half = size.div_euclid(2);
        let (min, max) = (lo + half, hi - size + half);
        if min > max {
            (lo + hi).div_euclid(2)
        } else {
            c.clamp(min, max)
        }
    };
    Point::new(
        fit(at.x, pad.min.x, pad.max.x, w + 2 * enc_x),
        fit(at.y, pad.min.y, pad.max.y, h + 2 * enc_y),
    )
}

/// Routes `request` in `cell` with `rules`.
pub fn route(
    layout: &mut Layout,
    rules: &DesignRules,
    cell: CellId,
    request: &RouteRequest,
) -> LayoutResult<RouteResult> {
    Router::new(rules).route(layout, cell, request)
}
