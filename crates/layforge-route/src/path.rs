use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use layforge_core::{CellId, Layer, Layout, LayoutError, LayoutResult, Point, Shape, ShapeId};

/// How a segment treats its end points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndStyle {
    /// Overshoot both ends by half the width, filling corners.
    #[default]
    Extend,
    /// Stop exactly at the waypoints.
    Flush,
}

impl FromStr for EndStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extend" => Ok(EndStyle::Extend),
            "flush" => Ok(EndStyle::Flush),
            other => Err(format!("end style must be 'extend' or 'flush', got '{other}'")),
        }
    }
}

impl fmt::Display for EndStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndStyle::Extend => f.write_str("extend"),
            EndStyle::Flush => f.write_str("flush"),
        }
    }
}

/// A manhattan wire: a centerline through at least two waypoints, drawn as
/// one rectangle per segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    points: Vec<Point>,
    /// One layer per segment.
    layers: Vec<Layer>,
    width: i64,
    net: Option<String>,
    end_style: EndStyle,
}

impl Route {
    /// A single-layer route.
    pub fn new(points: Vec<Point>, layer: Layer, width: i64, net: Option<&str>) -> LayoutResult<Self> {
        let segments = points.len().saturating_sub(1);
        Self::with_segment_layers(points, vec![layer; segments], width, net)
    }

    /// A route whose `i`-th segment is drawn on `layers[i]`.
    pub fn with_segment_layers(
        points: Vec<Point>,
        layers: Vec<Layer>,
        width: i64,
        net: Option<&str>,
    ) -> LayoutResult<Self> {
        if points.len() < 2 || layers.len() + 1 != points.len() {
            return Err(LayoutError::TooFewWaypoints(points.len()));
        }
        if let Some(w) = points.windows(2).find(|w| w[0].x != w[1].x && w[0].y != w[1].y) {
            return Err(LayoutError::DiagonalSegment {
                from: w[0],
                to: w[1],
            });
        }
        Ok(Self {
            points,
            layers,
            width,
            net: net.map(str::to_string),
            end_style: EndStyle::default(),
        })
    }

    pub fn with_end_style(mut self, end_style: EndStyle) -> Self {
        self.end_style = end_style;
        self
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn segment_layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn net(&self) -> Option<&str> {
        self.net.as_deref()
    }

    pub fn end_style(&self) -> EndStyle {
        self.end_style
    }

    /// Total centerline length.
    pub fn length(&self) -> i64 {
        self.points.windows(2).map(|w| w[0].manhattan_to(&w[1])).sum()
    }

    /// The rectangle of every segment, in order.
    pub fn shapes(&self) -> Vec<Shape> {
        let lo = |c: i64| c - self.width / 2;
        let ext = match self.end_style {
            EndStyle::Extend => self.width / 2,
            EndStyle::Flush => 0,
        };
        self.points
            .windows(2)
            .zip(&self.layers)
            .map(|(w, layer)| {
                let (a, b) = (w[0], w[1]);
                let net = self.net.as_deref();
                if a.y == b.y {
                    let y0 = lo(a.y);
                    Shape::rect(
                        layer.clone(),
                        a.x.min(b.x) - ext,
                        y0,
                        a.x.max(b.x) + ext,
                        y0 + self.width,
                        net,
                    )
                } else {
                    let x0 = lo(a.x);
                    Shape::rect(
                        layer.clone(),
                        x0,
                        a.y.min(b.y) - ext,
                        x0 + self.width,
                        a.y.max(b.y) + ext,
                        net,
                    )
                }
            })
            .collect()
    }

    /// Draws every segment into `cell`.
    pub fn draw(&self, layout: &mut Layout, cell: CellId) -> Vec<ShapeId> {
        self.shapes()
            .into_iter()
            .map(|shape| layout.add_shape(cell, shape))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layforge_core::Rect;

    fn m1() -> Layer {
        Layer::conductor("MET1")
    }

    #[test]
    fn test_extend_overshoots_by_half_width() {
        let route = Route::new(
            vec![Point::new(0, 0), Point::new(100, 0), Point::new(100, 50)],
            m1(),
            10,
            Some("a"),
        )
        .unwrap();
        let bounds: Vec<Rect> = route.shapes().iter().map(Shape::bounds).collect();
        assert_eq!(bounds, vec![Rect::new(-5, -5, 105, 5), Rect::new(95, -5, 105, 55)]);
        assert_eq!(route.length(), 150);
    }

    #[test]
    fn test_flush_stops_at_waypoints() {
        let route = Route::new(vec![Point::new(0, 0), Point::new(0, 80)], m1(), 20, None)
            .unwrap()
            .with_end_style(EndStyle::Flush);
        assert_eq!(route.shapes()[0].bounds(), Rect::new(-10, 0, 10, 80));
        assert_eq!("flush".parse::<EndStyle>(), Ok(EndStyle::Flush));
        assert!("round".parse::<EndStyle>().is_err());
    }

    #[test]
    fn test_rejects_bad_waypoints() {
        assert_eq!(
            Route::new(vec![Point::new(0, 0)], m1(), 10, None),
            Err(LayoutError::TooFewWaypoints(1))
        );
        assert_eq!(
            Route::new(vec![Point::new(0, 0), Point::new(10, 10)], m1(), 10, None),
            Err(LayoutError::DiagonalSegment {
                from: Point::new(0, 0),
                to: Point::new(10, 10)
            })
        );
    }
}
