//! Geometry derived from a diagram revision.
//!
//! Nothing here is stored on the model: every function is a pure recomputation over the
//! current [`Diagram`], re-run per render. Ids that do not resolve are skipped, never
//! reported as errors.

mod gates;
mod layers;
mod routing;
mod zones;

pub use gates::{derive_gates, Gate, GateDirection};
pub use layers::{blueprint, Blueprint, Connector, LayerBox};
pub use routing::{route, route_edges, Axis, EdgePath, RoutedEdge};
pub use zones::{content_bounds, group_regions, padded_bounds, zone_bounds, zone_boxes, GroupRegion, ZoneBox};

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::{Diagram, LayoutMode, Point};

/// Axis-aligned rectangle in model space.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn from_corners(min: Point, max: Point) -> Self {
        Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.top() && p.y <= self.bottom()
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_corners(
            Point::new(self.left().min(other.left()), self.top().min(other.top())),
            Point::new(self.right().max(other.right()), self.bottom().max(other.bottom())),
        )
    }

    pub fn inflate(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2.0 * dx,
            height: self.height + 2.0 * dy,
        }
    }

    /// Square box of half-side `r` around a centre point.
    pub fn around(center: Point, r: f64) -> Rect {
        Rect {
            x: center.x - r,
            y: center.y - r,
            width: 2.0 * r,
            height: 2.0 * r,
        }
    }
}

/// Identifies a draggable node grouping within one revision.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", tag = "kind", content = "index")]
pub enum GroupRef {
    Phase(usize),
    Ops,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub zones: Vec<ZoneBox>,
    pub groups: Vec<GroupRegion>,
    pub edges: Vec<RoutedEdge>,
    pub gates: Vec<Gate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<Blueprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Rect>,
}

impl Layout {
    pub fn compute(diagram: &Diagram, config: &LayoutConfig) -> Self {
        let blueprint = match diagram.layout_mode() {
            LayoutMode::Blueprint => Some(blueprint(diagram, config)),
            LayoutMode::Zones => None,
        };
        Self {
            zones: zone_boxes(diagram, config),
            groups: group_regions(diagram, config),
            edges: route_edges(diagram, config),
            gates: derive_gates(diagram, config),
            blueprint,
            content: content_bounds(diagram, config),
        }
    }
}
