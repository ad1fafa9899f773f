use serde::Serialize;

use crate::config::LayoutConfig;
use crate::{Diagram, Point};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Orthogonal polyline for one edge: two points when straight, four (one jog) otherwise.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EdgePath {
    pub axis: Axis,
    pub points: Vec<Point>,
    /// Where the step badge or label is drawn.
    pub midpoint: Point,
}

impl EdgePath {
    pub fn is_straight(&self) -> bool {
        self.points.len() == 2
    }

    /// Shortest distance from `p` to any segment of the path.
    pub fn distance_to(&self, p: Point) -> f64 {
        self.points
            .windows(2)
            .map(|seg| segment_distance(p, seg[0], seg[1]))
            .fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutedEdge {
    pub edge_id: String,
    pub path: EdgePath,
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Route an edge between two node centres.
///
/// The dominant axis is horizontal when `|dx| > ratio * |dy|`. Along it the path is
/// shortened by the node half-extent at both ends so it meets the card border. A
/// cross-axis offset under the jog threshold gives a straight segment; anything larger
/// gets a single orthogonal jog halfway along the dominant axis.
pub fn route(from: Point, to: Point, config: &LayoutConfig) -> EdgePath {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let r = config.node_half_extent;

    if dx.abs() > config.horizontal_ratio * dy.abs() {
        let sx = dx.signum();
        let start = Point::new(from.x + sx * r, from.y);
        let end = Point::new(to.x - sx * r, to.y);
        if dy.abs() < config.jog_threshold {
            return EdgePath {
                axis: Axis::Horizontal,
                points: vec![start, end],
                midpoint: midpoint(start, end),
            };
        }
        let mid_x = (start.x + end.x) / 2.0;
        let (a, b) = (Point::new(mid_x, start.y), Point::new(mid_x, end.y));
        EdgePath {
            axis: Axis::Horizontal,
            points: vec![start, a, b, end],
            midpoint: midpoint(a, b),
        }
    } else {
        let sy = if dy >= 0.0 { 1.0 } else { -1.0 };
        let start = Point::new(from.x, from.y + sy * r);
        let end = Point::new(to.x, to.y - sy * r);
        if dx.abs() < config.jog_threshold {
            return EdgePath {
                axis: Axis::Vertical,
                points: vec![start, end],
                midpoint: midpoint(start, end),
            };
        }
        let mid_y = (start.y + end.y) / 2.0;
        let (a, b) = (Point::new(start.x, mid_y), Point::new(end.x, mid_y));
        EdgePath {
            axis: Axis::Vertical,
            points: vec![start, a, b, end],
            midpoint: midpoint(a, b),
        }
    }
}

/// Paths for every edge whose endpoints both resolve.
pub fn route_edges(diagram: &Diagram, config: &LayoutConfig) -> Vec<RoutedEdge> {
    let nodes = diagram.node_map();
    diagram
        .edges
        .iter()
        .filter_map(|e| {
            let (Some(from), Some(to)) = (nodes.get(e.from.as_str()), nodes.get(e.to.as_str()))
            else {
                tracing::trace!(edge = %e.id, "skipping edge with unresolved endpoint");
                return None;
            };
            Some(RoutedEdge {
                edge_id: e.id.clone(),
                path: route(from.position(), to.position(), config),
            })
        })
        .collect()
}
