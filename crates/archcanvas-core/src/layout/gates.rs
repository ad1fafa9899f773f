use serde::Serialize;

use super::zone_bounds;
use crate::config::LayoutConfig;
use crate::{Diagram, Point, Security, Zone};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GateDirection {
    /// sources → cloud, drawn on the cloud box's left edge.
    In,
    /// cloud → consumers, drawn on the cloud box's right edge.
    Out,
}

/// Security checkpoint where one edge crosses the cloud boundary.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gate {
    pub edge_id: String,
    pub direction: GateDirection,
    pub position: Point,
    pub security: Security,
}

/// One gate per secured, boundary-crossing edge between sources↔cloud or cloud↔consumers.
/// The gate sits on the cloud box edge at the source node's y.
pub fn derive_gates(diagram: &Diagram, config: &LayoutConfig) -> Vec<Gate> {
    let Some(cloud) = zone_bounds(diagram, Zone::Cloud, config) else {
        return Vec::new();
    };
    let nodes = diagram.node_map();

    diagram
        .edges
        .iter()
        .filter(|e| e.crosses_boundary)
        .filter_map(|e| {
            let security = e.security.as_ref()?;
            let (Some(from), Some(to)) = (nodes.get(e.from.as_str()), nodes.get(e.to.as_str()))
            else {
                tracing::trace!(edge = %e.id, "skipping gate for unresolved edge");
                return None;
            };
            let (direction, x) = match (from.zone, to.zone) {
                (Zone::Sources, Zone::Cloud) => (GateDirection::In, cloud.left()),
                (Zone::Cloud, Zone::Consumers) => (GateDirection::Out, cloud.right()),
                _ => return None,
            };
            Some(Gate {
                edge_id: e.id.clone(),
                direction,
                position: Point::new(x, from.y),
                security: security.clone(),
            })
        })
        .collect()
}
