//! The sanctioned mutations of a [`Diagram`].
//!
//! Each operation takes the current revision by reference and returns a new one, leaving
//! the input untouched. Interaction, the editor and the tool server all go through here.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use crate::config::PlacementGrid;
use crate::layout::Rect;
use crate::{
    next_edge_id, next_node_id, Diagram, Edge, EdgeType, Node, OpError, Point, Security, Zone,
};

/// Description of a node to add. Without an explicit `id` one is generated.
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Explicit id, e.g. "ing_pubsub". Default: the next free "node-N".
    #[serde(default)]
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// Icon reference or product name used for icon lookup
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Zone: "sources", "cloud", "consumers" or "connectivity"
    pub zone: Zone,
    #[serde(default)]
    pub sub_zone: Option<String>,
    /// Preferred X position. Default: the first free grid cell.
    #[serde(default)]
    pub x: Option<f64>,
    /// Preferred Y position. Default: the first free grid cell.
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, zone: Zone) -> Self {
        Self {
            id: None,
            name: name.into(),
            icon: None,
            subtitle: None,
            zone,
            sub_zone: None,
            x: None,
            y: None,
            details: BTreeMap::new(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    fn hint(&self) -> Option<Point> {
        Some(Point::new(self.x?, self.y?))
    }
}

/// Shallow patch for a node. Absent fields are left alone; an empty string clears an
/// optional text field.
#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub zone: Option<Zone>,
    #[serde(default)]
    pub sub_zone: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    /// Replaces the whole details map
    #[serde(default)]
    pub details: Option<BTreeMap<String, String>>,
}

/// Description of an edge to add.
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    /// Explicit id. Default: the next free "eN".
    #[serde(default)]
    pub id: Option<String>,
    /// Source node id
    pub from: String,
    /// Target node id
    pub to: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Pipeline position; 0 = unordered. Default: one past the highest data step for
    /// data edges, 0 otherwise.
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub security: Option<Security>,
    /// "data", "control", "observe", "alert" or "identity"
    #[serde(default)]
    pub edge_type: Option<EdgeType>,
}

impl EdgeSpec {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: to.into(),
            label: None,
            subtitle: None,
            step: None,
            security: None,
            edge_type: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EdgePatch {
    /// New source node id; crossesBoundary is recomputed
    #[serde(default)]
    pub from: Option<String>,
    /// New target node id; crossesBoundary is recomputed
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub security: Option<Security>,
    #[serde(default)]
    pub edge_type: Option<EdgeType>,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn is_free(diagram: &Diagram, at: Point, r: f64, gap: f64) -> bool {
    let candidate = Rect::around(at, r);
    diagram
        .nodes
        .iter()
        .all(|n| !Rect::around(n.position(), r).inflate(gap, gap).intersects(&candidate))
}

/// Where a new node goes: the hint itself when free, else the first free grid cell
/// scanning row-major from the hint's cell (or the grid origin).
pub fn place(diagram: &Diagram, hint: Option<Point>, grid: &PlacementGrid, r: f64) -> Point {
    if let Some(at) = hint {
        if is_free(diagram, at, r, grid.gap) {
            return at;
        }
    }
    let mut index = hint.map(|h| grid.cell_index(h)).unwrap_or(0);
    // Rows are unbounded and the node set is finite, so a free cell always exists.
    loop {
        let at = grid.cell_position(index);
        if is_free(diagram, at, r, grid.gap) {
            return at;
        }
        // Wraps back to the first row after the last addressable cell.
        index = index.wrapping_add(1);
    }
}

/// Add a node, returning the new revision and the node's id.
pub fn add_node(
    diagram: &Diagram,
    spec: NodeSpec,
    grid: &PlacementGrid,
    r: f64,
) -> Result<(Diagram, String), OpError> {
    let id = match spec.id.clone() {
        Some(id) if diagram.node(&id).is_some() => return Err(OpError::DuplicateNode(id)),
        Some(id) => id,
        None => next_node_id(diagram),
    };
    let at = place(diagram, spec.hint(), grid, r);

    let mut next = diagram.clone();
    next.nodes.push(Node {
        id: id.clone(),
        name: spec.name,
        icon: spec.icon,
        subtitle: spec.subtitle,
        zone: spec.zone,
        sub_zone: spec.sub_zone,
        x: at.x,
        y: at.y,
        details: spec.details,
    });
    tracing::debug!(node = %id, x = at.x, y = at.y, "added node");
    Ok((next, id))
}

fn refresh_boundary_flags(diagram: &mut Diagram, touching: &str) {
    let zones: BTreeMap<String, Zone> =
        diagram.nodes.iter().map(|n| (n.id.clone(), n.zone)).collect();
    for e in diagram.edges.iter_mut().filter(|e| e.from == touching || e.to == touching) {
        if let (Some(a), Some(b)) = (zones.get(&e.from), zones.get(&e.to)) {
            e.crosses_boundary = a != b;
        }
    }
}

pub fn update_node(diagram: &Diagram, id: &str, patch: NodePatch) -> Result<Diagram, OpError> {
    let mut next = diagram.clone();
    let node = next
        .nodes
        .iter_mut()
        .find(|n| n.id == id)
        .ok_or_else(|| OpError::NodeNotFound(id.to_string()))?;

    if let Some(name) = patch.name {
        node.name = name;
    }
    if let Some(icon) = patch.icon {
        node.icon = non_empty(icon);
    }
    if let Some(subtitle) = patch.subtitle {
        node.subtitle = non_empty(subtitle);
    }
    if let Some(sub_zone) = patch.sub_zone {
        node.sub_zone = non_empty(sub_zone);
    }
    if let Some(x) = patch.x {
        node.x = x;
    }
    if let Some(y) = patch.y {
        node.y = y;
    }
    if let Some(details) = patch.details {
        node.details = details;
    }
    let rezoned = match patch.zone {
        Some(zone) if zone != node.zone => {
            node.zone = zone;
            true
        }
        _ => false,
    };
    if rezoned {
        refresh_boundary_flags(&mut next, id);
    }

    tracing::debug!(node = %id, rezoned, "updated node");
    Ok(next)
}

/// Remove a node, every edge touching it, and its id from every phase and the ops group.
pub fn delete_node(diagram: &Diagram, id: &str) -> Result<Diagram, OpError> {
    if diagram.node(id).is_none() {
        return Err(OpError::NodeNotFound(id.to_string()));
    }
    let mut next = diagram.clone();
    next.nodes.retain(|n| n.id != id);
    let before = next.edges.len();
    next.edges.retain(|e| e.from != id && e.to != id);
    for phase in &mut next.phases {
        phase.node_ids.retain(|n| n != id);
    }
    if let Some(ops) = &mut next.ops_group {
        ops.node_ids.retain(|n| n != id);
    }
    tracing::debug!(node = %id, edges_removed = before - next.edges.len(), "deleted node");
    Ok(next)
}

/// Add an edge, returning the new revision and the edge's id. Both endpoints must exist.
pub fn add_edge(diagram: &Diagram, spec: EdgeSpec) -> Result<(Diagram, String), OpError> {
    let crosses_boundary = boundary_between(diagram, &spec.from, &spec.to)?;
    let id = match spec.id {
        Some(id) if diagram.edge(&id).is_some() => return Err(OpError::DuplicateEdge(id)),
        Some(id) => id,
        None => next_edge_id(diagram),
    };
    let pipeline = matches!(spec.edge_type, None | Some(EdgeType::Data));
    let step = spec.step.unwrap_or(if pipeline {
        diagram.max_pipeline_step().saturating_add(1)
    } else {
        0
    });

    let mut next = diagram.clone();
    next.edges.push(Edge {
        id: id.clone(),
        from: spec.from,
        to: spec.to,
        label: spec.label,
        subtitle: spec.subtitle,
        step,
        security: spec.security,
        crosses_boundary,
        edge_type: spec.edge_type,
    });
    tracing::debug!(edge = %id, step, crosses_boundary, "added edge");
    Ok((next, id))
}

/// Connect-mode edge: a data edge numbered after the current pipeline.
pub fn connect(diagram: &Diagram, from: &str, to: &str) -> Result<(Diagram, String), OpError> {
    let mut spec = EdgeSpec::new(from, to);
    spec.edge_type = Some(EdgeType::Data);
    add_edge(diagram, spec)
}

fn boundary_between(diagram: &Diagram, from: &str, to: &str) -> Result<bool, OpError> {
    let a = diagram
        .node(from)
        .ok_or_else(|| OpError::NodeNotFound(from.to_string()))?;
    let b = diagram
        .node(to)
        .ok_or_else(|| OpError::NodeNotFound(to.to_string()))?;
    Ok(a.zone != b.zone)
}

pub fn update_edge(diagram: &Diagram, id: &str, patch: EdgePatch) -> Result<Diagram, OpError> {
    let current = diagram
        .edge(id)
        .ok_or_else(|| OpError::EdgeNotFound(id.to_string()))?;
    let from = patch.from.unwrap_or_else(|| current.from.clone());
    let to = patch.to.unwrap_or_else(|| current.to.clone());
    let repointed = from != current.from || to != current.to;
    let crosses_boundary = if repointed {
        boundary_between(diagram, &from, &to)?
    } else {
        current.crosses_boundary
    };

    let mut next = diagram.clone();
    let Some(edge) = next.edges.iter_mut().find(|e| e.id == id) else {
        return Err(OpError::EdgeNotFound(id.to_string()));
    };
    edge.from = from;
    edge.to = to;
    edge.crosses_boundary = crosses_boundary;
    if let Some(label) = patch.label {
        edge.label = non_empty(label);
    }
    if let Some(subtitle) = patch.subtitle {
        edge.subtitle = non_empty(subtitle);
    }
    if let Some(step) = patch.step {
        edge.step = step;
    }
    if let Some(security) = patch.security {
        edge.security = Some(security);
    }
    if let Some(edge_type) = patch.edge_type {
        edge.edge_type = Some(edge_type);
    }

    tracing::debug!(edge = %id, repointed, "updated edge");
    Ok(next)
}

pub fn delete_edge(diagram: &Diagram, id: &str) -> Result<Diagram, OpError> {
    if diagram.edge(id).is_none() {
        return Err(OpError::EdgeNotFound(id.to_string()));
    }
    let mut next = diagram.clone();
    next.edges.retain(|e| e.id != id);
    tracing::debug!(edge = %id, "deleted edge");
    Ok(next)
}

/// Move nodes to absolute positions, as at the end of a drag. Unknown ids are skipped.
pub fn set_positions(diagram: &Diagram, positions: &[(String, Point)]) -> Diagram {
    let mut next = diagram.clone();
    let known: HashSet<&str> = diagram.nodes.iter().map(|n| n.id.as_str()).collect();
    for (id, at) in positions {
        if !known.contains(id.as_str()) {
            tracing::trace!(node = %id, "skipping move of unresolved node");
            continue;
        }
        if let Some(node) = next.nodes.iter_mut().find(|n| &n.id == id) {
            node.x = at.x;
            node.y = at.y;
        }
    }
    next
}
