pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod icons;
pub mod interaction;
pub mod layout;
pub mod ops;
pub mod storage;
pub mod viewport;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub use error::{ConfigError, OpError, StorageError};

// --- Types (wire format shared with the generator and the store) ---

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Sources,
    Cloud,
    Consumers,
    Connectivity,
}

impl Zone {
    /// Rendering order: outside-left, connectivity, the cloud box, then consumers.
    pub const ALL: [Zone; 4] = [Zone::Sources, Zone::Connectivity, Zone::Cloud, Zone::Consumers];

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Sources => "sources",
            Zone::Cloud => "cloud",
            Zone::Consumers => "consumers",
            Zone::Connectivity => "connectivity",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Zone::Sources => "SOURCES",
            Zone::Cloud => "CLOUD PLATFORM",
            Zone::Consumers => "CONSUMERS",
            Zone::Connectivity => "CONNECTIVITY & IDENTITY",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Data,
    Control,
    Observe,
    Alert,
    Identity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Zones,
    Blueprint,
}

/// A model-space (or screen-space, depending on context) coordinate pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub zone: Zone,
    /// Fine-grained placement hint from the generator (e.g. "ingestion"). Not used by layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_zone: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl Node {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Security attributes of a connection. Unknown fields are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Security {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transport: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub classification: String,
    #[serde(default)]
    pub private: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// 0 means unordered / parallel.
    #[serde(default)]
    pub step: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Security>,
    #[serde(default)]
    pub crosses_boundary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<EdgeType>,
}

impl Edge {
    /// Data edges and edges without a type take part in step numbering.
    pub fn is_pipeline(&self) -> bool {
        matches!(self.edge_type, None | Some(EdgeType::Data))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpsGroup {
    pub name: String,
    #[serde(default)]
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StrideCategory {
    #[serde(alias = "S")]
    Spoofing,
    #[serde(alias = "T")]
    Tampering,
    #[serde(alias = "R")]
    Repudiation,
    #[serde(alias = "I")]
    InformationDisclosure,
    #[serde(alias = "D")]
    DenialOfService,
    #[serde(alias = "E")]
    ElevationOfPrivilege,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Read-only annotation attached to a node or edge for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Threat {
    pub id: String,
    /// Node or edge id.
    pub target: String,
    pub stride: StrideCategory,
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub mitigation: String,
}

/// One revision of a diagram. Mutate only through [`ops`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutMode>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub threats: Vec<Threat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops_group: Option<OpsGroup>,
}

/// A referential problem found by [`Diagram::validate`]. Layout skips these silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    DuplicateNodeId(String),
    DuplicateEdgeId(String),
    DanglingEndpoint { edge: String, node: String },
    DanglingMember { group: String, node: String },
    StaleBoundaryFlag { edge: String },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::DuplicateNodeId(id) => write!(f, "duplicate node id '{id}'"),
            Issue::DuplicateEdgeId(id) => write!(f, "duplicate edge id '{id}'"),
            Issue::DanglingEndpoint { edge, node } => {
                write!(f, "edge '{edge}' references missing node '{node}'")
            }
            Issue::DanglingMember { group, node } => {
                write!(f, "group '{group}' references missing node '{node}'")
            }
            Issue::StaleBoundaryFlag { edge } => {
                write!(f, "edge '{edge}' has a stale crossesBoundary flag")
            }
        }
    }
}

impl Diagram {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            layout: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            threats: Vec::new(),
            phases: Vec::new(),
            ops_group: None,
        }
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.layout.unwrap_or_default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Id-keyed view of the node arena, for geometry passes that resolve many edges.
    pub fn node_map(&self) -> HashMap<&str, &Node> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    /// Whether an edge between these two nodes crosses a trust boundary.
    /// `None` when either endpoint does not resolve.
    pub fn crosses_boundary(&self, from: &str, to: &str) -> Option<bool> {
        let from = self.node(from)?;
        let to = self.node(to)?;
        Some(from.zone != to.zone)
    }

    /// Ordered processing pipeline: data/untyped edges with a non-zero step, ascending.
    pub fn pipeline_steps(&self) -> Vec<&Edge> {
        let mut steps: Vec<&Edge> = self
            .edges
            .iter()
            .filter(|e| e.is_pipeline() && e.step > 0)
            .collect();
        steps.sort_by_key(|e| e.step);
        steps
    }

    /// Highest step among pipeline edges, 0 when there are none.
    pub fn max_pipeline_step(&self) -> u32 {
        self.edges
            .iter()
            .filter(|e| e.is_pipeline())
            .map(|e| e.step)
            .max()
            .unwrap_or(0)
    }

    pub fn threats_for<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Threat> + 'a {
        self.threats.iter().filter(move |t| t.target == target)
    }

    /// Names of every node-id grouping (phases first, then the ops group) containing `node_id`.
    pub fn groups_containing(&self, node_id: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .phases
            .iter()
            .filter(|p| p.node_ids.iter().any(|id| id == node_id))
            .map(|p| p.name.as_str())
            .collect();
        if let Some(ops) = &self.ops_group {
            if ops.node_ids.iter().any(|id| id == node_id) {
                names.push(ops.name.as_str());
            }
        }
        names
    }

    /// Report referential problems. Never fails; rendering tolerates every issue listed.
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        let mut node_ids = HashSet::new();
        for n in &self.nodes {
            if !node_ids.insert(n.id.as_str()) {
                issues.push(Issue::DuplicateNodeId(n.id.clone()));
            }
        }

        let mut edge_ids = HashSet::new();
        for e in &self.edges {
            if !edge_ids.insert(e.id.as_str()) {
                issues.push(Issue::DuplicateEdgeId(e.id.clone()));
            }
            let mut resolved = true;
            for endpoint in [&e.from, &e.to] {
                if !node_ids.contains(endpoint.as_str()) {
                    resolved = false;
                    issues.push(Issue::DanglingEndpoint {
                        edge: e.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
            if resolved && self.crosses_boundary(&e.from, &e.to) != Some(e.crosses_boundary) {
                issues.push(Issue::StaleBoundaryFlag { edge: e.id.clone() });
            }
        }

        let groups = self
            .phases
            .iter()
            .map(|p| (p.name.as_str(), &p.node_ids))
            .chain(self.ops_group.iter().map(|g| (g.name.as_str(), &g.node_ids)));
        for (name, members) in groups {
            for id in members {
                if !node_ids.contains(id.as_str()) {
                    issues.push(Issue::DanglingMember {
                        group: name.to_string(),
                        node: id.clone(),
                    });
                }
            }
        }

        issues
    }
}

// --- Id generation ---

fn max_suffix<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str) -> u64 {
    ids.filter_map(|id| id.strip_prefix(prefix).and_then(|s| s.parse::<u64>().ok()))
        .max()
        .unwrap_or(0)
}

/// Generate the next node ID by scanning existing nodes: "node-{N}" with N incrementing.
pub fn next_node_id(diagram: &Diagram) -> String {
    let max = max_suffix(diagram.nodes.iter().map(|n| n.id.as_str()), "node-");
    format!("node-{}", max + 1)
}

/// Generate the next edge ID, following the generator's "e{N}" pattern.
pub fn next_edge_id(diagram: &Diagram) -> String {
    let max = max_suffix(diagram.edges.iter().map(|e| e.id.as_str()), "e");
    format!("e{}", max + 1)
}
