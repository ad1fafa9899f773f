use archcanvas_core::{Diagram, Edge, EdgeType, Node};
use std::collections::HashMap;

fn opt_str(s: &Option<String>) -> &str {
    s.as_deref().unwrap_or("none")
}

fn edge_type_str(t: Option<EdgeType>) -> &'static str {
    match t {
        Some(EdgeType::Data) => "data",
        Some(EdgeType::Control) => "control",
        Some(EdgeType::Observe) => "observe",
        Some(EdgeType::Alert) => "alert",
        Some(EdgeType::Identity) => "identity",
        None => "untyped",
    }
}

fn describe_node(n: &Node) -> String {
    let mut detail = format!("  - {} \"{}\" ({})", n.id, n.name, n.zone.as_str());
    if let Some(sub) = &n.subtitle {
        detail.push_str(&format!(", subtitle=\"{}\"", sub));
    }
    if let Some(icon) = &n.icon {
        detail.push_str(&format!(", icon={}", icon));
    }
    detail
}

fn describe_edge(e: &Edge) -> String {
    let mut detail = format!(
        "  - {} {} -> {} ({}",
        e.id,
        e.from,
        e.to,
        edge_type_str(e.edge_type)
    );
    if e.step > 0 {
        detail.push_str(&format!(", step {}", e.step));
    }
    detail.push(')');
    if let Some(label) = &e.label {
        detail.push_str(&format!(" \"{}\"", label));
    }
    detail
}

fn node_changes(base: &Node, curr: &Node) -> Vec<String> {
    let mut changes = Vec::new();
    if base.name != curr.name {
        changes.push(format!("name \"{}\" -> \"{}\"", base.name, curr.name));
    }
    if base.zone != curr.zone {
        changes.push(format!("zone {} -> {}", base.zone.as_str(), curr.zone.as_str()));
    }
    if base.subtitle != curr.subtitle {
        changes.push(format!(
            "subtitle {} -> {}",
            opt_str(&base.subtitle),
            opt_str(&curr.subtitle)
        ));
    }
    if base.icon != curr.icon {
        changes.push(format!("icon {} -> {}", opt_str(&base.icon), opt_str(&curr.icon)));
    }
    if base.sub_zone != curr.sub_zone {
        changes.push(format!(
            "subZone {} -> {}",
            opt_str(&base.sub_zone),
            opt_str(&curr.sub_zone)
        ));
    }
    if base.x != curr.x || base.y != curr.y {
        changes.push(format!(
            "moved ({}, {}) -> ({}, {})",
            base.x, base.y, curr.x, curr.y
        ));
    }
    if base.details != curr.details {
        changes.push("details changed".to_string());
    }
    changes
}

fn edge_changes(base: &Edge, curr: &Edge) -> Vec<String> {
    let mut changes = Vec::new();
    if base.from != curr.from || base.to != curr.to {
        changes.push(format!(
            "endpoints {} -> {} now {} -> {}",
            base.from, base.to, curr.from, curr.to
        ));
    }
    if base.label != curr.label {
        changes.push(format!("label {} -> {}", opt_str(&base.label), opt_str(&curr.label)));
    }
    if base.edge_type != curr.edge_type {
        changes.push(format!(
            "type {} -> {}",
            edge_type_str(base.edge_type),
            edge_type_str(curr.edge_type)
        ));
    }
    if base.step != curr.step {
        changes.push(format!("step {} -> {}", base.step, curr.step));
    }
    if base.security != curr.security {
        changes.push("security changed".to_string());
    }
    if base.crosses_boundary != curr.crosses_boundary {
        changes.push(format!(
            "crossesBoundary {} -> {}",
            base.crosses_boundary, curr.crosses_boundary
        ));
    }
    changes
}

/// Human-readable report of what changed between two revisions of a diagram.
pub fn compute_diff(baseline: &Diagram, current: &Diagram) -> String {
    let base_nodes: HashMap<&str, &Node> =
        baseline.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let curr_nodes: HashMap<&str, &Node> =
        current.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let base_edges: HashMap<&str, &Edge> =
        baseline.edges.iter().map(|e| (e.id.as_str(), e)).collect();
    let curr_edges: HashMap<&str, &Edge> =
        current.edges.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut sections: Vec<String> = Vec::new();

    if baseline.title != current.title {
        sections.push(format!(
            "Title changed: \"{}\" -> \"{}\"",
            baseline.title, current.title
        ));
    }
    if baseline.layout_mode() != current.layout_mode() {
        sections.push(format!(
            "Layout changed: {:?} -> {:?}",
            baseline.layout_mode(),
            current.layout_mode()
        ));
    }

    // --- Nodes ---
    let added: Vec<_> = current
        .nodes
        .iter()
        .filter(|n| !base_nodes.contains_key(n.id.as_str()))
        .collect();
    if !added.is_empty() {
        let mut lines = vec![format!("Nodes added ({}):", added.len())];
        lines.extend(added.iter().map(|n| describe_node(n)));
        sections.push(lines.join("\n"));
    }

    let removed: Vec<_> = baseline
        .nodes
        .iter()
        .filter(|n| !curr_nodes.contains_key(n.id.as_str()))
        .collect();
    if !removed.is_empty() {
        let mut lines = vec![format!("Nodes removed ({}):", removed.len())];
        lines.extend(removed.iter().map(|n| describe_node(n)));
        sections.push(lines.join("\n"));
    }

    let modified: Vec<String> = current
        .nodes
        .iter()
        .filter_map(|curr| {
            let base = base_nodes.get(curr.id.as_str())?;
            let changes = node_changes(base, curr);
            (!changes.is_empty()).then(|| format!("  - {}: {}", curr.id, changes.join(", ")))
        })
        .collect();
    if !modified.is_empty() {
        let mut lines = vec![format!("Nodes modified ({}):", modified.len())];
        lines.extend(modified);
        sections.push(lines.join("\n"));
    }

    // --- Edges ---
    let added: Vec<_> = current
        .edges
        .iter()
        .filter(|e| !base_edges.contains_key(e.id.as_str()))
        .collect();
    if !added.is_empty() {
        let mut lines = vec![format!("Edges added ({}):", added.len())];
        lines.extend(added.iter().map(|e| describe_edge(e)));
        sections.push(lines.join("\n"));
    }

    let removed: Vec<_> = baseline
        .edges
        .iter()
        .filter(|e| !curr_edges.contains_key(e.id.as_str()))
        .collect();
    if !removed.is_empty() {
        let mut lines = vec![format!("Edges removed ({}):", removed.len())];
        lines.extend(removed.iter().map(|e| describe_edge(e)));
        sections.push(lines.join("\n"));
    }

    let modified: Vec<String> = current
        .edges
        .iter()
        .filter_map(|curr| {
            let base = base_edges.get(curr.id.as_str())?;
            let changes = edge_changes(base, curr);
            (!changes.is_empty()).then(|| format!("  - {}: {}", curr.id, changes.join(", ")))
        })
        .collect();
    if !modified.is_empty() {
        let mut lines = vec![format!("Edges modified ({}):", modified.len())];
        lines.extend(modified);
        sections.push(lines.join("\n"));
    }

    // --- Groups and annotations ---
    if baseline.phases != current.phases {
        sections.push(format!(
            "Phases changed ({} -> {})",
            baseline.phases.len(),
            current.phases.len()
        ));
    }
    if baseline.ops_group != current.ops_group {
        sections.push("Ops group changed".to_string());
    }
    if baseline.threats != current.threats {
        sections.push(format!(
            "Threats changed ({} -> {})",
            baseline.threats.len(),
            current.threats.len()
        ));
    }

    if sections.is_empty() {
        "No changes since last seen.".to_string()
    } else {
        sections.join("\n\n")
    }
}
