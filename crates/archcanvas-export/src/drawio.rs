//! draw.io (mxGraph) export.
//!
//! Zones become swimlane containers sized to their layout bounds, nodes become vertices
//! positioned relative to their zone, edges become connectors coloured by edge type.

use std::fmt::Write;

use archcanvas_core::config::LayoutConfig;
use archcanvas_core::layout::zone_boxes;
use archcanvas_core::{Diagram, Edge, EdgeType, Zone};

use crate::ExportError;

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            _ => out.push(c),
        }
    }
    out
}

fn zone_cell(zone: Zone) -> String {
    format!("zone-{}", zone.as_str())
}

fn zone_fill(zone: Zone) -> &'static str {
    match zone {
        Zone::Sources => "#F1F3F4",
        Zone::Cloud => "#E8F0FE",
        Zone::Consumers => "#FEF7E0",
        Zone::Connectivity => "#F3E8FD",
    }
}

/// Stroke colour keyed by edge type.
pub fn edge_color(edge_type: Option<EdgeType>) -> &'static str {
    match edge_type {
        Some(EdgeType::Data) => "#137333",
        Some(EdgeType::Control) => "#E65100",
        Some(EdgeType::Observe) => "#00695C",
        Some(EdgeType::Alert) => "#BF360C",
        Some(EdgeType::Identity) => "#1E3A5F",
        None => "#546E7A",
    }
}

fn edge_style(edge: &Edge) -> String {
    let color = edge_color(edge.edge_type);
    let private = edge.security.as_ref().is_some_and(|s| s.private);
    let dashed = !private
        && matches!(
            edge.edge_type,
            Some(EdgeType::Control | EdgeType::Observe | EdgeType::Alert)
        );
    let width = if private { 2 } else { 1 };
    format!(
        "edgeStyle=orthogonalEdgeStyle;rounded=0;html=1;endArrow=block;strokeColor={color};strokeWidth={width};dashed={};",
        u8::from(dashed)
    )
}

/// Render `diagram` as an uncompressed `.drawio` document.
pub fn to_drawio(diagram: &Diagram, config: &LayoutConfig) -> Result<String, ExportError> {
    let r = config.node_half_extent;
    let zones = zone_boxes(diagram, config);

    let mut out = String::new();
    writeln!(out, r#"<mxfile host="archcanvas">"#)?;
    writeln!(
        out,
        r#"  <diagram id="archcanvas" name="{}">"#,
        escape_xml(&diagram.title)
    )?;
    writeln!(out, r#"    <mxGraphModel grid="1" gridSize="10" guides="1" arrows="1" connect="1">"#)?;
    writeln!(out, "      <root>")?;
    writeln!(out, r#"        <mxCell id="0"/>"#)?;
    writeln!(out, r#"        <mxCell id="1" parent="0"/>"#)?;

    for zb in &zones {
        writeln!(
            out,
            r#"        <mxCell id="{}" value="{}" style="swimlane;rounded=1;dashed=1;fillColor={};startSize=24;" vertex="1" parent="1">"#,
            zone_cell(zb.zone),
            escape_xml(zb.label),
            zone_fill(zb.zone)
        )?;
        writeln!(
            out,
            r#"          <mxGeometry x="{}" y="{}" width="{}" height="{}" as="geometry"/>"#,
            zb.rect.x, zb.rect.y, zb.rect.width, zb.rect.height
        )?;
        writeln!(out, "        </mxCell>")?;
    }

    for node in &diagram.nodes {
        // Every node's zone is non-empty, so its container always exists.
        let Some(zb) = zones.iter().find(|z| z.zone == node.zone) else {
            continue;
        };
        let label = match &node.subtitle {
            Some(sub) => format!("{}\n{}", node.name, sub),
            None => node.name.clone(),
        };
        writeln!(
            out,
            r#"        <mxCell id="node-{}" value="{}" style="rounded=1;whiteSpace=wrap;html=1;verticalLabelPosition=bottom;verticalAlign=top;" vertex="1" parent="{}">"#,
            escape_xml(&node.id),
            escape_xml(&label),
            zone_cell(node.zone)
        )?;
        writeln!(
            out,
            r#"          <mxGeometry x="{}" y="{}" width="{}" height="{}" as="geometry"/>"#,
            node.x - r - zb.rect.x,
            node.y - r - zb.rect.y,
            2.0 * r,
            2.0 * r
        )?;
        writeln!(out, "        </mxCell>")?;
    }

    let nodes = diagram.node_map();
    for edge in &diagram.edges {
        if !nodes.contains_key(edge.from.as_str()) || !nodes.contains_key(edge.to.as_str()) {
            tracing::trace!(edge = %edge.id, "skipping unresolved edge in export");
            continue;
        }
        writeln!(
            out,
            r#"        <mxCell id="edge-{}" value="{}" style="{}" edge="1" parent="1" source="node-{}" target="node-{}">"#,
            escape_xml(&edge.id),
            escape_xml(edge.label.as_deref().unwrap_or("")),
            edge_style(edge),
            escape_xml(&edge.from),
            escape_xml(&edge.to)
        )?;
        writeln!(out, r#"          <mxGeometry relative="1" as="geometry"/>"#)?;
        writeln!(out, "        </mxCell>")?;
    }

    writeln!(out, "      </root>")?;
    writeln!(out, "    </mxGraphModel>")?;
    writeln!(out, "  </diagram>")?;
    writeln!(out, "</mxfile>")?;
    Ok(out)
}
