mod diff;

use archcanvas_core::config::CanvasConfig;
use archcanvas_core::icons::IconCatalog;
use archcanvas_core::layout::Layout;
use archcanvas_core::ops::{self, EdgePatch, EdgeSpec, NodePatch, NodeSpec};
use archcanvas_core::storage::{default_root, FileStore};
use archcanvas_core::Diagram;
use archcanvas_export::{export, Format};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::diff::compute_diff;

const LOG_ENV: &str = "ARCHCANVAS_LOG";
const ICONS_FILE: &str = "icons.json";

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DiagramRequest {
    /// Id of the stored diagram (file name without ".json")
    diagram: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetDiagramRequest {
    /// Id of the diagram to create or overwrite
    diagram: String,
    /// The complete diagram as a JSON string: {title, subtitle?, layout?, nodes, edges, threats?, phases?, opsGroup?}. See get_diagram output for the exact shape. crossesBoundary flags are recomputed on write.
    data: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddNodesRequest {
    /// Id of the diagram to add nodes to
    diagram: String,
    /// Nodes to add. Without x/y a node goes to the first free grid cell.
    nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateNodeItem {
    /// Id of the node to update (e.g. "ing_pubsub")
    node_id: String,
    /// Fields to change. Absent fields are left alone; an empty string clears icon, subtitle or subZone.
    patch: NodePatch,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateNodesRequest {
    diagram: String,
    nodes: Vec<UpdateNodeItem>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeleteNodesRequest {
    diagram: String,
    /// Ids of nodes to delete. Connected edges and phase/ops-group memberships go with them.
    node_ids: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddEdgesRequest {
    diagram: String,
    /// Edges to add. Both endpoints must exist.
    edges: Vec<EdgeSpec>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateEdgeItem {
    /// Id of the edge to update (e.g. "e3")
    edge_id: String,
    /// Fields to change. Changing from/to recomputes crossesBoundary.
    patch: EdgePatch,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateEdgesRequest {
    diagram: String,
    edges: Vec<UpdateEdgeItem>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeleteEdgesRequest {
    diagram: String,
    edge_ids: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExportRequest {
    diagram: String,
    /// "drawio" or "json"
    format: String,
    /// Optional file path to write the document to. Without it the document is returned inline.
    path: Option<String>,
}

// --- Server ---

#[derive(Clone)]
pub struct ArchcanvasServer {
    tool_router: ToolRouter<Self>,
    store: FileStore,
    config: CanvasConfig,
    icons: IconCatalog,
}

fn tool_error(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

fn tool_text(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Recompute every resolvable edge's crossesBoundary flag from its endpoints' zones.
fn refresh_boundary_flags(diagram: &mut Diagram) {
    let flags: Vec<Option<bool>> = diagram
        .edges
        .iter()
        .map(|e| diagram.crosses_boundary(&e.from, &e.to))
        .collect();
    for (edge, flag) in diagram.edges.iter_mut().zip(flags) {
        if let Some(flag) = flag {
            edge.crosses_boundary = flag;
        }
    }
}

impl ArchcanvasServer {
    fn read(&self, id: &str) -> Result<Diagram, CallToolResult> {
        self.store
            .read(id)
            .map_err(|e| tool_error(format!("Failed to read diagram '{}': {}", id, e)))
    }

    /// Write a mutated revision and move the baseline to it.
    fn commit(&self, id: &str, diagram: &Diagram, message: String) -> CallToolResult {
        match self.store.write(id, diagram) {
            Ok(path) => {
                if let Err(e) = self.store.save_baseline(id, diagram) {
                    tracing::warn!(diagram = id, error = %e, "failed to refresh baseline");
                }
                tracing::info!(diagram = id, path = %path.display(), "{}", message);
                tool_text(message)
            }
            Err(e) => tool_error(format!("Failed to write diagram '{}': {}", id, e)),
        }
    }
}

#[tool_router]
impl ArchcanvasServer {
    pub fn new(store: FileStore, config: CanvasConfig, icons: IconCatalog) -> Self {
        Self {
            tool_router: Self::tool_router(),
            store,
            config,
            icons,
        }
    }

    #[tool(description = "List all saved architecture diagrams")]
    fn list_diagrams(&self) -> Result<CallToolResult, McpError> {
        match self.store.list_diagrams() {
            Ok(ids) if ids.is_empty() => Ok(tool_text(
                "No diagrams found. Use set_diagram to create one.",
            )),
            Ok(ids) => Ok(tool_text(ids.join("\n"))),
            Err(e) => Ok(tool_error(e.to_string())),
        }
    }

    #[tool(description = "List the read-only diagram templates")]
    fn list_templates(&self) -> Result<CallToolResult, McpError> {
        match self.store.list_templates() {
            Ok(ids) if ids.is_empty() => Ok(tool_text("No templates found.")),
            Ok(ids) => Ok(tool_text(ids.join("\n"))),
            Err(e) => Ok(tool_error(e.to_string())),
        }
    }

    #[tool(
        description = "Get the full JSON content of a diagram: {title, subtitle?, layout?, nodes: [{id, name, icon?, subtitle?, zone, subZone?, x, y, details?}], edges: [{id, from, to, label?, subtitle?, step, security?, crossesBoundary, edgeType?}], threats, phases, opsGroup?}. Referential problems are listed after the document. Sets the baseline for get_changes."
    )]
    fn get_diagram(
        &self,
        Parameters(req): Parameters<DiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        if let Err(e) = self.store.save_baseline(&req.diagram, &diagram) {
            tracing::warn!(diagram = %req.diagram, error = %e, "failed to save baseline");
        }
        let json = match serde_json::to_string_pretty(&diagram) {
            Ok(json) => json,
            Err(e) => return Ok(tool_error(format!("Serialization error: {}", e))),
        };
        let mut content = vec![Content::text(json)];
        let issues = diagram.validate();
        if !issues.is_empty() {
            let lines: Vec<String> = issues.iter().map(|i| format!("  - {}", i)).collect();
            content.push(Content::text(format!(
                "Issues ({}):\n{}",
                issues.len(),
                lines.join("\n")
            )));
        }
        Ok(CallToolResult::success(content))
    }

    #[tool(
        description = "Create or overwrite a diagram from a complete JSON document. crossesBoundary flags are recomputed from node zones."
    )]
    fn set_diagram(
        &self,
        Parameters(req): Parameters<SetDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut diagram: Diagram = match serde_json::from_str(&req.data) {
            Ok(d) => d,
            Err(e) => return Ok(tool_error(format!("Invalid diagram JSON: {}", e))),
        };
        refresh_boundary_flags(&mut diagram);
        let issues = diagram.validate();
        let mut message = format!(
            "Saved diagram '{}' ({} nodes, {} edges)",
            req.diagram,
            diagram.nodes.len(),
            diagram.edges.len()
        );
        if !issues.is_empty() {
            message.push_str(&format!("\nIssues ({}):", issues.len()));
            for issue in &issues {
                message.push_str(&format!("\n  - {}", issue));
            }
        }
        Ok(self.commit(&req.diagram, &diagram, message))
    }

    #[tool(
        description = "Add one or more nodes. Icons are resolved from the icon hint or the display name against the icon catalogue. Nodes without x/y are placed on the first free grid cell."
    )]
    fn add_nodes(
        &self,
        Parameters(req): Parameters<AddNodesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };

        let mut added = Vec::new();
        for mut spec in req.nodes {
            if let Some(reference) = self.icons.resolve(&spec.name, spec.icon.as_deref()) {
                spec.icon = Some(reference.to_string());
            }
            match ops::add_node(
                &diagram,
                spec,
                &self.config.grid,
                self.config.layout.node_half_extent,
            ) {
                Ok((next, id)) => {
                    diagram = next;
                    added.push(id);
                }
                Err(e) => return Ok(tool_error(e.to_string())),
            }
        }

        Ok(self.commit(
            &req.diagram,
            &diagram,
            format!("Added {} node(s): {}", added.len(), added.join(", ")),
        ))
    }

    #[tool(description = "Update properties of one or more existing nodes")]
    fn update_nodes(
        &self,
        Parameters(req): Parameters<UpdateNodesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };

        let count = req.nodes.len();
        for item in req.nodes {
            match ops::update_node(&diagram, &item.node_id, item.patch) {
                Ok(next) => diagram = next,
                Err(e) => return Ok(tool_error(e.to_string())),
            }
        }

        Ok(self.commit(&req.diagram, &diagram, format!("Updated {} node(s)", count)))
    }

    #[tool(
        description = "Delete one or more nodes. Connected edges are removed and the nodes leave every phase and the ops group."
    )]
    fn delete_nodes(
        &self,
        Parameters(req): Parameters<DeleteNodesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };

        let edges_before = diagram.edges.len();
        for id in &req.node_ids {
            match ops::delete_node(&diagram, id) {
                Ok(next) => diagram = next,
                Err(e) => return Ok(tool_error(e.to_string())),
            }
        }
        let cascaded = edges_before - diagram.edges.len();

        Ok(self.commit(
            &req.diagram,
            &diagram,
            format!(
                "Deleted {} node(s) and {} connected edge(s)",
                req.node_ids.len(),
                cascaded
            ),
        ))
    }

    #[tool(
        description = "Add one or more edges between existing nodes. Data edges without an explicit step continue the processing pipeline."
    )]
    fn add_edges(
        &self,
        Parameters(req): Parameters<AddEdgesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };

        let mut added = Vec::new();
        for spec in req.edges {
            match ops::add_edge(&diagram, spec) {
                Ok((next, id)) => {
                    diagram = next;
                    added.push(id);
                }
                Err(e) => return Ok(tool_error(e.to_string())),
            }
        }

        Ok(self.commit(
            &req.diagram,
            &diagram,
            format!("Added {} edge(s): {}", added.len(), added.join(", ")),
        ))
    }

    #[tool(description = "Update one or more existing edges")]
    fn update_edges(
        &self,
        Parameters(req): Parameters<UpdateEdgesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };

        let count = req.edges.len();
        for item in req.edges {
            match ops::update_edge(&diagram, &item.edge_id, item.patch) {
                Ok(next) => diagram = next,
                Err(e) => return Ok(tool_error(e.to_string())),
            }
        }

        Ok(self.commit(&req.diagram, &diagram, format!("Updated {} edge(s)", count)))
    }

    #[tool(description = "Delete one or more edges from the diagram")]
    fn delete_edges(
        &self,
        Parameters(req): Parameters<DeleteEdgesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };

        for id in &req.edge_ids {
            match ops::delete_edge(&diagram, id) {
                Ok(next) => diagram = next,
                Err(e) => return Ok(tool_error(e.to_string())),
            }
        }

        Ok(self.commit(
            &req.diagram,
            &diagram,
            format!("Deleted {} edge(s)", req.edge_ids.len()),
        ))
    }

    #[tool(
        description = "Get the computed geometry of a diagram as JSON: zone boxes, phase/ops-group regions, routed edge paths with midpoints, security gates, blueprint layers (blueprint layout only) and the content bounds."
    )]
    fn get_layout(
        &self,
        Parameters(req): Parameters<DiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        let layout = Layout::compute(&diagram, &self.config.layout);
        match serde_json::to_string_pretty(&layout) {
            Ok(json) => Ok(tool_text(json)),
            Err(e) => Ok(tool_error(format!("Serialization error: {}", e))),
        }
    }

    #[tool(
        description = "Get the ordered processing pipeline: data edges with a non-zero step, ascending. Step 0 edges are parallel and not listed."
    )]
    fn get_pipeline(
        &self,
        Parameters(req): Parameters<DiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        let steps = diagram.pipeline_steps();
        if steps.is_empty() {
            return Ok(tool_text("No ordered pipeline steps."));
        }
        let name = |id: &str| {
            diagram
                .node(id)
                .map(|n| n.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let lines: Vec<String> = steps
            .iter()
            .map(|e| {
                let mut line = format!("{}. {} -> {}", e.step, name(&e.from), name(&e.to));
                if let Some(label) = &e.label {
                    line.push_str(&format!(": {}", label));
                }
                if e.crosses_boundary {
                    line.push_str(" [crosses boundary]");
                }
                line
            })
            .collect();
        Ok(tool_text(lines.join("\n")))
    }

    #[tool(
        description = "Show what changed in a diagram since it was last read or written through this server. Lists nodes and edges added, removed and modified, plus title, layout, phase, ops-group and threat changes. Call this to see what the user changed in the editor without re-reading the full diagram."
    )]
    fn get_changes(
        &self,
        Parameters(req): Parameters<DiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let current = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        let Some(baseline) = self.store.read_baseline(&req.diagram) else {
            return Ok(tool_error(
                "No baseline found. Call get_diagram first to establish a reference point.",
            ));
        };
        Ok(tool_text(compute_diff(&baseline, &current)))
    }

    #[tool(
        description = "Export a diagram as a draw.io document (zones as swimlanes, nodes as vertices, edges coloured by type) or as verbatim JSON."
    )]
    fn export_diagram(
        &self,
        Parameters(req): Parameters<ExportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let format: Format = match req.format.parse() {
            Ok(f) => f,
            Err(e) => return Ok(tool_error(format!("{}", e))),
        };
        let diagram = match self.read(&req.diagram) {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        let document = match export(&diagram, format, &self.config.layout) {
            Ok(doc) => doc,
            Err(e) => return Ok(tool_error(format!("Export failed: {}", e))),
        };
        match req.path {
            Some(path) => match std::fs::write(&path, &document) {
                Ok(()) => Ok(tool_text(format!(
                    "Wrote {} ({} bytes)",
                    path,
                    document.len()
                ))),
                Err(e) => Ok(tool_error(format!("Failed to write '{}': {}", path, e))),
            },
            None => Ok(tool_text(document)),
        }
    }
}

#[tool_handler]
impl ServerHandler for ArchcanvasServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"archcanvas edits architecture diagrams stored as JSON documents under ~/.archcanvas/diagrams (or $ARCHCANVAS_HOME).

## Zones
Every node sits in one zone: "sources" (on-prem systems), "cloud" (the platform), "consumers" (BI and downstream users) or "connectivity" (networking between them). Zone boxes are computed from member positions; you never size them.

## Edges
edgeType is "data", "control", "observe", "alert" or "identity". crossesBoundary is maintained for you: it is true when the endpoints sit in different zones. A secured edge that crosses into or out of the cloud zone gets a gate marker on the cloud box: on its left edge for sources -> cloud, on its right edge for cloud -> consumers, at the source node's height.

## Pipeline
Data edges with step > 0 form the ordered processing pipeline (get_pipeline). New data edges without an explicit step are appended at the end. Step 0 means parallel/unordered.

## IDs
Nodes get "node-N" unless you pass an id; blueprint layouts group nodes by id prefix (src_, conn_, ing_, lake_, proc_, bronze, silver, gold, serve_, con_, pillar_). Edges get "eN". Use get_diagram to discover existing ids.

## Workflow
1. get_diagram (sets the baseline).
2. Mutate with add_nodes / update_nodes / delete_nodes / add_edges / update_edges / delete_edges.
3. Later, get_changes shows what the user changed in the editor since your last read or write."#;

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_icons(root: &Path) -> IconCatalog {
    let path = root.join(ICONS_FILE);
    if !path.exists() {
        return IconCatalog::builtin();
    }
    match IconCatalog::load(&path) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!(error = %e, "using built-in icon catalogue");
            IconCatalog::builtin()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().nth(1).as_deref() == Some("init") {
        return register_clients(&std::env::current_dir()?);
    }

    init_tracing();
    let root = default_root();
    let config = CanvasConfig::load_or_default(&root);
    let icons = load_icons(&root);
    tracing::info!(root = %root.display(), "starting archcanvas tool server");

    let service = ArchcanvasServer::new(FileStore::new(root), config, icons)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

/// An agent client that launches archcanvas-mcp from a project-local config file.
struct AgentClient {
    /// Executable looked up on PATH to decide whether the client is installed.
    program: &'static str,
    /// Config file relative to the project directory.
    config_file: &'static str,
    /// Merges the archcanvas server entry into the file's current contents, if any.
    register: fn(Option<&str>, &str) -> String,
}

const AGENT_CLIENTS: &[AgentClient] = &[
    AgentClient {
        program: "claude",
        config_file: ".mcp.json",
        register: register_in_mcp_json,
    },
    AgentClient {
        program: "codex",
        config_file: ".codex/config.toml",
        register: register_in_codex_toml,
    },
];

/// `archcanvas-mcp init`: register this binary with every installed agent client so
/// sessions started in `project` can reach the diagram tools.
fn register_clients(project: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let command = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .into_owned();

    let installed: Vec<&AgentClient> = AGENT_CLIENTS
        .iter()
        .filter(|client| on_path(client.program))
        .collect();
    if installed.is_empty() {
        let looked_for: Vec<&str> = AGENT_CLIENTS.iter().map(|c| c.program).collect();
        return Err(format!("no agent client on PATH (looked for {})", looked_for.join(", ")).into());
    }

    for client in installed {
        let path = write_client_config(client, project, &command)?;
        eprintln!("{}: registered archcanvas in {}", client.program, path.display());
    }
    Ok(())
}

fn on_path(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths)
        .any(|dir| dir.join(program).is_file() || dir.join(format!("{program}.exe")).is_file())
}

fn write_client_config(
    client: &AgentClient,
    project: &Path,
    command: &str,
) -> std::io::Result<PathBuf> {
    let path = project.join(client.config_file);
    let existing = match std::fs::read_to_string(&path) {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, (client.register)(existing.as_deref(), command))?;
    Ok(path)
}

/// Unparseable or non-object files are replaced rather than merged.
fn register_in_mcp_json(existing: Option<&str>, command: &str) -> String {
    let mut root = existing
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .filter(serde_json::Value::is_object)
        .unwrap_or_else(|| serde_json::json!({}));

    let entry = serde_json::json!({ "type": "stdio", "command": command, "args": [] });
    match root.get_mut("mcpServers").and_then(serde_json::Value::as_object_mut) {
        Some(servers) => {
            servers.insert("archcanvas".to_string(), entry);
        }
        None => root["mcpServers"] = serde_json::json!({ "archcanvas": entry }),
    }
    format!("{root:#}\n")
}

fn register_in_codex_toml(existing: Option<&str>, command: &str) -> String {
    let mut doc: toml_edit::DocumentMut = existing
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default();

    let mut entry = toml_edit::Table::new();
    entry.insert("command", toml_edit::value(command));
    entry.insert("args", toml_edit::value(toml_edit::Array::new()));
    match doc.get_mut("mcp_servers").and_then(toml_edit::Item::as_table_mut) {
        Some(servers) => {
            servers.insert("archcanvas", toml_edit::Item::Table(entry));
        }
        None => {
            let mut servers = toml_edit::Table::new();
            servers.set_implicit(true);
            servers.insert("archcanvas", toml_edit::Item::Table(entry));
            doc.insert("mcp_servers", toml_edit::Item::Table(servers));
        }
    }
    doc.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use archcanvas_core::Zone;

    fn server() -> (tempfile::TempDir, ArchcanvasServer) {
        let dir = tempfile::tempdir().unwrap();
        let server = ArchcanvasServer::new(
            FileStore::new(dir.path()),
            CanvasConfig::default(),
            IconCatalog::builtin(),
        );
        (dir, server)
    }

    fn text(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn is_error(result: &CallToolResult) -> bool {
        result.is_error == Some(true)
    }

    fn seed(server: &ArchcanvasServer) {
        let data = serde_json::json!({
            "title": "Oracle CDC",
            "nodes": [
                {"id": "oracle", "name": "Oracle", "zone": "sources", "x": 100.0, "y": 300.0},
                {"id": "bq", "name": "BigQuery", "zone": "cloud", "x": 500.0, "y": 300.0}
            ],
            "edges": [
                {"id": "e1", "from": "oracle", "to": "bq", "step": 1, "edgeType": "data"}
            ]
        });
        let result = server
            .set_diagram(Parameters(SetDiagramRequest {
                diagram: "cdc".to_string(),
                data: data.to_string(),
            }))
            .unwrap();
        assert!(!is_error(&result), "{}", text(&result));
    }

    #[test]
    fn set_diagram_recomputes_boundary_flags() {
        let (_dir, server) = server();
        seed(&server);
        let stored = server.store.read("cdc").unwrap();
        assert!(stored.edges[0].crosses_boundary);
        assert_eq!(
            compute_diff(&server.store.read_baseline("cdc").unwrap(), &stored),
            "No changes since last seen."
        );
    }

    #[test]
    fn add_nodes_resolves_icons_and_places_on_grid() {
        let (_dir, server) = server();
        seed(&server);
        let result = server
            .add_nodes(Parameters(AddNodesRequest {
                diagram: "cdc".to_string(),
                nodes: vec![NodeSpec::new("Looker", Zone::Consumers)],
            }))
            .unwrap();
        assert!(!is_error(&result), "{}", text(&result));
        assert!(text(&result).contains("node-1"));
        let stored = server.store.read("cdc").unwrap();
        let added = stored.node("node-1").unwrap();
        assert_eq!(added.icon.as_deref(), Some("icons/looker.svg"));
    }

    #[test]
    fn failed_batches_write_nothing() {
        let (_dir, server) = server();
        seed(&server);
        let result = server
            .add_edges(Parameters(AddEdgesRequest {
                diagram: "cdc".to_string(),
                edges: vec![EdgeSpec::new("bq", "oracle"), EdgeSpec::new("bq", "ghost")],
            }))
            .unwrap();
        assert!(is_error(&result));
        assert!(text(&result).contains("ghost"));
        assert_eq!(server.store.read("cdc").unwrap().edges.len(), 1);
    }

    #[test]
    fn delete_cascades_and_reports() {
        let (_dir, server) = server();
        seed(&server);
        let result = server
            .delete_nodes(Parameters(DeleteNodesRequest {
                diagram: "cdc".to_string(),
                node_ids: vec!["oracle".to_string()],
            }))
            .unwrap();
        assert_eq!(text(&result), "Deleted 1 node(s) and 1 connected edge(s)");
        assert!(server.store.read("cdc").unwrap().edges.is_empty());
    }

    #[test]
    fn changes_are_reported_against_the_baseline() {
        let (_dir, server) = server();
        seed(&server);
        // An edit made outside the server, e.g. in the editor.
        let mut edited = server.store.read("cdc").unwrap();
        edited.nodes[1].name = "BQ".to_string();
        server.store.write("cdc", &edited).unwrap();

        let result = server
            .get_changes(Parameters(DiagramRequest {
                diagram: "cdc".to_string(),
            }))
            .unwrap();
        assert!(text(&result).contains("name \"BigQuery\" -> \"BQ\""));
    }

    #[test]
    fn pipeline_and_export() {
        let (_dir, server) = server();
        seed(&server);
        let pipeline = server
            .get_pipeline(Parameters(DiagramRequest {
                diagram: "cdc".to_string(),
            }))
            .unwrap();
        assert_eq!(text(&pipeline), "1. Oracle -> BigQuery [crosses boundary]");

        let drawio = server
            .export_diagram(Parameters(ExportRequest {
                diagram: "cdc".to_string(),
                format: "drawio".to_string(),
                path: None,
            }))
            .unwrap();
        assert!(text(&drawio).starts_with("<mxfile"));

        let bad = server
            .export_diagram(Parameters(ExportRequest {
                diagram: "cdc".to_string(),
                format: "pdf".to_string(),
                path: None,
            }))
            .unwrap();
        assert!(is_error(&bad));
    }

    #[test]
    fn missing_diagrams_are_tool_errors() {
        let (_dir, server) = server();
        let result = server
            .get_layout(Parameters(DiagramRequest {
                diagram: "nope".to_string(),
            }))
            .unwrap();
        assert!(is_error(&result));
        assert!(text(&result).contains("nope"));
    }

    #[test]
    fn instructions_place_gates_on_the_cloud_box() {
        assert!(INSTRUCTIONS.contains("left edge for sources -> cloud"));
        assert!(INSTRUCTIONS.contains("right edge for cloud -> consumers"));
        assert!(!INSTRUCTIONS.contains("destination zone"));
    }

    #[test]
    fn mcp_json_registration_keeps_other_servers() {
        let merged: serde_json::Value = serde_json::from_str(&register_in_mcp_json(
            Some(r#"{"mcpServers": {"other": {"command": "x"}}, "theme": "dark"}"#),
            "/bin/archcanvas-mcp",
        ))
        .unwrap();
        assert_eq!(merged["theme"], "dark");
        assert_eq!(merged["mcpServers"]["other"]["command"], "x");
        assert_eq!(merged["mcpServers"]["archcanvas"]["command"], "/bin/archcanvas-mcp");

        let fresh: serde_json::Value =
            serde_json::from_str(&register_in_mcp_json(Some("not json"), "/bin/a")).unwrap();
        assert_eq!(fresh["mcpServers"]["archcanvas"]["type"], "stdio");
    }

    #[test]
    fn codex_registration_keeps_settings() {
        let doc = register_in_codex_toml(Some("model = \"o3\"\n"), "/bin/a");
        assert!(doc.contains("model = \"o3\""));
        assert!(doc.contains("[mcp_servers.archcanvas]"), "{doc}");
        assert!(doc.contains("command = \"/bin/a\""));

        let again = register_in_codex_toml(Some(&doc), "/bin/b");
        assert_eq!(again.matches("[mcp_servers.archcanvas]").count(), 1);
        assert!(again.contains("command = \"/bin/b\""));
    }

    #[test]
    fn client_configs_are_written_under_the_project() {
        let dir = tempfile::tempdir().unwrap();
        for client in AGENT_CLIENTS {
            let path = write_client_config(client, dir.path(), "/bin/a").unwrap();
            assert_eq!(path, dir.path().join(client.config_file));
            assert!(std::fs::read_to_string(&path).unwrap().contains("/bin/a"));
        }
        let codex = &AGENT_CLIENTS[1];
        std::fs::write(dir.path().join(codex.config_file), "model = \"o3\"\n").unwrap();
        let path = write_client_config(codex, dir.path(), "/bin/b").unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("model = \"o3\""));
        assert!(written.contains("/bin/b"));
    }
}
