//! Persistence of diagrams and templates on the local filesystem.
//!
//! ```text
//! ~/.archcanvas/                     (or $ARCHCANVAS_HOME)
//!   settings.json
//!   diagrams/{id}.json
//!   diagrams/{id}.baseline.json      snapshot the tool server diffs against
//!   templates/{id}.json              read-only starting points
//! ```
//!
//! Last write wins. There is no locking.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::Diagram;

pub const HOME_ENV: &str = "ARCHCANVAS_HOME";

const DIAGRAMS: &str = "diagrams";
const TEMPLATES: &str = "templates";
const BASELINE_SUFFIX: &str = ".baseline";

/// What the store reports back after a successful save.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecord {
    pub id: String,
    pub path: PathBuf,
    pub nodes: usize,
    pub edges: usize,
}

/// The contract the editor saves and loads through.
pub trait DiagramStore {
    fn save(&self, id: &str, diagram: &Diagram) -> Result<SavedRecord, StorageError>;
    fn load(&self, template_id: &str) -> Result<Diagram, StorageError>;
}

/// Resolve the store root: `$ARCHCANVAS_HOME`, else `~/.archcanvas/`.
pub fn default_root() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".archcanvas")
}

fn check_id(id: &str) -> Result<(), StorageError> {
    let bad = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\'])
        || id.contains("..")
        || id.ends_with(BASELINE_SUFFIX);
    if bad {
        Err(StorageError::InvalidId(id.to_string()))
    } else {
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(default_root())
    }
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn diagram_path(&self, id: &str) -> PathBuf {
        self.root.join(DIAGRAMS).join(format!("{id}.json"))
    }

    fn baseline_path(&self, id: &str) -> PathBuf {
        self.root
            .join(DIAGRAMS)
            .join(format!("{id}{BASELINE_SUFFIX}.json"))
    }

    fn template_path(&self, id: &str) -> PathBuf {
        self.root.join(TEMPLATES).join(format!("{id}.json"))
    }

    fn list(&self, sub: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join(sub);
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut ids: Vec<String> = fs::read_dir(&dir)
            .map_err(io_err(&dir))?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json")
                    .filter(|n| !n.ends_with(BASELINE_SUFFIX) && !n.starts_with('.'))
                    .map(|n| n.to_string())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Saved diagram ids, sorted.
    pub fn list_diagrams(&self) -> Result<Vec<String>, StorageError> {
        self.list(DIAGRAMS)
    }

    pub fn list_templates(&self) -> Result<Vec<String>, StorageError> {
        self.list(TEMPLATES)
    }

    pub fn read_raw(&self, id: &str) -> Result<String, StorageError> {
        check_id(id)?;
        let path = self.diagram_path(id);
        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        fs::read_to_string(&path).map_err(io_err(&path))
    }

    pub fn read(&self, id: &str) -> Result<Diagram, StorageError> {
        Ok(serde_json::from_str(&self.read_raw(id)?)?)
    }

    /// Write a diagram document from raw JSON. Uses a temp file and a rename so a
    /// reader never sees a half-written file.
    pub fn write_raw(&self, id: &str, data: &str) -> Result<PathBuf, StorageError> {
        check_id(id)?;
        let dir = self.root.join(DIAGRAMS);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let tmp = dir.join(format!(".{id}.json.tmp"));
        let path = self.diagram_path(id);
        fs::write(&tmp, data).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(path)
    }

    pub fn write(&self, id: &str, diagram: &Diagram) -> Result<PathBuf, StorageError> {
        let json = serde_json::to_string_pretty(diagram)?;
        self.write_raw(id, &json)
    }

    /// Remove a diagram and its baseline. Missing files are not an error.
    pub fn delete(&self, id: &str) -> Result<(), StorageError> {
        check_id(id)?;
        for path in [self.diagram_path(id), self.baseline_path(id)] {
            if path.exists() {
                fs::remove_file(&path).map_err(io_err(&path))?;
            }
        }
        Ok(())
    }

    /// Snapshot what a tool caller last saw, for change reports.
    pub fn save_baseline(&self, id: &str, diagram: &Diagram) -> Result<(), StorageError> {
        check_id(id)?;
        let dir = self.root.join(DIAGRAMS);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let json = serde_json::to_string_pretty(diagram)?;
        let path = self.baseline_path(id);
        fs::write(&path, json).map_err(io_err(&path))
    }

    /// `None` when there is no baseline or it no longer parses.
    pub fn read_baseline(&self, id: &str) -> Option<Diagram> {
        check_id(id).ok()?;
        let raw = fs::read_to_string(self.baseline_path(id)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn read_template(&self, id: &str) -> Result<Diagram, StorageError> {
        check_id(id)?;
        let path = self.template_path(id);
        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let raw = fs::read_to_string(&path).map_err(io_err(&path))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl DiagramStore for FileStore {
    fn save(&self, id: &str, diagram: &Diagram) -> Result<SavedRecord, StorageError> {
        let path = self.write(id, diagram)?;
        tracing::debug!(id, path = %path.display(), "saved diagram");
        Ok(SavedRecord {
            id: id.to_string(),
            path,
            nodes: diagram.nodes.len(),
            edges: diagram.edges.len(),
        })
    }

    /// Templates shadow saved diagrams of the same id.
    fn load(&self, template_id: &str) -> Result<Diagram, StorageError> {
        match self.read_template(template_id) {
            Err(StorageError::NotFound(_)) => self.read(template_id),
            other => other,
        }
    }
}
