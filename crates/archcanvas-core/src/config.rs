//! Tunable geometry and interaction constants.
//!
//! Everything here is read from `settings.json` in the store root. Every field has a
//! default, so a partial file only overrides what it names and a missing file yields
//! [`CanvasConfig::default`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::viewport::ViewportLimits;
use crate::{Point, Zone};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Padding {
    pub x: f64,
    pub y: f64,
}

impl Padding {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Per-zone padding. The cloud box is drawn tighter than the outside regions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ZonePadding {
    pub sources: Padding,
    pub cloud: Padding,
    pub consumers: Padding,
    pub connectivity: Padding,
}

impl Default for ZonePadding {
    fn default() -> Self {
        Self {
            sources: Padding::new(70.0, 60.0),
            cloud: Padding::new(50.0, 45.0),
            consumers: Padding::new(70.0, 60.0),
            connectivity: Padding::new(60.0, 55.0),
        }
    }
}

impl ZonePadding {
    pub fn get(&self, zone: Zone) -> Padding {
        match zone {
            Zone::Sources => self.sources,
            Zone::Cloud => self.cloud,
            Zone::Consumers => self.consumers,
            Zone::Connectivity => self.connectivity,
        }
    }
}

/// One horizontal band of the blueprint view, selected by node-id prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub label: String,
    pub prefixes: Vec<String>,
}

impl LayerSpec {
    fn new(name: &str, label: &str, prefixes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn matches(&self, node_id: &str) -> bool {
        self.prefixes.iter().any(|p| node_id.starts_with(p.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Half the side of a node card. Edges terminate this far from the node centre.
    pub node_half_extent: f64,
    /// Cross-axis offsets below this draw a straight segment instead of a jog.
    pub jog_threshold: f64,
    /// An edge is mostly horizontal when `|dx| > ratio * |dy|`.
    pub horizontal_ratio: f64,
    pub zone_padding: ZonePadding,
    pub min_zone_width: f64,
    pub group_padding: Padding,
    pub layers: Vec<LayerSpec>,
    pub layer_gap: f64,
    pub layer_padding: Padding,
    pub min_layer_width: f64,
    pub content_margin: f64,
}

impl LayoutConfig {
    /// The first configured layer whose prefixes match `node_id`.
    pub fn layer_for(&self, node_id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.matches(node_id))
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_half_extent: 36.0,
            jog_threshold: 14.0,
            horizontal_ratio: 0.4,
            zone_padding: ZonePadding::default(),
            min_zone_width: 220.0,
            group_padding: Padding::new(24.0, 24.0),
            layers: vec![
                LayerSpec::new("sources", "L1 Sources", &["src_"]),
                // Listed before consumers: `con_` would also claim `conn_` ids.
                LayerSpec::new("connectivity", "L2 Connectivity", &["conn_"]),
                LayerSpec::new("ingestion", "L3 Ingestion", &["ing_"]),
                LayerSpec::new("landing", "L4 Data Lake", &["lake_"]),
                LayerSpec::new("processing", "L5 Processing", &["proc_"]),
                LayerSpec::new("medallion", "L6 Medallion", &["bronze", "silver", "gold"]),
                LayerSpec::new("serving", "L7 Serving", &["serve_"]),
                LayerSpec::new("consumers", "L8 Consumers", &["con_"]),
                LayerSpec::new("pillars", "Pillars", &["pillar_"]),
            ],
            layer_gap: 60.0,
            layer_padding: Padding::new(50.0, 40.0),
            min_layer_width: 220.0,
            content_margin: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    /// Screen pixels of pointer travel before a gesture counts as a drag rather than a click.
    pub drag_threshold: f64,
    pub gate_hit_radius: f64,
    pub edge_hit_tolerance: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 4.0,
            gate_hit_radius: 10.0,
            edge_hit_tolerance: 6.0,
        }
    }
}

/// Grid scanned by `add_node` for a free slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementGrid {
    pub origin: Point,
    pub step_x: f64,
    pub step_y: f64,
    pub columns: usize,
    /// Extra clearance required around an existing node box.
    pub gap: f64,
}

impl Default for PlacementGrid {
    fn default() -> Self {
        Self {
            origin: Point::new(120.0, 120.0),
            step_x: 180.0,
            step_y: 150.0,
            columns: 6,
            gap: 12.0,
        }
    }
}

impl PlacementGrid {
    pub fn cell_position(&self, index: usize) -> Point {
        let columns = self.columns.max(1);
        Point::new(
            self.origin.x + (index % columns) as f64 * self.step_x,
            self.origin.y + (index / columns) as f64 * self.step_y,
        )
    }

    /// Grid cell nearest to a model-space point, clamped into the grid's columns.
    pub fn cell_index(&self, at: Point) -> usize {
        let columns = self.columns.max(1);
        let col = ((at.x - self.origin.x) / self.step_x).round().max(0.0) as usize;
        let row = ((at.y - self.origin.y) / self.step_y).round().max(0.0) as usize;
        row.saturating_mul(columns)
            .saturating_add(col.min(columns - 1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CanvasConfig {
    pub layout: LayoutConfig,
    pub interaction: InteractionConfig,
    pub canvas: ViewportLimits,
    pub blueprint: ViewportLimits,
    pub grid: PlacementGrid,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            interaction: InteractionConfig::default(),
            canvas: ViewportLimits::canvas(),
            blueprint: ViewportLimits::blueprint(),
            grid: PlacementGrid::default(),
        }
    }
}

impl CanvasConfig {
    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `settings.json` from a store root, falling back to defaults (with a warning)
    /// when the file is unreadable or malformed.
    pub fn load_or_default(root: &Path) -> Self {
        match Self::load(&root.join(SETTINGS_FILE)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "using default canvas settings");
                Self::default()
            }
        }
    }
}
