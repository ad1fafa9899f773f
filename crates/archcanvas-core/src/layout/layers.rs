use serde::Serialize;

use super::{padded_bounds, Rect};
use crate::config::LayoutConfig;
use crate::{Diagram, Node, Point};

/// One band of the blueprint view after stacking.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerBox {
    pub name: String,
    pub label: String,
    pub rect: Rect,
    /// Vertical translation applied by stacking. Member nodes are drawn offset by this.
    pub offset_y: f64,
    pub node_ids: Vec<String>,
}

/// Arrow from the bottom of one layer box to the top of the next.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Connector {
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Blueprint {
    pub layers: Vec<LayerBox>,
    pub connectors: Vec<Connector>,
}

/// Partition nodes into the configured layers by id prefix (first matching layer wins),
/// box each layer, and stack the non-empty ones top to bottom with a fixed gap.
pub fn blueprint(diagram: &Diagram, config: &LayoutConfig) -> Blueprint {
    let mut layers: Vec<LayerBox> = Vec::new();

    for spec in &config.layers {
        let members: Vec<&Node> = diagram
            .nodes
            .iter()
            .filter(|n| config.layer_for(&n.id).is_some_and(|l| std::ptr::eq(l, spec)))
            .collect();
        let Some(mut rect) = padded_bounds(
            members.iter().map(|n| n.position()),
            config.layer_padding,
            config.min_layer_width,
        ) else {
            continue;
        };

        let offset_y = match layers.last() {
            Some(prev) => prev.rect.bottom() + config.layer_gap - rect.y,
            None => 0.0,
        };
        rect.y += offset_y;

        layers.push(LayerBox {
            name: spec.name.clone(),
            label: spec.label.clone(),
            rect,
            offset_y,
            node_ids: members.iter().map(|n| n.id.clone()).collect(),
        });
    }

    let connectors = layers
        .windows(2)
        .map(|pair| Connector {
            from: Point::new(pair[0].rect.center().x, pair[0].rect.bottom()),
            to: Point::new(pair[1].rect.center().x, pair[1].rect.top()),
        })
        .collect();

    Blueprint { layers, connectors }
}
