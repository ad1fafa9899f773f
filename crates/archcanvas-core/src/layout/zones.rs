use serde::Serialize;

use super::{GroupRef, Rect};
use crate::config::{LayoutConfig, Padding};
use crate::{Diagram, Point, Zone};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneBox {
    pub zone: Zone,
    pub label: &'static str,
    pub rect: Rect,
    pub node_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupRegion {
    pub group: GroupRef,
    pub name: String,
    pub rect: Rect,
    pub node_ids: Vec<String>,
}

/// Bounding box of `points` padded on every side, widened symmetrically to `min_width`.
/// `None` for an empty set.
pub fn padded_bounds(
    points: impl IntoIterator<Item = Point>,
    pad: Padding,
    min_width: f64,
) -> Option<Rect> {
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let (mut min, mut max) = (first, first);
    for p in iter {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }

    let mut rect = Rect::from_corners(
        Point::new(min.x - pad.x, min.y - pad.y),
        Point::new(max.x + pad.x, max.y + pad.y),
    );
    if rect.width < min_width {
        let grow = (min_width - rect.width) / 2.0;
        rect.x -= grow;
        rect.width = min_width;
    }
    Some(rect)
}

pub fn zone_bounds(diagram: &Diagram, zone: Zone, config: &LayoutConfig) -> Option<Rect> {
    padded_bounds(
        diagram
            .nodes
            .iter()
            .filter(|n| n.zone == zone)
            .map(|n| n.position()),
        config.zone_padding.get(zone),
        config.min_zone_width,
    )
}

/// One box per zone that has at least one node, in [`Zone::ALL`] order.
pub fn zone_boxes(diagram: &Diagram, config: &LayoutConfig) -> Vec<ZoneBox> {
    Zone::ALL
        .iter()
        .filter_map(|&zone| {
            let rect = zone_bounds(diagram, zone, config)?;
            Some(ZoneBox {
                zone,
                label: zone.title(),
                rect,
                node_count: diagram.nodes.iter().filter(|n| n.zone == zone).count(),
            })
        })
        .collect()
}

/// Dashed sub-regions for phases and the ops group. Members that no longer resolve are
/// skipped; a group with no resolvable member has no region.
pub fn group_regions(diagram: &Diagram, config: &LayoutConfig) -> Vec<GroupRegion> {
    let nodes = diagram.node_map();
    // Regions wrap the node cards, not just their centres.
    let pad = Padding::new(
        config.node_half_extent + config.group_padding.x,
        config.node_half_extent + config.group_padding.y,
    );

    let groups = diagram
        .phases
        .iter()
        .enumerate()
        .map(|(i, p)| (GroupRef::Phase(i), &p.name, &p.node_ids))
        .chain(
            diagram
                .ops_group
                .iter()
                .map(|g| (GroupRef::Ops, &g.name, &g.node_ids)),
        );

    groups
        .filter_map(|(group, name, members)| {
            let resolved: Vec<&str> = members
                .iter()
                .map(|id| id.as_str())
                .filter(|id| {
                    let found = nodes.contains_key(id);
                    if !found {
                        tracing::trace!(group = %name, node = %id, "skipping unresolved group member");
                    }
                    found
                })
                .collect();
            let rect = padded_bounds(resolved.iter().map(|id| nodes[id].position()), pad, 0.0)?;
            Some(GroupRegion {
                group,
                name: name.clone(),
                rect,
                node_ids: resolved.iter().map(|id| id.to_string()).collect(),
            })
        })
        .collect()
}

/// Union of all node cards plus a margin; what fit-to-content frames.
pub fn content_bounds(diagram: &Diagram, config: &LayoutConfig) -> Option<Rect> {
    let r = config.node_half_extent + config.content_margin;
    padded_bounds(diagram.nodes.iter().map(|n| n.position()), Padding::new(r, r), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{node, pipeline};

    #[test]
    fn zone_bounds_pad_every_side() {
        let mut d = Diagram::new("t");
        d.nodes = vec![
            node("a", Zone::Sources, 100.0, 100.0),
            node("b", Zone::Sources, 500.0, 300.0),
        ];
        let config = LayoutConfig::default();
        let rect = zone_bounds(&d, Zone::Sources, &config).unwrap();
        assert_eq!(rect, Rect { x: 30.0, y: 40.0, width: 540.0, height: 320.0 });
    }

    #[test]
    fn narrow_zone_widens_around_its_centre() {
        let mut d = Diagram::new("t");
        d.nodes = vec![node("a", Zone::Cloud, 400.0, 100.0)];
        let config = LayoutConfig::default();
        let rect = zone_bounds(&d, Zone::Cloud, &config).unwrap();
        assert_eq!(rect.width, 220.0);
        assert_eq!(rect.center().x, 400.0);
        assert_eq!(rect.top(), 55.0);
        assert_eq!(rect.bottom(), 145.0);
    }

    #[test]
    fn empty_zone_has_no_box() {
        let d = pipeline();
        let config = LayoutConfig::default();
        assert!(zone_bounds(&d, Zone::Connectivity, &config).is_none());
        let zones: Vec<Zone> = zone_boxes(&d, &config).iter().map(|z| z.zone).collect();
        assert_eq!(zones, vec![Zone::Sources, Zone::Cloud, Zone::Consumers]);
    }

    #[test]
    fn group_regions_skip_missing_members() {
        let mut d = pipeline();
        d.phases[0].node_ids.push("ghost".to_string());
        let regions = group_regions(&d, &LayoutConfig::default());
        assert_eq!(regions[0].node_ids, vec!["datastream", "bigquery"]);
        // 400..600 wide, padded by R + 24 on each side.
        assert_eq!(regions[0].rect.left(), 340.0);
        assert_eq!(regions[0].rect.right(), 660.0);

        d.ops_group.as_mut().unwrap().node_ids = vec!["ghost".to_string()];
        let regions = group_regions(&d, &LayoutConfig::default());
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn content_bounds_cover_node_cards() {
        let d = pipeline();
        let rect = content_bounds(&d, &LayoutConfig::default()).unwrap();
        assert_eq!(rect.left(), 100.0 - 76.0);
        assert_eq!(rect.right(), 1100.0 + 76.0);
        assert!(content_bounds(&Diagram::new("empty"), &LayoutConfig::default()).is_none());
    }
}
