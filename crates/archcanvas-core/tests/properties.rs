//! Cross-module invariants of the diagram engine.

use archcanvas_core::config::{CanvasConfig, LayoutConfig, PlacementGrid};
use archcanvas_core::history::HistoryManager;
use archcanvas_core::layout::{derive_gates, route, zone_bounds, GateDirection, Rect};
use archcanvas_core::ops::{self, EdgePatch, NodeSpec};
use archcanvas_core::viewport::{Viewport, ViewportLimits};
use archcanvas_core::{Diagram, Edge, EdgeType, OpsGroup, Phase, Point, Security, Zone};
use proptest::prelude::*;
use std::collections::BTreeMap;

const R: f64 = 36.0;

fn zone() -> impl Strategy<Value = Zone> {
    prop_oneof![
        Just(Zone::Sources),
        Just(Zone::Cloud),
        Just(Zone::Consumers),
        Just(Zone::Connectivity),
    ]
}

fn node(id: String, zone: Zone, x: f64, y: f64) -> archcanvas_core::Node {
    archcanvas_core::Node {
        name: id.to_uppercase(),
        id,
        icon: None,
        subtitle: None,
        zone,
        sub_zone: None,
        x,
        y,
        details: BTreeMap::new(),
    }
}

/// A referentially valid diagram: edges resolve, flags are fresh, groups hold real ids.
fn diagram() -> impl Strategy<Value = Diagram> {
    prop::collection::vec((zone(), -2000.0..2000.0f64, -2000.0..2000.0f64), 1..12)
        .prop_flat_map(|nodes| {
            let n = nodes.len();
            (
                Just(nodes),
                prop::collection::vec((0..n, 0..n, 0u32..6), 0..16),
                prop::collection::vec(0..n, 0..6),
                prop::collection::vec(0..n, 0..4),
            )
        })
        .prop_map(|(nodes, edges, phase, ops_members)| {
            let mut d = Diagram::new("generated");
            d.nodes = nodes
                .into_iter()
                .enumerate()
                .map(|(i, (z, x, y))| node(format!("n{i}"), z, x, y))
                .collect();
            d.edges = edges
                .into_iter()
                .enumerate()
                .map(|(i, (from, to, step))| Edge {
                    id: format!("e{}", i + 1),
                    from: format!("n{from}"),
                    to: format!("n{to}"),
                    label: None,
                    subtitle: None,
                    step,
                    security: None,
                    crosses_boundary: d.nodes[from].zone != d.nodes[to].zone,
                    edge_type: Some(EdgeType::Data),
                })
                .collect();
            d.phases = vec![Phase {
                id: "p1".to_string(),
                name: "Phase".to_string(),
                node_ids: phase.iter().map(|i| format!("n{i}")).collect(),
            }];
            d.ops_group = Some(OpsGroup {
                name: "Ops".to_string(),
                node_ids: ops_members.iter().map(|i| format!("n{i}")).collect(),
            });
            d
        })
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn zone_bounds_contain_padded_members(d in diagram(), z in zone()) {
        let config = LayoutConfig::default();
        let pad = config.zone_padding.get(z);
        let members: Vec<_> = d.nodes.iter().filter(|n| n.zone == z).collect();
        let rect = zone_bounds(&d, z, &config);
        prop_assert_eq!(rect.is_some(), !members.is_empty());
        if let Some(rect) = rect {
            prop_assert!(rect.width >= config.min_zone_width - 1e-9);
            for n in members {
                prop_assert!(rect.left() <= n.x - pad.x + 1e-6);
                prop_assert!(rect.right() >= n.x + pad.x - 1e-6);
                prop_assert!(rect.top() <= n.y - pad.y + 1e-6);
                prop_assert!(rect.bottom() >= n.y + pad.y - 1e-6);
            }
        }
    }

    #[test]
    fn repointed_edges_have_fresh_boundary_flags(
        d in diagram(),
        pick in any::<prop::sample::Index>(),
        target in any::<prop::sample::Index>(),
        move_source in any::<bool>(),
    ) {
        prop_assume!(!d.edges.is_empty());
        let edge_id = d.edges[pick.index(d.edges.len())].id.clone();
        let new_end = d.nodes[target.index(d.nodes.len())].id.clone();
        let patch = if move_source {
            EdgePatch { from: Some(new_end), ..Default::default() }
        } else {
            EdgePatch { to: Some(new_end), ..Default::default() }
        };
        let next = ops::update_edge(&d, &edge_id, patch).unwrap();
        for e in &next.edges {
            let expected = next.node(&e.from).unwrap().zone != next.node(&e.to).unwrap().zone;
            prop_assert_eq!(e.crosses_boundary, expected);
        }
    }

    #[test]
    fn delete_node_cascades_exactly(d in diagram(), pick in any::<prop::sample::Index>()) {
        let id = d.nodes[pick.index(d.nodes.len())].id.clone();
        let next = ops::delete_node(&d, &id).unwrap();

        let kept: Vec<&Edge> = d.edges.iter().filter(|e| e.from != id && e.to != id).collect();
        prop_assert_eq!(next.edges.iter().collect::<Vec<_>>(), kept);
        prop_assert_eq!(next.nodes.len(), d.nodes.len() - 1);

        let pruned: Vec<String> =
            d.phases[0].node_ids.iter().filter(|n| **n != id).cloned().collect();
        prop_assert_eq!(&next.phases[0].node_ids, &pruned);
        let ops_before = &d.ops_group.as_ref().unwrap().node_ids;
        let ops_after = &next.ops_group.as_ref().unwrap().node_ids;
        let pruned: Vec<String> = ops_before.iter().filter(|n| **n != id).cloned().collect();
        prop_assert_eq!(ops_after, &pruned);
        prop_assert!(next.validate().is_empty());
    }

    #[test]
    fn undo_then_redo_restores_the_revision(
        d in diagram(),
        moves in prop::collection::vec(
            (any::<prop::sample::Index>(), -500.0..500.0f64, -500.0..500.0f64),
            1..8,
        ),
    ) {
        let mut history = HistoryManager::begin(d.clone());
        let mut current = d.clone();
        for (pick, x, y) in &moves {
            let id = current.nodes[pick.index(current.nodes.len())].id.clone();
            current = ops::set_positions(&current, &[(id, Point::new(*x, *y))]);
            history.push(current.clone());
        }
        let k = moves.len();
        for _ in 0..k {
            prop_assert!(history.undo().is_some());
        }
        prop_assert_eq!(history.current(), &d);
        prop_assert!(!history.is_dirty());
        for _ in 0..k {
            prop_assert!(history.redo().is_some());
        }
        prop_assert_eq!(history.current(), &current);
    }

    #[test]
    fn zoom_keeps_the_cursor_fixed(
        zoom in 0.08..3.0f64,
        pan in (-3000.0..3000.0f64, -3000.0..3000.0f64),
        cursor in (0.0..2000.0f64, 0.0..1200.0f64),
        zoom_in in any::<bool>(),
    ) {
        let mut vp = Viewport::new(ViewportLimits::canvas());
        vp.zoom = zoom;
        vp.pan = Point::new(pan.0, pan.1);
        let cursor = Point::new(cursor.0, cursor.1);
        let before = vp.screen_to_model(cursor);
        vp.zoom_at(cursor, if zoom_in { 1.0 } else { -1.0 });
        let after = vp.screen_to_model(cursor);
        prop_assert!(close(before.x, after.x), "{:?} vs {:?}", before, after);
        prop_assert!(close(before.y, after.y), "{:?} vs {:?}", before, after);
        prop_assert!(vp.zoom >= 0.08 && vp.zoom <= 3.0);
    }

    #[test]
    fn added_nodes_never_overlap(d in diagram(), hint in (0.0..1500.0f64, 0.0..1500.0f64)) {
        let grid = PlacementGrid::default();
        let spec = NodeSpec::new("New", Zone::Cloud).at(hint.0, hint.1);
        let (d1, a) = ops::add_node(&d, spec.clone(), &grid, R).unwrap();
        let (d2, b) = ops::add_node(&d1, spec, &grid, R).unwrap();
        for new_id in [&a, &b] {
            let placed = Rect::around(d2.node(new_id).unwrap().position(), R);
            for other in d2.nodes.iter().filter(|n| &n.id != new_id) {
                prop_assert!(!placed.intersects(&Rect::around(other.position(), R)));
            }
        }
    }
}

#[test]
fn routing_scenarios() {
    let config = CanvasConfig::default().layout;
    let straight = route(Point::new(0.0, 0.0), Point::new(200.0, 0.0), &config);
    assert_eq!(straight.points.len(), 2);

    let jogged = route(Point::new(0.0, 0.0), Point::new(200.0, 100.0), &config);
    assert_eq!(jogged.points.len(), 4);
    assert_eq!(jogged.points[1].x, 100.0);
    assert_eq!(jogged.points[2].x, 100.0);
}

#[test]
fn gate_scenario() {
    let mut d = Diagram::new("gate");
    d.nodes = vec![
        node("src".to_string(), Zone::Sources, 0.0, 0.0),
        node("dst".to_string(), Zone::Cloud, 400.0, 0.0),
    ];
    let (unsecured, id) = ops::add_edge(&d, ops::EdgeSpec::new("src", "dst")).unwrap();
    let config = LayoutConfig::default();
    assert!(derive_gates(&unsecured, &config).is_empty());

    let patch = EdgePatch {
        security: Some(Security {
            transport: "TLS 1.3".to_string(),
            private: true,
            ..Default::default()
        }),
        ..Default::default()
    };
    let secured = ops::update_edge(&unsecured, &id, patch).unwrap();
    let gates = derive_gates(&secured, &config);
    assert_eq!(gates.len(), 1);
    assert_eq!(gates[0].direction, GateDirection::In);
}
