//! Pointer gesture state machine: node and group dragging, panning, connect mode.
//!
//! Only one gesture is live at a time. Every transition reads the current revision and
//! reports what changed through an [`Outcome`]; the caller owns the diagram and history.

use serde::Serialize;

use crate::config::CanvasConfig;
use crate::layout::{GroupRef, Layout};
use crate::ops;
use crate::viewport::Viewport;
use crate::{Diagram, Point};

/// What lies under a model-space point.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum Hit {
    Gate(String),
    Node(String),
    Edge(String),
    Group(GroupRef),
    Empty,
}

impl Hit {
    /// Hits that have a detail popover.
    pub fn has_detail(&self) -> bool {
        matches!(self, Hit::Gate(_) | Hit::Node(_) | Hit::Edge(_))
    }
}

/// Resolve a model-space point against the current revision.
///
/// Precedence: gate marker, node card (topmost first), edge path, phase region, ops region.
pub fn hit_test(diagram: &Diagram, layout: &Layout, at: Point, config: &CanvasConfig) -> Hit {
    let ic = &config.interaction;
    let r = config.layout.node_half_extent;

    if let Some(gate) = layout
        .gates
        .iter()
        .find(|g| g.position.distance(at) <= ic.gate_hit_radius)
    {
        return Hit::Gate(gate.edge_id.clone());
    }

    if let Some(node) = diagram
        .nodes
        .iter()
        .rev()
        .find(|n| (n.x - at.x).abs() <= r && (n.y - at.y).abs() <= r)
    {
        return Hit::Node(node.id.clone());
    }

    let nearest = layout
        .edges
        .iter()
        .map(|e| (e, e.path.distance_to(at)))
        .filter(|(_, d)| *d <= ic.edge_hit_tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((edge, _)) = nearest {
        return Hit::Edge(edge.edge_id.clone());
    }

    // Phases precede the ops group in `layout.groups`.
    if let Some(region) = layout.groups.iter().find(|g| g.rect.contains(at)) {
        return Hit::Group(region.group);
    }

    Hit::Empty
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up(Point),
}

/// Positions captured when a drag starts, and whether it has become a real drag.
#[derive(Debug, Clone, PartialEq)]
pub struct Drag {
    pub originals: Vec<(String, Point)>,
    /// Screen position of the pointer-down.
    pub start: Point,
    pub moved: bool,
}

impl Drag {
    fn positions(&self, delta: Point) -> Vec<(String, Point)> {
        self.originals
            .iter()
            .map(|(id, p)| (id.clone(), Point::new(p.x + delta.x, p.y + delta.y)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingNode {
        node_id: String,
        drag: Drag,
    },
    DraggingGroup {
        group: GroupRef,
        drag: Drag,
    },
    Panning {
        /// State restored when the pan ends, so connect mode survives a pan.
        resume: Box<InteractionState>,
        hit: Hit,
        start: Point,
        moved: bool,
    },
    ConnectArmed,
    ConnectSourceSelected {
        source: String,
    },
}

impl InteractionState {
    pub fn in_connect_mode(&self) -> bool {
        match self {
            InteractionState::ConnectArmed | InteractionState::ConnectSourceSelected { .. } => true,
            InteractionState::Panning { resume, .. } => resume.in_connect_mode(),
            _ => false,
        }
    }

    pub fn is_real_drag(&self) -> bool {
        match self {
            InteractionState::DraggingNode { drag, .. }
            | InteractionState::DraggingGroup { drag, .. } => drag.moved,
            _ => false,
        }
    }
}

/// Everything a transition wants the owner to apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Replacement for the displayed revision.
    pub diagram: Option<Diagram>,
    /// Push `diagram` onto the history.
    pub commit: bool,
    pub redraw: bool,
    pub click: Option<Hit>,
    /// Connect mode switched on or off.
    pub connect_mode: Option<bool>,
}

impl Outcome {
    fn redraw() -> Self {
        Self {
            redraw: true,
            ..Default::default()
        }
    }

    fn show(diagram: Diagram) -> Self {
        Self {
            diagram: Some(diagram),
            redraw: true,
            ..Default::default()
        }
    }
}

/// What the state machine reads and may move on each event.
pub struct Surface<'a> {
    pub diagram: &'a Diagram,
    pub viewport: &'a mut Viewport,
    pub config: &'a CanvasConfig,
    /// Dragging and connect mode need edit mode; panning does not.
    pub editing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Interaction {
    state: InteractionState,
}

impl Interaction {
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn connect_mode(&self) -> bool {
        self.state.in_connect_mode()
    }

    /// Switch connect mode. Ignored mid-gesture.
    pub fn set_connect_mode(&mut self, on: bool) -> bool {
        match (&self.state, on) {
            (InteractionState::Idle, true) => self.state = InteractionState::ConnectArmed,
            (InteractionState::ConnectArmed | InteractionState::ConnectSourceSelected { .. }, false) => {
                self.state = InteractionState::Idle
            }
            _ => return false,
        }
        tracing::debug!(on, "connect mode");
        true
    }

    pub fn pointer(&mut self, event: PointerEvent, surface: Surface<'_>) -> Outcome {
        match event {
            PointerEvent::Down(screen) => self.down(screen, surface),
            PointerEvent::Move(screen) => self.moved(screen, surface),
            PointerEvent::Up(screen) => self.up(screen, surface),
        }
    }

    fn begin_pan(&mut self, screen: Point, hit: Hit, viewport: &mut Viewport) {
        viewport.begin_pan(screen);
        let resume = std::mem::take(&mut self.state);
        self.state = InteractionState::Panning {
            resume: Box::new(resume),
            hit,
            start: screen,
            moved: false,
        };
    }

    fn down(&mut self, screen: Point, s: Surface<'_>) -> Outcome {
        let layout = Layout::compute(s.diagram, &s.config.layout);
        let hit = hit_test(s.diagram, &layout, s.viewport.screen_to_model(screen), s.config);

        if !s.editing {
            self.begin_pan(screen, hit, s.viewport);
            return Outcome::default();
        }

        match (std::mem::take(&mut self.state), hit) {
            (InteractionState::Idle, Hit::Node(id)) => {
                if let Some(node) = s.diagram.node(&id) {
                    let drag = Drag {
                        originals: vec![(id.clone(), node.position())],
                        start: screen,
                        moved: false,
                    };
                    self.state = InteractionState::DraggingNode { node_id: id, drag };
                }
                Outcome::default()
            }
            (InteractionState::Idle, Hit::Group(group)) => {
                if let Some(region) = layout.groups.iter().find(|g| g.group == group) {
                    let originals = region
                        .node_ids
                        .iter()
                        .filter_map(|id| s.diagram.node(id).map(|n| (id.clone(), n.position())))
                        .collect();
                    let drag = Drag {
                        originals,
                        start: screen,
                        moved: false,
                    };
                    self.state = InteractionState::DraggingGroup { group, drag };
                }
                Outcome::default()
            }
            (InteractionState::ConnectArmed, Hit::Node(id)) => {
                self.state = InteractionState::ConnectSourceSelected { source: id.clone() };
                Outcome {
                    redraw: true,
                    click: Some(Hit::Node(id)),
                    ..Default::default()
                }
            }
            (InteractionState::ConnectSourceSelected { source }, Hit::Node(id)) if source == id => {
                self.state = InteractionState::ConnectArmed;
                Outcome::redraw()
            }
            (InteractionState::ConnectSourceSelected { source }, Hit::Node(id)) => {
                match ops::connect(s.diagram, &source, &id) {
                    Ok((next, edge_id)) => {
                        tracing::debug!(edge = %edge_id, from = %source, to = %id, "connected");
                        Outcome {
                            diagram: Some(next),
                            commit: true,
                            redraw: true,
                            connect_mode: Some(false),
                            ..Default::default()
                        }
                    }
                    Err(e) => {
                        tracing::trace!(error = %e, "connect skipped");
                        self.state = InteractionState::ConnectArmed;
                        Outcome::redraw()
                    }
                }
            }
            (
                state @ (InteractionState::Idle
                | InteractionState::ConnectArmed
                | InteractionState::ConnectSourceSelected { .. }),
                hit,
            ) => {
                self.state = state;
                self.begin_pan(screen, hit, s.viewport);
                Outcome::default()
            }
            // A second pointer-down mid-gesture is ignored.
            (state, _) => {
                self.state = state;
                Outcome::default()
            }
        }
    }

    fn moved(&mut self, screen: Point, s: Surface<'_>) -> Outcome {
        let threshold = s.config.interaction.drag_threshold;
        match &mut self.state {
            InteractionState::DraggingNode { drag, .. }
            | InteractionState::DraggingGroup { drag, .. } => {
                if drag.start.distance(screen) > threshold {
                    drag.moved = true;
                }
                let delta = s.viewport.model_delta(drag.start, screen);
                Outcome::show(ops::set_positions(s.diagram, &drag.positions(delta)))
            }
            InteractionState::Panning { start, moved, .. } => {
                if start.distance(screen) > threshold {
                    *moved = true;
                }
                s.viewport.pan_to(screen);
                Outcome::redraw()
            }
            _ => Outcome::default(),
        }
    }

    fn up(&mut self, screen: Point, s: Surface<'_>) -> Outcome {
        match std::mem::take(&mut self.state) {
            InteractionState::DraggingNode { node_id, drag } => {
                finish_drag(drag, Hit::Node(node_id), screen, s)
            }
            InteractionState::DraggingGroup { group, drag } => {
                finish_drag(drag, Hit::Group(group), screen, s)
            }
            InteractionState::Panning {
                resume, hit, moved, ..
            } => {
                s.viewport.end_pan();
                self.state = *resume;
                Outcome {
                    redraw: moved,
                    click: (!moved).then_some(hit),
                    ..Default::default()
                }
            }
            other => {
                self.state = other;
                Outcome::default()
            }
        }
    }

    /// Keyboard cancel: abort a drag or pan without committing, or step out of connect mode.
    pub fn escape(&mut self, s: Surface<'_>) -> Outcome {
        match std::mem::take(&mut self.state) {
            InteractionState::DraggingNode { drag, .. }
            | InteractionState::DraggingGroup { drag, .. } => {
                tracing::debug!("drag cancelled");
                Outcome::show(ops::set_positions(s.diagram, &drag.originals))
            }
            InteractionState::Panning { resume, .. } => {
                s.viewport.cancel_pan();
                self.state = *resume;
                Outcome::redraw()
            }
            InteractionState::ConnectSourceSelected { .. } => {
                self.state = InteractionState::ConnectArmed;
                Outcome::redraw()
            }
            InteractionState::ConnectArmed => Outcome {
                redraw: true,
                connect_mode: Some(false),
                ..Default::default()
            },
            InteractionState::Idle => Outcome::default(),
        }
    }

    /// Target for a detail popover, if the double-click landed on one and no drag is live.
    pub fn double_click(
        &self,
        screen: Point,
        diagram: &Diagram,
        viewport: &Viewport,
        config: &CanvasConfig,
    ) -> Option<Hit> {
        if self.state.is_real_drag() {
            return None;
        }
        let layout = Layout::compute(diagram, &config.layout);
        let hit = hit_test(diagram, &layout, viewport.screen_to_model(screen), config);
        hit.has_detail().then_some(hit)
    }

    /// Abort a live drag or pan before some other edit lands, keeping connect mode as it
    /// was. Returns the revision with dragged nodes back at their origins.
    pub fn cancel_gesture(&mut self, viewport: &mut Viewport, diagram: &Diagram) -> Option<Diagram> {
        match std::mem::take(&mut self.state) {
            InteractionState::DraggingNode { drag, .. }
            | InteractionState::DraggingGroup { drag, .. } => {
                Some(ops::set_positions(diagram, &drag.originals))
            }
            InteractionState::Panning { resume, .. } => {
                viewport.cancel_pan();
                self.state = *resume;
                None
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Drop any live gesture, restoring dragged nodes. Used when edit mode ends.
    pub fn reset(&mut self, viewport: &mut Viewport, diagram: &Diagram) -> Option<Diagram> {
        match std::mem::take(&mut self.state) {
            InteractionState::DraggingNode { drag, .. }
            | InteractionState::DraggingGroup { drag, .. } => {
                Some(ops::set_positions(diagram, &drag.originals))
            }
            InteractionState::Panning { .. } => {
                viewport.cancel_pan();
                None
            }
            _ => None,
        }
    }
}

fn finish_drag(drag: Drag, hit: Hit, screen: Point, s: Surface<'_>) -> Outcome {
    if drag.moved {
        let delta = s.viewport.model_delta(drag.start, screen);
        let next = ops::set_positions(s.diagram, &drag.positions(delta));
        tracing::debug!(nodes = drag.originals.len(), "drag committed");
        Outcome {
            diagram: Some(next),
            commit: true,
            redraw: true,
            ..Default::default()
        }
    } else {
        Outcome {
            diagram: Some(ops::set_positions(s.diagram, &drag.originals)),
            redraw: true,
            click: Some(hit),
            ..Default::default()
        }
    }
}
