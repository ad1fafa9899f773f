//! Application state for one open diagram, driven by discrete events.
//!
//! [`Editor::update`] is the single entry point for user input. It routes to the
//! interaction state machine or the mutation operations, commits to history, and returns
//! the effects the shell has to act on (redraw, popovers, confirmation prompts).

use serde::Serialize;

use crate::config::CanvasConfig;
use crate::error::StorageError;
use crate::history::HistoryManager;
use crate::interaction::{Hit, Interaction, Outcome, PointerEvent, Surface};
use crate::layout::{content_bounds, Layout};
use crate::ops::{self, EdgePatch, NodePatch, NodeSpec};
use crate::storage::{DiagramStore, SavedRecord};
use crate::viewport::Viewport;
use crate::{Diagram, LayoutMode, OpError, Point};

#[derive(Debug, Clone)]
pub enum EditorEvent {
    EnterEditMode,
    LeaveEditMode { discard: bool },
    Undo,
    Redo,
    ToggleConnectMode,
    Pointer(PointerEvent),
    Wheel { screen: Point, direction: f64 },
    DoubleClick { screen: Point },
    Escape,
    FitToContent { width: f64, height: f64 },
    AddNode(NodeSpec),
    UpdateNode(String, NodePatch),
    UpdateEdge(String, EdgePatch),
    DeleteNode(String),
    DeleteEdge(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "effect")]
pub enum Effect {
    Redraw,
    /// A revision was pushed onto the history.
    Committed,
    Clicked { hit: Hit },
    OpenDetail { target: Hit, screen: Point },
    ConnectModeChanged { on: bool },
    /// Leaving edit mode would drop unsaved changes; ask first.
    ConfirmDiscard,
    EditModeChanged { editing: bool },
}

#[derive(Debug, Clone)]
pub struct Editor {
    diagram: Diagram,
    history: Option<HistoryManager>,
    pub viewport: Viewport,
    interaction: Interaction,
    config: CanvasConfig,
    status: Option<String>,
}

impl Editor {
    pub fn new(diagram: Diagram, config: CanvasConfig) -> Self {
        let limits = match diagram.layout_mode() {
            LayoutMode::Zones => config.canvas,
            LayoutMode::Blueprint => config.blueprint,
        };
        Self {
            diagram,
            history: None,
            viewport: Viewport::new(limits),
            interaction: Interaction::default(),
            config,
            status: None,
        }
    }

    /// The revision currently on screen, including an uncommitted drag preview.
    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn layout(&self) -> Layout {
        Layout::compute(&self.diagram, &self.config.layout)
    }

    pub fn is_editing(&self) -> bool {
        self.history.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.as_ref().is_some_and(|h| h.is_dirty())
    }

    pub fn history(&self) -> Option<&HistoryManager> {
        self.history.as_ref()
    }

    pub fn connect_mode(&self) -> bool {
        self.interaction.connect_mode()
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Transient user-visible message, set when a save or load fails.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn update(&mut self, event: EditorEvent) -> Vec<Effect> {
        match event {
            EditorEvent::EnterEditMode => {
                if self.history.is_some() {
                    return vec![];
                }
                self.history = Some(HistoryManager::begin(self.diagram.clone()));
                tracing::debug!("entered edit mode");
                vec![Effect::EditModeChanged { editing: true }, Effect::Redraw]
            }
            EditorEvent::LeaveEditMode { discard } => self.leave_edit_mode(discard),
            EditorEvent::Undo => self.step_history(|h| h.undo().cloned()),
            EditorEvent::Redo => self.step_history(|h| h.redo().cloned()),
            EditorEvent::ToggleConnectMode => {
                if !self.is_editing() {
                    return vec![];
                }
                let on = !self.interaction.connect_mode();
                if self.interaction.set_connect_mode(on) {
                    vec![Effect::ConnectModeChanged { on }, Effect::Redraw]
                } else {
                    vec![]
                }
            }
            EditorEvent::Pointer(event) => {
                let editing = self.is_editing();
                let outcome = self.interaction.pointer(
                    event,
                    Surface {
                        diagram: &self.diagram,
                        viewport: &mut self.viewport,
                        config: &self.config,
                        editing,
                    },
                );
                self.apply(outcome)
            }
            EditorEvent::Wheel { screen, direction } => {
                self.viewport.zoom_at(screen, direction);
                vec![Effect::Redraw]
            }
            EditorEvent::DoubleClick { screen } => self
                .interaction
                .double_click(screen, &self.diagram, &self.viewport, &self.config)
                .map(|target| vec![Effect::OpenDetail { target, screen }])
                .unwrap_or_default(),
            EditorEvent::Escape => {
                let editing = self.is_editing();
                let outcome = self.interaction.escape(Surface {
                    diagram: &self.diagram,
                    viewport: &mut self.viewport,
                    config: &self.config,
                    editing,
                });
                self.apply(outcome)
            }
            EditorEvent::FitToContent { width, height } => {
                match content_bounds(&self.diagram, &self.config.layout) {
                    Some(content) => {
                        self.viewport.fit_to(content, width, height);
                        vec![Effect::Redraw]
                    }
                    None => vec![],
                }
            }
            EditorEvent::AddNode(spec) => {
                let (grid, r) = (self.config.grid, self.config.layout.node_half_extent);
                self.mutate(|d| ops::add_node(d, spec, &grid, r).map(|(next, _)| next))
            }
            EditorEvent::UpdateNode(id, patch) => self.mutate(|d| ops::update_node(d, &id, patch)),
            EditorEvent::UpdateEdge(id, patch) => self.mutate(|d| ops::update_edge(d, &id, patch)),
            EditorEvent::DeleteNode(id) => self.mutate(|d| ops::delete_node(d, &id)),
            EditorEvent::DeleteEdge(id) => self.mutate(|d| ops::delete_edge(d, &id)),
        }
    }

    fn apply(&mut self, outcome: Outcome) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(next) = outcome.diagram {
            self.diagram = next;
        }
        if outcome.commit {
            self.commit();
            effects.push(Effect::Committed);
        }
        if let Some(hit) = outcome.click {
            effects.push(Effect::Clicked { hit });
        }
        if let Some(on) = outcome.connect_mode {
            effects.push(Effect::ConnectModeChanged { on });
        }
        if outcome.redraw {
            effects.push(Effect::Redraw);
        }
        effects
    }

    fn commit(&mut self) {
        if let Some(history) = &mut self.history {
            history.push(self.diagram.clone());
        }
    }

    /// Run one mutation operation in edit mode and commit its result. Failures leave
    /// the revision untouched.
    fn mutate(&mut self, op: impl FnOnce(&Diagram) -> Result<Diagram, OpError>) -> Vec<Effect> {
        if !self.is_editing() {
            tracing::debug!("ignoring mutation outside edit mode");
            return vec![];
        }
        let cancelled = self.cancel_gesture();
        match op(&self.diagram) {
            Ok(next) => {
                self.diagram = next;
                self.commit();
                vec![Effect::Committed, Effect::Redraw]
            }
            Err(e) => {
                tracing::debug!(error = %e, "mutation rejected");
                self.status = Some(e.to_string());
                if cancelled {
                    vec![Effect::Redraw]
                } else {
                    vec![]
                }
            }
        }
    }

    /// A drag preview is never committed by an unrelated edit: the gesture is cancelled
    /// and the edit applies to the positions history already holds.
    fn cancel_gesture(&mut self) -> bool {
        match self.interaction.cancel_gesture(&mut self.viewport, &self.diagram) {
            Some(restored) => {
                tracing::debug!("live drag cancelled by an edit");
                self.diagram = restored;
                true
            }
            None => false,
        }
    }

    fn step_history(
        &mut self,
        step: impl FnOnce(&mut HistoryManager) -> Option<Diagram>,
    ) -> Vec<Effect> {
        if !self.is_editing() {
            return vec![];
        }
        let cancelled = self.cancel_gesture();
        let Some(history) = &mut self.history else {
            return vec![];
        };
        match step(history) {
            Some(revision) => {
                self.diagram = revision;
                vec![Effect::Redraw]
            }
            None if cancelled => vec![Effect::Redraw],
            None => vec![],
        }
    }

    fn leave_edit_mode(&mut self, discard: bool) -> Vec<Effect> {
        let Some(history) = &self.history else {
            return vec![];
        };
        if history.is_dirty() && !discard {
            return vec![Effect::ConfirmDiscard];
        }
        let pristine = discard.then(|| history.pristine().clone());

        let mut effects = vec![Effect::EditModeChanged { editing: false }];
        let was_connecting = self.interaction.connect_mode();
        if let Some(restored) = self.interaction.reset(&mut self.viewport, &self.diagram) {
            self.diagram = restored;
        }
        if was_connecting {
            effects.push(Effect::ConnectModeChanged { on: false });
        }
        if let Some(pristine) = pristine {
            self.diagram = pristine;
        }
        self.history = None;
        tracing::debug!(discard, "left edit mode");
        effects.push(Effect::Redraw);
        effects
    }

    /// Persist the current revision. Failure keeps the changes dirty and sets a status
    /// message; there is no retry.
    pub fn save(&mut self, store: &dyn DiagramStore, id: &str) -> Result<SavedRecord, StorageError> {
        match store.save(id, &self.diagram) {
            Ok(record) => {
                if let Some(history) = &mut self.history {
                    history.mark_saved();
                }
                self.status = None;
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "save failed");
                self.status = Some(format!("Could not save: {e}"));
                Err(e)
            }
        }
    }

    /// Replace the open diagram with a template or saved diagram. History restarts.
    pub fn load(&mut self, store: &dyn DiagramStore, template_id: &str) -> Result<(), StorageError> {
        match store.load(template_id) {
            Ok(diagram) => {
                let editing = self.is_editing();
                *self = Editor::new(diagram, self.config.clone());
                if editing {
                    self.history = Some(HistoryManager::begin(self.diagram.clone()));
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(template_id, error = %e, "load failed");
                self.status = Some(format!("Could not load: {e}"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::pipeline;
    use crate::interaction::InteractionState;
    use crate::storage::FileStore;
    use crate::Zone;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn editor() -> Editor {
        Editor::new(pipeline(), CanvasConfig::default())
    }

    fn editing() -> Editor {
        let mut ed = editor();
        ed.update(EditorEvent::EnterEditMode);
        ed
    }

    fn drag(ed: &mut Editor, from: Point, to: Point) -> Vec<Effect> {
        ed.update(EditorEvent::Pointer(PointerEvent::Down(from)));
        ed.update(EditorEvent::Pointer(PointerEvent::Move(to)));
        ed.update(EditorEvent::Pointer(PointerEvent::Up(to)))
    }

    /// Store double whose saves always fail.
    struct Offline {
        attempts: RefCell<usize>,
    }

    impl DiagramStore for Offline {
        fn save(&self, id: &str, _: &Diagram) -> Result<SavedRecord, StorageError> {
            *self.attempts.borrow_mut() += 1;
            Err(StorageError::NotFound(id.to_string()))
        }

        fn load(&self, template_id: &str) -> Result<Diagram, StorageError> {
            Err(StorageError::NotFound(template_id.to_string()))
        }
    }

    #[test]
    fn edit_mode_seeds_a_clean_history() {
        let mut ed = editor();
        assert!(!ed.is_editing());
        let effects = ed.update(EditorEvent::EnterEditMode);
        assert_eq!(effects[0], Effect::EditModeChanged { editing: true });
        assert_eq!(ed.history().unwrap().len(), 1);
        assert!(!ed.is_dirty());
    }

    #[test]
    fn mutations_need_edit_mode() {
        let mut ed = editor();
        let effects = ed.update(EditorEvent::DeleteNode("oracle".to_string()));
        assert!(effects.is_empty());
        assert!(ed.diagram().node("oracle").is_some());
    }

    #[test]
    fn mutations_commit_and_undo() {
        let mut ed = editing();
        let effects = ed.update(EditorEvent::DeleteNode("bigquery".to_string()));
        assert_eq!(effects, vec![Effect::Committed, Effect::Redraw]);
        assert!(ed.is_dirty());
        ed.update(EditorEvent::AddNode(NodeSpec::new("Spanner", Zone::Cloud)));
        assert_eq!(ed.diagram().nodes.len(), 6);

        ed.update(EditorEvent::Undo);
        ed.update(EditorEvent::Undo);
        assert_eq!(ed.diagram(), &pipeline());
        assert!(!ed.is_dirty());
        ed.update(EditorEvent::Redo);
        assert!(ed.diagram().node("bigquery").is_none());
    }

    #[test]
    fn rejected_mutation_sets_status_only() {
        let mut ed = editing();
        let effects = ed.update(EditorEvent::DeleteEdge("e99".to_string()));
        assert!(effects.is_empty());
        assert_eq!(ed.status(), Some("edge 'e99' not found"));
        assert_eq!(ed.history().unwrap().len(), 1);
    }

    #[test]
    fn drag_commits_one_entry() {
        let mut ed = editing();
        let effects = drag(&mut ed, Point::new(100.0, 300.0), Point::new(100.0, 400.0));
        assert!(effects.contains(&Effect::Committed));
        assert_eq!(ed.history().unwrap().len(), 2);
        assert_eq!(ed.diagram().node("oracle").unwrap().y, 400.0);
    }

    #[test]
    fn click_reports_the_hit() {
        let mut ed = editing();
        let effects = drag(&mut ed, Point::new(100.0, 300.0), Point::new(101.0, 301.0));
        assert!(effects.contains(&Effect::Clicked { hit: Hit::Node("oracle".to_string()) }));
        assert!(!ed.is_dirty());
    }

    #[test]
    fn connect_is_single_shot() {
        let mut ed = editing();
        assert_eq!(
            ed.update(EditorEvent::ToggleConnectMode),
            vec![Effect::ConnectModeChanged { on: true }, Effect::Redraw]
        );
        ed.update(EditorEvent::Pointer(PointerEvent::Down(Point::new(100.0, 300.0))));
        let effects = ed.update(EditorEvent::Pointer(PointerEvent::Down(Point::new(800.0, 200.0))));
        assert!(effects.contains(&Effect::Committed));
        assert!(effects.contains(&Effect::ConnectModeChanged { on: false }));
        assert!(!ed.connect_mode());
        assert_eq!(ed.diagram().edges.len(), 6);
    }

    #[test]
    fn connect_mode_needs_edit_mode() {
        let mut ed = editor();
        assert!(ed.update(EditorEvent::ToggleConnectMode).is_empty());
        assert!(!ed.connect_mode());
    }

    #[test]
    fn leaving_dirty_edit_mode_asks_first() {
        let mut ed = editing();
        ed.update(EditorEvent::DeleteNode("oracle".to_string()));
        assert_eq!(
            ed.update(EditorEvent::LeaveEditMode { discard: false }),
            vec![Effect::ConfirmDiscard]
        );
        assert!(ed.is_editing());

        ed.update(EditorEvent::LeaveEditMode { discard: true });
        assert!(!ed.is_editing());
        assert_eq!(ed.diagram(), &pipeline());
    }

    #[test]
    fn leaving_clean_edit_mode_drops_connect_mode() {
        let mut ed = editing();
        ed.update(EditorEvent::ToggleConnectMode);
        let effects = ed.update(EditorEvent::LeaveEditMode { discard: false });
        assert!(effects.contains(&Effect::ConnectModeChanged { on: false }));
        assert_eq!(ed.interaction().state(), &InteractionState::Idle);
    }

    #[test]
    fn wheel_and_fit_move_the_viewport() {
        let mut ed = editor();
        ed.update(EditorEvent::Wheel { screen: Point::new(10.0, 10.0), direction: 1.0 });
        assert!((ed.viewport.zoom - 1.1).abs() < 1e-12);
        assert_eq!(
            ed.update(EditorEvent::FitToContent { width: 1200.0, height: 800.0 }),
            vec![Effect::Redraw]
        );
        assert!(ed.viewport.zoom <= 1.0);
    }

    #[test]
    fn double_click_opens_detail_in_view_mode() {
        let mut ed = editor();
        let screen = Point::new(600.0, 300.0);
        assert_eq!(
            ed.update(EditorEvent::DoubleClick { screen }),
            vec![Effect::OpenDetail { target: Hit::Node("bigquery".to_string()), screen }]
        );
    }

    #[test]
    fn failed_save_keeps_dirty_and_does_not_retry() {
        let mut ed = editing();
        ed.update(EditorEvent::DeleteNode("oracle".to_string()));
        let store = Offline { attempts: RefCell::new(0) };
        assert!(ed.save(&store, "x").is_err());
        assert_eq!(*store.attempts.borrow(), 1);
        assert!(ed.is_dirty());
        assert!(ed.status().unwrap().starts_with("Could not save"));
    }

    #[test]
    fn save_and_load_through_a_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut ed = editing();
        ed.update(EditorEvent::DeleteNode("oracle".to_string()));
        let record = ed.save(&store, "cdc").unwrap();
        assert_eq!(record.nodes, 5);
        assert!(!ed.is_dirty());

        let mut other = editor();
        other.load(&store, "cdc").unwrap();
        assert!(other.diagram().node("oracle").is_none());
        assert!(other.load(&store, "missing").is_err());
        assert!(other.status().is_some());
    }

    #[test]
    fn edits_during_a_drag_cancel_the_preview() {
        let mut ed = editing();
        ed.update(EditorEvent::Pointer(PointerEvent::Down(Point::new(100.0, 300.0))));
        ed.update(EditorEvent::Pointer(PointerEvent::Move(Point::new(200.0, 300.0))));
        assert_eq!(ed.diagram().node("oracle").unwrap().x, 200.0);

        let patch = NodePatch {
            name: Some("BQ".to_string()),
            ..Default::default()
        };
        ed.update(EditorEvent::UpdateNode("bigquery".to_string(), patch));
        ed.update(EditorEvent::Escape);

        let committed = ed.history().unwrap().current();
        assert_eq!(ed.diagram(), committed);
        assert_eq!(committed.node("oracle").unwrap().x, 100.0);
        assert_eq!(committed.node("bigquery").unwrap().name, "BQ");
        assert_eq!(ed.interaction().state(), &InteractionState::Idle);
    }

    #[test]
    fn undo_during_a_drag_restores_committed_positions() {
        let mut ed = editing();
        ed.update(EditorEvent::DeleteNode("analysts".to_string()));
        ed.update(EditorEvent::Pointer(PointerEvent::Down(Point::new(100.0, 300.0))));
        ed.update(EditorEvent::Pointer(PointerEvent::Move(Point::new(200.0, 300.0))));
        ed.update(EditorEvent::Undo);
        assert_eq!(ed.diagram(), &pipeline());
        assert_eq!(ed.interaction().state(), &InteractionState::Idle);
        ed.update(EditorEvent::Pointer(PointerEvent::Up(Point::new(200.0, 300.0))));
        assert_eq!(ed.history().unwrap().len(), 2);
    }

    #[test]
    fn undo_past_a_save_asks_before_leaving() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut ed = editing();
        ed.update(EditorEvent::DeleteNode("oracle".to_string()));
        ed.save(&store, "cdc").unwrap();
        ed.update(EditorEvent::Undo);
        assert!(ed.is_dirty());
        assert_eq!(
            ed.update(EditorEvent::LeaveEditMode { discard: false }),
            vec![Effect::ConfirmDiscard]
        );
        ed.update(EditorEvent::Redo);
        assert!(!ed.is_dirty());
        assert_eq!(ed.diagram(), &store.read("cdc").unwrap());
    }
}
