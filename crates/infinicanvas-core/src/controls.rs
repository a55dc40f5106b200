//! Toolbar and canvas control actions.

use crate::state::StateResult;
use crate::store::CanvasStore;
use serde::{Deserialize, Serialize};

/// Buttons exposed by the toolbar and the canvas controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolbarAction {
    /// Remove the last freehand stroke.
    Undo,
    Redo,
    /// Clear all freehand strokes.
    Reset,
    /// Return the camera to 100% at the origin.
    ResetZoom,
    DeleteSelected,
    BringToFront,
    SendToBack,
    DeselectAll,
    /// Serialise the canvas to JSON.
    Export,
}

impl ToolbarAction {
    /// Whether the action only makes sense with an image selected.
    pub fn needs_selection(self) -> bool {
        matches!(
            self,
            ToolbarAction::DeleteSelected | ToolbarAction::BringToFront | ToolbarAction::SendToBack
        )
    }
}

/// What applying an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// Nothing to act on.
    Ignored,
    Exported(String),
}

/// Apply a toolbar action to the store.
pub fn apply_action(store: &mut CanvasStore, action: ToolbarAction) -> StateResult<ActionOutcome> {
    let selected = store.selected_image_id().map(str::to_string);
    if action.needs_selection() && selected.is_none() {
        return Ok(ActionOutcome::Ignored);
    }

    let applied = match action {
        ToolbarAction::Undo => store.sketch().can_undo() && store.sketch_mut().undo(),
        ToolbarAction::Redo => store.sketch().can_redo() && store.sketch_mut().redo(),
        ToolbarAction::Reset => {
            store.sketch_mut().reset();
            true
        }
        ToolbarAction::ResetZoom => {
            store.camera_mut().reset();
            true
        }
        ToolbarAction::DeselectAll => {
            store.set_selected_image_id(None);
            true
        }
        ToolbarAction::DeleteSelected => selected
            .as_deref()
            .is_some_and(|id| store.remove_image(id).is_some()),
        ToolbarAction::BringToFront => selected
            .as_deref()
            .is_some_and(|id| store.bring_to_front(id)),
        ToolbarAction::SendToBack => selected.as_deref().is_some_and(|id| store.send_to_back(id)),
        ToolbarAction::Export => {
            let json = store.snapshot().to_json()?;
            log::info!("Exported canvas ({} bytes)", json.len());
            return Ok(ActionOutcome::Exported(json));
        }
    };

    Ok(if applied {
        ActionOutcome::Applied
    } else {
        ActionOutcome::Ignored
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ImageElement;
    use crate::state::CanvasState;
    use kurbo::{Point, Vec2};

    fn store_with_images() -> CanvasStore {
        let mut store = CanvasStore::new();
        store
            .add_image(ImageElement::new("a", "file:///a", 0.0, 0.0).with_z_index(1))
            .unwrap();
        store
            .add_image(ImageElement::new("b", "file:///b", 0.0, 0.0).with_z_index(2))
            .unwrap();
        store
    }

    #[test]
    fn test_selection_actions_ignored_without_selection() {
        let mut store = store_with_images();
        for action in [
            ToolbarAction::DeleteSelected,
            ToolbarAction::BringToFront,
            ToolbarAction::SendToBack,
        ] {
            assert_eq!(apply_action(&mut store, action).unwrap(), ActionOutcome::Ignored);
        }
        assert_eq!(store.images().len(), 2);
    }

    #[test]
    fn test_delete_selected() {
        let mut store = store_with_images();
        store.set_selected_image_id(Some("a".into()));
        assert_eq!(
            apply_action(&mut store, ToolbarAction::DeleteSelected).unwrap(),
            ActionOutcome::Applied
        );
        assert!(store.image("a").is_none());
        assert!(store.selected_image_id().is_none());
    }

    #[test]
    fn test_layer_ordering_actions() {
        let mut store = store_with_images();
        store.set_selected_image_id(Some("a".into()));
        apply_action(&mut store, ToolbarAction::BringToFront).unwrap();
        assert_eq!(store.image("a").unwrap().z_index, 3);
        apply_action(&mut store, ToolbarAction::SendToBack).unwrap();
        assert_eq!(store.image("a").unwrap().z_index, -1);
        apply_action(&mut store, ToolbarAction::DeselectAll).unwrap();
        assert!(store.selected_image_id().is_none());
    }

    #[test]
    fn test_undo_redo_reset_strokes() {
        let mut store = CanvasStore::new();
        assert_eq!(apply_action(&mut store, ToolbarAction::Undo).unwrap(), ActionOutcome::Ignored);

        let sketch = store.sketch_mut();
        sketch.begin_stroke(Point::new(0.0, 0.0));
        sketch.extend_stroke(Point::new(4.0, 4.0));
        sketch.end_stroke();

        assert_eq!(apply_action(&mut store, ToolbarAction::Undo).unwrap(), ActionOutcome::Applied);
        assert!(store.sketch().is_empty());
        assert_eq!(apply_action(&mut store, ToolbarAction::Redo).unwrap(), ActionOutcome::Applied);
        assert_eq!(store.sketch().strokes().len(), 1);

        apply_action(&mut store, ToolbarAction::Reset).unwrap();
        assert!(store.sketch().is_empty());
        assert!(!store.sketch().can_redo());
    }

    #[test]
    fn test_reset_zoom() {
        let mut store = CanvasStore::new();
        store.camera_mut().set_zoom(3.0);
        store.camera_mut().pan(Vec2::new(10.0, 10.0));
        apply_action(&mut store, ToolbarAction::ResetZoom).unwrap();
        assert!((store.camera().zoom - 1.0).abs() < f64::EPSILON);
        assert_eq!(store.camera().offset, Vec2::ZERO);
    }

    #[test]
    fn test_export() {
        let mut store = store_with_images();
        let ActionOutcome::Exported(json) = apply_action(&mut store, ToolbarAction::Export).unwrap()
        else {
            panic!("expected export");
        };
        let state = CanvasState::from_json(&json).unwrap();
        assert_eq!(state.elements.len(), 2);
        assert!(json.contains('\n'));
    }
}
