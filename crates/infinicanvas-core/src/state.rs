//! Persisted canvas document and the actions that edit it.
//!
//! [`CanvasState`] is the JSON document written to local storage and to the
//! backend. [`CanvasAction`] is the closed set of edits it accepts; every edit
//! goes through [`CanvasState::apply`] so the id-uniqueness invariant is
//! checked in one place.

use crate::camera::{MAX_ZOOM, MIN_ZOOM};
use crate::elements::{CanvasElement, ElementId, GroupElement};
use crate::geometry::calculate_bounding_box;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while editing or loading a canvas document.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Element already exists: {0}")]
    DuplicateId(ElementId),
    #[error("Element not found: {0}")]
    NotFound(ElementId),
    #[error("Element {0} is not a group")]
    NotAGroup(ElementId),
    #[error("Element {0} cannot be resized")]
    NotResizable(ElementId),
    #[error("Invalid size {width}x{height}")]
    InvalidSize { width: f64, height: f64 },
    #[error("Invalid scale {0}")]
    InvalidScale(f64),
    #[error("A group needs at least two existing elements")]
    GroupTooSmall,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document edits.
pub type StateResult<T> = Result<T, StateError>;

fn default_scale() -> f64 {
    1.0
}

/// Canvas-wide persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    #[serde(default)]
    pub elements: Vec<CanvasElement>,
    #[serde(default)]
    pub selected_element_ids: Vec<ElementId>,
    #[serde(default)]
    pub canvas_offset: Vec2,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new()
    }
}

/// An edit to a [`CanvasState`].
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasAction {
    AddElement(CanvasElement),
    /// Replace the element with the given id.
    UpdateElement {
        id: ElementId,
        element: CanvasElement,
    },
    DeleteElement { id: ElementId },
    /// Select an element; `additive` keeps the existing selection.
    SelectElement { id: ElementId, additive: bool },
    DeselectAll,
    MoveElement { id: ElementId, delta: Vec2 },
    ResizeElement {
        id: ElementId,
        width: f64,
        height: f64,
    },
    GroupElements {
        group_id: ElementId,
        element_ids: Vec<ElementId>,
    },
    UngroupElements { group_id: ElementId },
    BringToFront { id: ElementId },
    SendToBack { id: ElementId },
    SetCanvasOffset(Vec2),
    SetCanvasScale(f64),
}

impl CanvasState {
    /// Create an empty document at the default view.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            selected_element_ids: Vec::new(),
            canvas_offset: Vec2::ZERO,
            scale: 1.0,
        }
    }

    /// Serialize the document to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a document from JSON, rejecting duplicate element ids.
    pub fn from_json(json: &str) -> StateResult<Self> {
        let state: Self = serde_json::from_str(json)?;
        state.ensure_unique_ids()?;
        Ok(state)
    }

    /// Check that no two elements share an id.
    pub fn ensure_unique_ids(&self) -> StateResult<()> {
        let mut seen = HashSet::with_capacity(self.elements.len());
        for element in &self.elements {
            if !seen.insert(element.id()) {
                return Err(StateError::DuplicateId(element.id().to_string()));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.iter().any(|e| e.id() == id)
    }

    pub fn element(&self, id: &str) -> Option<&CanvasElement> {
        self.elements.iter().find(|e| e.id() == id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut CanvasElement> {
        self.elements.iter_mut().find(|e| e.id() == id)
    }

    /// Elements ordered back to front.
    pub fn elements_by_z(&self) -> Vec<&CanvasElement> {
        let mut sorted: Vec<_> = self.elements.iter().collect();
        sorted.sort_by_key(|e| e.z_index());
        sorted
    }

    /// Topmost element under a canvas-space point.
    pub fn element_at(&self, point: Point, tolerance: f64) -> Option<&CanvasElement> {
        self.elements
            .iter()
            .filter(|e| e.hit_test(point, tolerance))
            .max_by_key(|e| e.z_index())
    }

    /// Highest z-index in the document, counting 0 as a floor.
    pub fn max_z_index(&self) -> i64 {
        self.elements.iter().map(CanvasElement::z_index).fold(0, i64::max)
    }

    /// Lowest z-index in the document, counting 0 as a ceiling.
    pub fn min_z_index(&self) -> i64 {
        self.elements.iter().map(CanvasElement::z_index).fold(0, i64::min)
    }

    /// Resolve a connector's full route through the centres of its endpoints.
    pub fn connector_route(&self, id: &str) -> Option<Vec<Point>> {
        let CanvasElement::Connector(connector) = self.element(id)? else {
            return None;
        };
        let source = self.element(&connector.source_id)?.bounds().center();
        let target = self.element(&connector.target_id)?.bounds().center();
        Some(connector.route(source, target))
    }

    /// Apply an edit.
    pub fn apply(&mut self, action: CanvasAction) -> StateResult<()> {
        match action {
            CanvasAction::AddElement(element) => {
                if self.contains(element.id()) {
                    return Err(StateError::DuplicateId(element.id().to_string()));
                }
                self.elements.push(element);
            }
            CanvasAction::UpdateElement { id, element } => {
                if element.id() != id && self.contains(element.id()) {
                    return Err(StateError::DuplicateId(element.id().to_string()));
                }
                let new_id = element.id().to_string();
                let slot = self
                    .element_mut(&id)
                    .ok_or_else(|| StateError::NotFound(id.clone()))?;
                *slot = element;
                if new_id != id {
                    self.rename_references(&id, &new_id);
                }
            }
            CanvasAction::DeleteElement { id } => {
                let before = self.elements.len();
                self.elements.retain(|e| e.id() != id);
                if self.elements.len() == before {
                    return Err(StateError::NotFound(id));
                }
                self.selected_element_ids.retain(|s| *s != id);
                for element in &mut self.elements {
                    if let Some(group) = element.as_group_mut() {
                        group.element_ids.retain(|m| *m != id);
                    }
                }
            }
            CanvasAction::SelectElement { id, additive } => {
                if !self.contains(&id) {
                    return Err(StateError::NotFound(id));
                }
                if !additive {
                    self.selected_element_ids.clear();
                }
                if !self.selected_element_ids.contains(&id) {
                    self.selected_element_ids.push(id);
                }
            }
            CanvasAction::DeselectAll => self.selected_element_ids.clear(),
            CanvasAction::MoveElement { id, delta } => {
                let members = match self.element(&id) {
                    Some(CanvasElement::Group(g)) => g.element_ids.clone(),
                    Some(_) => Vec::new(),
                    None => return Err(StateError::NotFound(id)),
                };
                for element in &mut self.elements {
                    if element.id() == id || members.iter().any(|m| m == element.id()) {
                        element.translate(delta);
                    }
                }
            }
            CanvasAction::ResizeElement { id, width, height } => {
                if !(width > 0.0 && height > 0.0) {
                    return Err(StateError::InvalidSize { width, height });
                }
                match self.element_mut(&id) {
                    Some(CanvasElement::Image(img)) => {
                        img.width = width;
                        img.height = height;
                    }
                    Some(CanvasElement::Group(group)) => {
                        group.width = width;
                        group.height = height;
                    }
                    Some(_) => return Err(StateError::NotResizable(id)),
                    None => return Err(StateError::NotFound(id)),
                }
            }
            CanvasAction::GroupElements {
                group_id,
                element_ids,
            } => {
                if self.contains(&group_id) {
                    return Err(StateError::DuplicateId(group_id));
                }
                let mut members: Vec<ElementId> = Vec::with_capacity(element_ids.len());
                for id in element_ids {
                    if !self.contains(&id) {
                        return Err(StateError::NotFound(id));
                    }
                    if !members.contains(&id) {
                        members.push(id);
                    }
                }
                if members.len() < 2 {
                    return Err(StateError::GroupTooSmall);
                }
                let rect = calculate_bounding_box(
                    members
                        .iter()
                        .filter_map(|id| self.element(id))
                        .map(CanvasElement::bounds),
                );
                let z_index = self.max_z_index() + 1;
                let mut group = GroupElement::new(group_id, members, rect);
                group.z_index = z_index;
                self.elements.push(CanvasElement::Group(group));
            }
            CanvasAction::UngroupElements { group_id } => {
                match self.element(&group_id) {
                    Some(CanvasElement::Group(_)) => {}
                    Some(_) => return Err(StateError::NotAGroup(group_id)),
                    None => return Err(StateError::NotFound(group_id)),
                }
                self.elements.retain(|e| e.id() != group_id);
                self.selected_element_ids.retain(|s| *s != group_id);
            }
            CanvasAction::BringToFront { id } => {
                let z_index = self.max_z_index() + 1;
                self.element_mut(&id)
                    .ok_or_else(|| StateError::NotFound(id.clone()))?
                    .set_z_index(z_index);
            }
            CanvasAction::SendToBack { id } => {
                let z_index = self.min_z_index() - 1;
                self.element_mut(&id)
                    .ok_or_else(|| StateError::NotFound(id.clone()))?
                    .set_z_index(z_index);
            }
            CanvasAction::SetCanvasOffset(offset) => self.canvas_offset = offset,
            CanvasAction::SetCanvasScale(scale) => {
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(StateError::InvalidScale(scale));
                }
                self.scale = scale.clamp(MIN_ZOOM, MAX_ZOOM);
            }
        }
        Ok(())
    }

    fn rename_references(&mut self, old: &str, new: &str) {
        for selected in &mut self.selected_element_ids {
            if selected == old {
                *selected = new.to_string();
            }
        }
        for element in &mut self.elements {
            match element {
                CanvasElement::Group(group) => {
                    for member in &mut group.element_ids {
                        if member == old {
                            *member = new.to_string();
                        }
                    }
                }
                CanvasElement::Connector(connector) => {
                    if connector.source_id == old {
                        connector.source_id = new.to_string();
                    }
                    if connector.target_id == old {
                        connector.target_id = new.to_string();
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ConnectorElement, ImageElement};

    fn image(id: &str, x: f64, z: i64) -> CanvasElement {
        ImageElement::new(id, "file:///img.png", x, 0.0)
            .with_size(100.0, 100.0)
            .with_z_index(z)
            .into()
    }

    fn state_with(elements: Vec<CanvasElement>) -> CanvasState {
        let mut state = CanvasState::new();
        for e in elements {
            state.apply(CanvasAction::AddElement(e)).unwrap();
        }
        state
    }

    #[test]
    fn test_json_field_names() {
        let state = state_with(vec![image("a", 0.0, 1)]);
        let value: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        assert!(value.get("elements").is_some());
        assert!(value.get("selectedElementIds").is_some());
        assert_eq!(value["canvasOffset"]["x"], 0.0);
        assert_eq!(value["scale"], 1.0);
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let mut state = state_with(vec![image("a", 0.0, 1)]);
        state.elements.push(image("a", 10.0, 2));
        let json = state.to_json().unwrap();
        assert!(matches!(
            CanvasState::from_json(&json),
            Err(StateError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_from_json_defaults() {
        let state = CanvasState::from_json("{}").unwrap();
        assert!(state.is_empty());
        assert!((state.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let mut state = state_with(vec![image("a", 0.0, 1)]);
        let result = state.apply(CanvasAction::AddElement(image("a", 5.0, 1)));
        assert!(matches!(result, Err(StateError::DuplicateId(_))));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_delete_clears_selection_and_group_membership() {
        let mut state = state_with(vec![image("a", 0.0, 1), image("b", 200.0, 2)]);
        state
            .apply(CanvasAction::GroupElements {
                group_id: "g".into(),
                element_ids: vec!["a".into(), "b".into()],
            })
            .unwrap();
        state
            .apply(CanvasAction::SelectElement {
                id: "a".into(),
                additive: false,
            })
            .unwrap();
        state.apply(CanvasAction::DeleteElement { id: "a".into() }).unwrap();

        assert!(state.selected_element_ids.is_empty());
        let group = state.element("g").and_then(CanvasElement::as_group).unwrap();
        assert_eq!(group.element_ids, vec!["b".to_string()]);
    }

    #[test]
    fn test_select_additive() {
        let mut state = state_with(vec![image("a", 0.0, 1), image("b", 200.0, 2)]);
        state
            .apply(CanvasAction::SelectElement {
                id: "a".into(),
                additive: false,
            })
            .unwrap();
        state
            .apply(CanvasAction::SelectElement {
                id: "b".into(),
                additive: true,
            })
            .unwrap();
        assert_eq!(state.selected_element_ids.len(), 2);
        state
            .apply(CanvasAction::SelectElement {
                id: "a".into(),
                additive: false,
            })
            .unwrap();
        assert_eq!(state.selected_element_ids, vec!["a".to_string()]);
        state.apply(CanvasAction::DeselectAll).unwrap();
        assert!(state.selected_element_ids.is_empty());
    }

    #[test]
    fn test_bring_to_front_and_send_to_back() {
        let mut state = state_with(vec![
            image("a", 0.0, 5),
            image("b", 0.0, 9),
            image("c", 0.0, 2),
        ]);
        state.apply(CanvasAction::BringToFront { id: "c".into() }).unwrap();
        assert_eq!(state.element("c").unwrap().z_index(), 10);

        state.apply(CanvasAction::SendToBack { id: "b".into() }).unwrap();
        assert_eq!(state.element("b").unwrap().z_index(), -1);
        assert_eq!(state.elements_by_z()[0].id(), "b");
    }

    #[test]
    fn test_move_group_moves_members() {
        let mut state = state_with(vec![image("a", 0.0, 1), image("b", 200.0, 2)]);
        state
            .apply(CanvasAction::GroupElements {
                group_id: "g".into(),
                element_ids: vec!["a".into(), "b".into()],
            })
            .unwrap();
        let group = state.element("g").unwrap();
        assert_eq!(group.bounds(), kurbo::Rect::new(0.0, 0.0, 300.0, 100.0));
        assert_eq!(group.z_index(), 3);

        state
            .apply(CanvasAction::MoveElement {
                id: "g".into(),
                delta: Vec2::new(10.0, 20.0),
            })
            .unwrap();
        assert_eq!(state.element("a").unwrap().position(), Point::new(10.0, 20.0));
        assert_eq!(state.element("b").unwrap().position(), Point::new(210.0, 20.0));
        assert_eq!(state.element("g").unwrap().position(), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_group_requires_two_members() {
        let mut state = state_with(vec![image("a", 0.0, 1)]);
        let result = state.apply(CanvasAction::GroupElements {
            group_id: "g".into(),
            element_ids: vec!["a".into(), "a".into()],
        });
        assert!(matches!(result, Err(StateError::GroupTooSmall)));
    }

    #[test]
    fn test_ungroup_keeps_members() {
        let mut state = state_with(vec![image("a", 0.0, 1), image("b", 200.0, 2)]);
        state
            .apply(CanvasAction::GroupElements {
                group_id: "g".into(),
                element_ids: vec!["a".into(), "b".into()],
            })
            .unwrap();
        state
            .apply(CanvasAction::UngroupElements {
                group_id: "g".into(),
            })
            .unwrap();
        assert_eq!(state.len(), 2);
        assert!(matches!(
            state.apply(CanvasAction::UngroupElements {
                group_id: "a".into(),
            }),
            Err(StateError::NotAGroup(_))
        ));
    }

    #[test]
    fn test_resize_validation() {
        let mut state = state_with(vec![image("a", 0.0, 1)]);
        assert!(matches!(
            state.apply(CanvasAction::ResizeElement {
                id: "a".into(),
                width: 0.0,
                height: 10.0,
            }),
            Err(StateError::InvalidSize { .. })
        ));
        state
            .apply(CanvasAction::ResizeElement {
                id: "a".into(),
                width: 40.0,
                height: 30.0,
            })
            .unwrap();
        let img = state.element("a").and_then(CanvasElement::as_image).unwrap();
        assert!((img.width - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scale_clamped() {
        let mut state = CanvasState::new();
        state.apply(CanvasAction::SetCanvasScale(50.0)).unwrap();
        assert!((state.scale - MAX_ZOOM).abs() < f64::EPSILON);
        assert!(state.apply(CanvasAction::SetCanvasScale(-1.0)).is_err());
    }

    #[test]
    fn test_element_at_prefers_highest_z() {
        let state = state_with(vec![image("low", 0.0, 1), image("high", 50.0, 7)]);
        let hit = state.element_at(Point::new(75.0, 50.0), 0.0).unwrap();
        assert_eq!(hit.id(), "high");
        assert!(state.element_at(Point::new(500.0, 500.0), 0.0).is_none());
    }

    #[test]
    fn test_update_renames_references() {
        let mut state = state_with(vec![image("a", 0.0, 1), image("b", 200.0, 2)]);
        state
            .apply(CanvasAction::AddElement(CanvasElement::Connector(ConnectorElement::new(
                "c", "a", "b",
            ))))
            .unwrap();
        state
            .apply(CanvasAction::UpdateElement {
                id: "a".into(),
                element: image("a2", 0.0, 1),
            })
            .unwrap();
        let route = state.connector_route("c").unwrap();
        assert_eq!(route.first(), Some(&Point::new(50.0, 50.0)));
        assert_eq!(route.last(), Some(&Point::new(250.0, 50.0)));

        let clash = state.apply(CanvasAction::UpdateElement {
            id: "a2".into(),
            element: image("b", 0.0, 1),
        });
        assert!(matches!(clash, Err(StateError::DuplicateId(_))));
    }
}
