//! Semantic validation of a resolved change list (C2)
//!
//! Runs after the resolver, before anything is enqueued. Walks the batch in
//! order, tracking what earlier changes will have created, and checks each
//! change against both that running state and the model snapshot.

use std::collections::{HashMap, HashSet};

use archihub_core_model::{Snapshot, relationship_identity_key};
use archihub_core_types::{
    AccessVariant, ElementId, ElementType, HubError, RelationshipType, ViewId,
    allowed_relationship, self_loop_allowed,
};
use serde::Serialize;

use crate::bom::Change;
use crate::options::{ApplyOptions, DuplicateStrategy};

/// One semantic rule failure, reported with its change position
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub change_index: usize,
    pub op: String,
    pub cause: String,
    /// Duplicate hit under duplicateStrategy=error maps to 409, not 400
    #[serde(skip)]
    pub is_conflict: bool,
}

impl Violation {
    fn new(index: usize, op: &str, cause: impl Into<String>) -> Self {
        Self {
            change_index: index,
            op: op.to_string(),
            cause: cause.into(),
            is_conflict: false,
        }
    }

    fn conflict(index: usize, op: &str, cause: impl Into<String>) -> Self {
        Self {
            is_conflict: true,
            ..Self::new(index, op, cause)
        }
    }

    pub fn into_error(self) -> HubError {
        if self.is_conflict {
            HubError::Conflict(format!(
                "change {} ({}): {}",
                self.change_index, self.op, self.cause
            ))
        } else {
            HubError::Validation {
                change_index: self.change_index,
                op: self.op,
                cause: self.cause,
            }
        }
    }
}

/// What earlier changes in the batch will have created by execution time
#[derive(Default)]
struct BatchState {
    /// tempId → element type
    elements: HashMap<String, ElementType>,
    /// tempId → (type, source ref, target ref, access, strength)
    relationships: HashMap<String, (RelationshipType, String, String, AccessVariant, Option<String>)>,
    views: HashSet<String>,
    folders: HashSet<String>,
    /// visual tempId → (view ref, element ref); notes/groups map to None
    visuals: HashMap<String, (String, Option<String>)>,
    element_keys: HashSet<String>,
    relationship_keys: HashSet<String>,
    /// (view ref, relationship ref, source visual, target visual)
    connection_triples: HashSet<(String, String, String, String)>,
}

/// Validate the whole batch; returns every violation found
pub fn validate(
    changes: &[Change],
    snapshot: &Snapshot,
    options: &ApplyOptions,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut state = BatchState::default();
    let mut declared_temp_ids: HashSet<&str> = HashSet::new();
    let model_rel_keys = snapshot.relationship_keys();

    for (index, change) in changes.iter().enumerate() {
        if let Some(temp_id) = change.declared_temp_id() {
            if !declared_temp_ids.insert(temp_id) {
                violations.push(Violation::new(
                    index,
                    change.op_name(),
                    format!("tempId '{temp_id}' declared more than once"),
                ));
            }
        }

        match change {
            Change::CreateElement { element_type, name, temp_id, .. }
            | Change::CreateOrGetElement { element_type, name, temp_id, .. } => {
                let upsert = matches!(change, Change::CreateOrGetElement { .. });
                if name.trim().is_empty() {
                    violations.push(Violation::new(index, change.op_name(), "name is empty"));
                }
                let key = archihub_core_model::element_identity_key(*element_type, name);
                let exists = snapshot.find_element_by_key(*element_type, name).is_some()
                    || state.element_keys.contains(&key);
                if exists
                    && !upsert
                    && options.duplicate_strategy == DuplicateStrategy::Error
                {
                    violations.push(Violation::conflict(
                        index,
                        change.op_name(),
                        format!("duplicate element ({}, '{name}')", element_type.wire_name()),
                    ));
                }
                state.element_keys.insert(key);
                if let Some(temp_id) = temp_id {
                    state.elements.insert(temp_id.clone(), *element_type);
                }
            }

            Change::CreateRelationship {
                relationship_type,
                source_id,
                target_id,
                temp_id,
                access_type,
                strength,
                ..
            }
            | Change::CreateOrGetRelationship {
                relationship_type,
                source_id,
                target_id,
                temp_id,
                access_type,
                strength,
                ..
            } => {
                let upsert = matches!(change, Change::CreateOrGetRelationship { .. });
                let op = change.op_name();
                let access = access_type.unwrap_or_default();

                let source_type =
                    element_type_of(source_id, snapshot, &state, index, op, "sourceId", &mut violations);
                let target_type =
                    element_type_of(target_id, snapshot, &state, index, op, "targetId", &mut violations);

                if source_id == target_id && !self_loop_allowed(*relationship_type) {
                    violations.push(Violation::new(
                        index,
                        op,
                        format!(
                            "{} may not be a self-loop",
                            relationship_type.wire_name()
                        ),
                    ));
                }
                if let (Some(st), Some(tt)) = (source_type, target_type) {
                    if !allowed_relationship(st, *relationship_type, tt) {
                        violations.push(Violation::new(
                            index,
                            op,
                            format!(
                                "matrix forbids {} from {} to {}",
                                relationship_type.wire_name(),
                                st.wire_name(),
                                tt.wire_name()
                            ),
                        ));
                    }
                }

                let key = relationship_identity_key(
                    *relationship_type,
                    &ElementId::from(source_id.as_str()),
                    &ElementId::from(target_id.as_str()),
                    access,
                    strength.as_deref(),
                );
                let exists = model_rel_keys.contains_key(&key)
                    || state.relationship_keys.contains(&key);
                if exists && !upsert {
                    match options.duplicate_strategy {
                        DuplicateStrategy::Error => violations.push(Violation::conflict(
                            index,
                            op,
                            "duplicate relationship (type, source, target, accessType, strength)",
                        )),
                        // Renaming cannot disambiguate a relationship identity
                        DuplicateStrategy::Rename => violations.push(Violation::new(
                            index,
                            op,
                            "duplicateStrategy=rename is not valid for relationships",
                        )),
                        DuplicateStrategy::Reuse => {}
                    }
                }
                state.relationship_keys.insert(key);
                if let Some(temp_id) = temp_id {
                    state.relationships.insert(
                        temp_id.clone(),
                        (
                            *relationship_type,
                            source_id.clone(),
                            target_id.clone(),
                            access,
                            strength.clone(),
                        ),
                    );
                }
            }

            Change::UpdateElement { id, .. } | Change::DeleteElement { id, .. } => {
                require_element(id, snapshot, &state, index, change.op_name(), &mut violations);
            }

            Change::SetProperty { id, .. } => {
                // Properties live on elements and relationships alike
                let known = state.elements.contains_key(id)
                    || state.relationships.contains_key(id)
                    || snapshot.elements.contains_key(&ElementId::from(id.as_str()))
                    || snapshot
                        .relationships
                        .contains_key(&archihub_core_types::RelationshipId::from(id.as_str()));
                if !known {
                    violations.push(Violation::new(
                        index,
                        change.op_name(),
                        format!("concept '{id}' not found"),
                    ));
                }
            }

            Change::UpdateRelationship { id, .. } | Change::DeleteRelationship { id } => {
                let known = id.starts_with("rel-")
                    && snapshot
                        .relationships
                        .contains_key(&archihub_core_types::RelationshipId::from(id.as_str()))
                    || state.relationships.contains_key(id);
                if !known {
                    violations.push(Violation::new(
                        index,
                        change.op_name(),
                        format!("relationship '{id}' not found"),
                    ));
                }
            }

            Change::MoveToFolder { id, folder_id } => {
                let op = change.op_name();
                require_folder(folder_id, snapshot, &state, index, op, &mut violations);
                let known = state.elements.contains_key(id)
                    || state.relationships.contains_key(id)
                    || state.views.contains(id)
                    || snapshot.elements.contains_key(&ElementId::from(id.as_str()))
                    || snapshot
                        .relationships
                        .contains_key(&archihub_core_types::RelationshipId::from(id.as_str()))
                    || snapshot.views.contains_key(&ViewId::from(id.as_str()));
                if !known {
                    violations.push(Violation::new(index, op, format!("item '{id}' not found")));
                }
            }

            Change::CreateFolder { temp_id, parent_id, .. } => {
                if let Some(parent) = parent_id {
                    require_folder(parent, snapshot, &state, index, change.op_name(), &mut violations);
                }
                if let Some(temp_id) = temp_id {
                    state.folders.insert(temp_id.clone());
                }
            }

            Change::CreateView { temp_id, folder_id, .. } => {
                if let Some(folder) = folder_id {
                    require_folder(folder, snapshot, &state, index, change.op_name(), &mut violations);
                }
                if let Some(temp_id) = temp_id {
                    state.views.insert(temp_id.clone());
                }
            }
            Change::DeleteView { view_id } => {
                require_view(view_id, snapshot, &state, index, change.op_name(), &mut violations);
            }

            Change::AddToView {
                view_id,
                element_id,
                temp_id,
                parent_visual_id,
                ..
            } => {
                let op = change.op_name();
                require_view(view_id, snapshot, &state, index, op, &mut violations);
                require_element(element_id, snapshot, &state, index, op, &mut violations);
                if let Some(parent) = parent_visual_id {
                    require_visual_in_view(
                        parent, view_id, snapshot, &state, index, op, &mut violations,
                    );
                }
                if let Some(temp_id) = temp_id {
                    state
                        .visuals
                        .insert(temp_id.clone(), (view_id.clone(), Some(element_id.clone())));
                }
            }

            Change::NestInView { view_id, visual_id, parent_visual_id, .. } => {
                let op = change.op_name();
                require_view(view_id, snapshot, &state, index, op, &mut violations);
                require_visual_in_view(visual_id, view_id, snapshot, &state, index, op, &mut violations);
                require_visual_in_view(
                    parent_visual_id, view_id, snapshot, &state, index, op, &mut violations,
                );
                if visual_id == parent_visual_id {
                    violations.push(Violation::new(index, op, "cannot nest a visual into itself"));
                }
            }

            Change::AddConnectionToView {
                view_id,
                relationship_id,
                source_visual_id,
                target_visual_id,
                temp_id,
            } => {
                let op = change.op_name();
                require_view(view_id, snapshot, &state, index, op, &mut violations);
                require_visual_in_view(
                    source_visual_id, view_id, snapshot, &state, index, op, &mut violations,
                );
                require_visual_in_view(
                    target_visual_id, view_id, snapshot, &state, index, op, &mut violations,
                );

                // Direction consistency: the source visual must back the
                // relationship's source element (and likewise the target)
                let endpoints = relationship_endpoints(relationship_id, snapshot, &state);
                if let Some((rel_source, rel_target)) = endpoints {
                    let source_element =
                        visual_element(source_visual_id, view_id, snapshot, &state);
                    let target_element =
                        visual_element(target_visual_id, view_id, snapshot, &state);
                    if let Some(source_element) = source_element {
                        if source_element != rel_source {
                            violations.push(Violation::new(
                                index,
                                op,
                                format!(
                                    "sourceVisualId '{source_visual_id}' does not back the relationship source"
                                ),
                            ));
                        }
                    }
                    if let Some(target_element) = target_element {
                        if target_element != rel_target {
                            violations.push(Violation::new(
                                index,
                                op,
                                format!(
                                    "targetVisualId '{target_visual_id}' does not back the relationship target"
                                ),
                            ));
                        }
                    }
                } else if !state.relationships.contains_key(relationship_id) {
                    violations.push(Violation::new(
                        index,
                        op,
                        format!("relationship '{relationship_id}' not found"),
                    ));
                }

                let triple = (
                    view_id.clone(),
                    relationship_id.clone(),
                    source_visual_id.clone(),
                    target_visual_id.clone(),
                );
                let already_on_view = snapshot
                    .views
                    .get(&ViewId::from(view_id.as_str()))
                    .is_some_and(|view| {
                        view.connections.values().any(|c| {
                            c.relationship.as_str() == relationship_id
                                && c.source_visual.as_str() == source_visual_id
                                && c.target_visual.as_str() == target_visual_id
                        })
                    });
                if already_on_view || !state.connection_triples.insert(triple) {
                    violations.push(Violation::new(
                        index,
                        op,
                        "this (relationship, sourceVisual, targetVisual) already exists on the view",
                    ));
                }
                if let Some(temp_id) = temp_id {
                    state.visuals.insert(temp_id.clone(), (view_id.clone(), None));
                }
            }

            Change::DeleteConnectionFromView { view_id, connection_id }
            | Change::StyleConnection { view_id, connection_id, .. } => {
                let op = change.op_name();
                require_view(view_id, snapshot, &state, index, op, &mut violations);
                let known = state.visuals.contains_key(connection_id)
                    || snapshot
                        .views
                        .get(&ViewId::from(view_id.as_str()))
                        .is_some_and(|v| {
                            v.connections
                                .contains_key(&archihub_core_types::VisualId::from(connection_id.as_str()))
                        });
                if !known {
                    violations.push(Violation::new(
                        index,
                        op,
                        format!("connection '{connection_id}' not found on view"),
                    ));
                }
            }

            Change::StyleViewObject { view_id, visual_id, .. }
            | Change::MoveViewObject { view_id, visual_id, .. } => {
                let op = change.op_name();
                require_view(view_id, snapshot, &state, index, op, &mut violations);
                require_visual_in_view(visual_id, view_id, snapshot, &state, index, op, &mut violations);
            }

            Change::CreateNote { view_id, temp_id, .. }
            | Change::CreateGroup { view_id, temp_id, .. } => {
                require_view(view_id, snapshot, &state, index, change.op_name(), &mut violations);
                if let Some(temp_id) = temp_id {
                    state.visuals.insert(temp_id.clone(), (view_id.clone(), None));
                }
            }
        }
    }

    violations
}

fn element_type_of(
    reference: &str,
    snapshot: &Snapshot,
    state: &BatchState,
    index: usize,
    op: &str,
    field: &str,
    violations: &mut Vec<Violation>,
) -> Option<ElementType> {
    if let Some(ty) = state.elements.get(reference) {
        return Some(*ty);
    }
    if let Some(element) = snapshot.elements.get(&ElementId::from(reference)) {
        return Some(element.element_type);
    }
    violations.push(Violation::new(
        index,
        op,
        format!("{field} '{reference}' does not name a known element"),
    ));
    None
}

fn require_element(
    reference: &str,
    snapshot: &Snapshot,
    state: &BatchState,
    index: usize,
    op: &str,
    violations: &mut Vec<Violation>,
) {
    let known = state.elements.contains_key(reference)
        || snapshot.elements.contains_key(&ElementId::from(reference));
    if !known {
        violations.push(Violation::new(
            index,
            op,
            format!("element '{reference}' not found"),
        ));
    }
}

fn require_folder(
    reference: &str,
    snapshot: &Snapshot,
    state: &BatchState,
    index: usize,
    op: &str,
    violations: &mut Vec<Violation>,
) {
    let known = state.folders.contains(reference)
        || snapshot
            .folders
            .contains_key(&archihub_core_types::FolderId::from(reference));
    if !known {
        violations.push(Violation::new(
            index,
            op,
            format!("folder '{reference}' not found"),
        ));
    }
}

fn require_view(
    reference: &str,
    snapshot: &Snapshot,
    state: &BatchState,
    index: usize,
    op: &str,
    violations: &mut Vec<Violation>,
) {
    let known = state.views.contains(reference)
        || snapshot.views.contains_key(&ViewId::from(reference));
    if !known {
        violations.push(Violation::new(
            index,
            op,
            format!("view '{reference}' not found"),
        ));
    }
}

fn require_visual_in_view(
    reference: &str,
    view_ref: &str,
    snapshot: &Snapshot,
    state: &BatchState,
    index: usize,
    op: &str,
    violations: &mut Vec<Violation>,
) {
    if let Some((declared_view, _)) = state.visuals.get(reference) {
        if declared_view != view_ref {
            violations.push(Violation::new(
                index,
                op,
                format!("visual '{reference}' belongs to a different view"),
            ));
        }
        return;
    }
    let present = snapshot
        .views
        .get(&ViewId::from(view_ref))
        .is_some_and(|view| {
            view.objects
                .contains_key(&archihub_core_types::VisualId::from(reference))
        });
    if !present {
        violations.push(Violation::new(
            index,
            op,
            format!("visual '{reference}' not found on view '{view_ref}'"),
        ));
    }
}

/// (source, target) element refs of a relationship named by `reference`
fn relationship_endpoints(
    reference: &str,
    snapshot: &Snapshot,
    state: &BatchState,
) -> Option<(String, String)> {
    if let Some((_, source, target, _, _)) = state.relationships.get(reference) {
        return Some((source.clone(), target.clone()));
    }
    snapshot
        .relationships
        .get(&archihub_core_types::RelationshipId::from(reference))
        .map(|r| (r.source.0.clone(), r.target.0.clone()))
}

/// Element ref behind a visual named by `reference` on `view_ref`
fn visual_element(
    reference: &str,
    view_ref: &str,
    snapshot: &Snapshot,
    state: &BatchState,
) -> Option<String> {
    if let Some((_, element)) = state.visuals.get(reference) {
        return element.clone();
    }
    snapshot
        .views
        .get(&ViewId::from(view_ref))?
        .objects
        .get(&archihub_core_types::VisualId::from(reference))?
        .element_id()
        .map(|e| e.0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archihub_core_model::{Model, NewElement};
    use archihub_core_types::ElementType;

    fn snapshot() -> Snapshot {
        let mut m = Model::new("test");
        m.begin_compound("setup", None);
        m.create_element(NewElement {
            element_type: Some(ElementType::BusinessActor),
            name: "Customer".into(),
            ..Default::default()
        })
        .unwrap();
        m.commit_compound();
        m.snapshot()
    }

    fn changes(value: serde_json::Value) -> Vec<Change> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn clean_batch_produces_no_violations() {
        let batch = changes(serde_json::json!([
            { "op": "createElement", "type": "business-process", "name": "Handle order", "tempId": "p" },
            { "op": "createElement", "type": "business-object", "name": "Order", "tempId": "o" },
            { "op": "createRelationship", "type": "access-relationship",
              "sourceId": "p", "targetId": "o", "accessType": "write" }
        ]));
        let violations = validate(&batch, &snapshot(), &ApplyOptions::default());
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn matrix_violation_is_reported_with_index() {
        let batch = changes(serde_json::json!([
            { "op": "createElement", "type": "business-object", "name": "O", "tempId": "o" },
            { "op": "createElement", "type": "business-actor", "name": "A", "tempId": "a" },
            { "op": "createRelationship", "type": "triggering-relationship",
              "sourceId": "o", "targetId": "a" }
        ]));
        let violations = validate(&batch, &snapshot(), &ApplyOptions::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].change_index, 2);
        assert!(violations[0].cause.contains("matrix"));
    }

    #[test]
    fn duplicate_element_conflicts_under_error_strategy() {
        let batch = changes(serde_json::json!([
            { "op": "createElement", "type": "business-actor", "name": "Customer" }
        ]));
        let violations = validate(&batch, &snapshot(), &ApplyOptions::default());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].is_conflict);
        assert!(matches!(
            violations[0].clone().into_error(),
            archihub_core_types::HubError::Conflict(_)
        ));

        // reuse accepts the same batch
        let options = ApplyOptions {
            duplicate_strategy: DuplicateStrategy::Reuse,
            ..Default::default()
        };
        assert!(validate(&batch, &snapshot(), &options).is_empty());
    }

    #[test]
    fn rename_is_rejected_for_relationship_duplicates() {
        let batch = changes(serde_json::json!([
            { "op": "createElement", "type": "business-actor", "name": "A", "tempId": "a" },
            { "op": "createElement", "type": "business-process", "name": "P", "tempId": "p" },
            { "op": "createRelationship", "type": "assignment-relationship",
              "sourceId": "a", "targetId": "p" },
            { "op": "createRelationship", "type": "assignment-relationship",
              "sourceId": "a", "targetId": "p" }
        ]));
        let options = ApplyOptions {
            duplicate_strategy: DuplicateStrategy::Rename,
            ..Default::default()
        };
        let violations = validate(&batch, &snapshot(), &options);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].cause.contains("rename"));
    }

    #[test]
    fn nested_parent_must_live_on_the_same_view() {
        let batch = changes(serde_json::json!([
            { "op": "createElement", "type": "business-actor", "name": "A", "tempId": "a" },
            { "op": "createView", "name": "one", "tempId": "v1" },
            { "op": "createView", "name": "two", "tempId": "v2" },
            { "op": "addToView", "viewId": "v1", "elementId": "a", "tempId": "va" },
            { "op": "addToView", "viewId": "v2", "elementId": "a", "parentVisualId": "va" }
        ]));
        let violations = validate(&batch, &snapshot(), &ApplyOptions::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].change_index, 4);
        assert!(violations[0].cause.contains("different view"));
    }

    #[test]
    fn duplicate_temp_id_is_flagged() {
        let batch = changes(serde_json::json!([
            { "op": "createElement", "type": "business-actor", "name": "A", "tempId": "dup" },
            { "op": "createElement", "type": "business-actor", "name": "B", "tempId": "dup" }
        ]));
        let violations = validate(&batch, &snapshot(), &ApplyOptions::default());
        assert!(violations.iter().any(|v| v.cause.contains("tempId 'dup'")));
    }
}
