//! Model Adapter: the primitive, editor-thread-only mutation surface (C1)
//!
//! Every mutating primitive records its inverse into the open undo compound
//! so a BOM chunk can roll back and a committed batch collapses to one undo
//! unit. No other code touches the underlying maps mutably.

use archihub_core_types::{
    AccessVariant, Bounds, ElementId, ElementType, FolderId, HubError, HubResult, RelationshipId,
    RelationshipType, ViewId, VisualId, VisualStyle, allowed_relationship, self_loop_allowed,
};
use indexmap::IndexMap;

use crate::concept::{Element, Relationship, element_identity_key, relationship_identity_key};
use crate::folder::{Folder, FolderKind};
use crate::model::Model;
use crate::undo::InversePrimitive;
use crate::view::{RouterPreset, View, VisualConnection, VisualObject};

/// Field set for a new element
#[derive(Debug, Clone, Default)]
pub struct NewElement {
    pub element_type: Option<ElementType>,
    pub name: String,
    pub documentation: Option<String>,
    pub properties: IndexMap<String, String>,
    pub folder: Option<FolderId>,
}

/// Field set for a new relationship
#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub relationship_type: RelationshipType,
    pub source: ElementId,
    pub target: ElementId,
    pub name: Option<String>,
    pub properties: IndexMap<String, String>,
    pub access_type: AccessVariant,
    pub strength: Option<String>,
    pub folder: Option<FolderId>,
}

/// Partial update for an element; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ElementPatch {
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub properties: IndexMap<String, String>,
}

/// Partial update for a relationship
#[derive(Debug, Clone, Default)]
pub struct RelationshipPatch {
    pub name: Option<String>,
    pub properties: IndexMap<String, String>,
    pub access_type: Option<AccessVariant>,
    pub strength: Option<String>,
}

impl Model {
    // --- element primitives ----------------------------------------------

    pub fn create_element(&mut self, spec: NewElement) -> HubResult<ElementId> {
        let element_type = spec
            .element_type
            .ok_or_else(|| HubError::Execution("createElement requires a type".into()))?;
        let folder = match spec.folder {
            Some(folder) => {
                if !self.folders.contains_key(&folder) {
                    return Err(HubError::NotFound(format!("folder {folder}")));
                }
                folder
            }
            None => self.layer_root(element_type.layer()),
        };

        let element = Element {
            id: ElementId::generate(),
            element_type,
            name: spec.name,
            documentation: spec.documentation,
            properties: spec.properties,
            folder: folder.clone(),
        };
        let id = element.id.clone();

        self.folders
            .get_mut(&folder)
            .expect("folder checked above")
            .items
            .push(id.0.clone());
        self.elements.insert(id.clone(), element);
        self.undo.record(InversePrimitive::RemoveElement(id.clone()));
        Ok(id)
    }

    pub fn update_element(&mut self, id: &ElementId, patch: ElementPatch) -> HubResult<()> {
        let element = self
            .elements
            .get_mut(id)
            .ok_or_else(|| HubError::NotFound(format!("element {id}")))?;
        let prior = element.clone();

        if let Some(name) = patch.name {
            element.name = name;
        }
        if let Some(documentation) = patch.documentation {
            element.documentation = Some(documentation);
        }
        for (key, value) in patch.properties {
            element.properties.insert(key, value);
        }

        self.undo.record(InversePrimitive::RestoreElement(prior));
        Ok(())
    }

    /// Delete an element. With `cascade` (the default) all referencing
    /// relationships and visuals go with it; without it, references make
    /// the delete fail.
    pub fn delete_element(&mut self, id: &ElementId, cascade: bool) -> HubResult<()> {
        if !self.elements.contains_key(id) {
            return Err(HubError::NotFound(format!("element {id}")));
        }

        let referencing: Vec<RelationshipId> = self
            .relationships
            .values()
            .filter(|r| r.source == *id || r.target == *id)
            .map(|r| r.id.clone())
            .collect();
        if !cascade && !referencing.is_empty() {
            return Err(HubError::Execution(format!(
                "element {id} has {} referencing relationships",
                referencing.len()
            )));
        }
        for rel_id in referencing {
            self.delete_relationship(&rel_id)?;
        }

        // Remove every diagram instance of the element
        let visual_refs: Vec<(ViewId, VisualId)> = self
            .views
            .values()
            .flat_map(|view| {
                view.visuals_of_element(id)
                    .into_iter()
                    .map(|v| (view.id.clone(), v.id.clone()))
            })
            .collect();
        for (view_id, visual_id) in visual_refs {
            // May already be gone as a nested child of an earlier removal
            if self
                .views
                .get(&view_id)
                .is_some_and(|v| v.objects.contains_key(&visual_id))
            {
                self.remove_visual_object(&view_id, &visual_id)?;
            }
        }

        let element = self.elements.shift_remove(id).expect("checked above");
        if let Some(folder) = self.folders.get_mut(&element.folder) {
            folder.remove_item(element.id.as_str());
        }
        self.undo.record(InversePrimitive::RestoreElement(element));
        Ok(())
    }

    // --- relationship primitives -----------------------------------------

    pub fn create_relationship(&mut self, spec: NewRelationship) -> HubResult<RelationshipId> {
        let source = self
            .elements
            .get(&spec.source)
            .ok_or_else(|| HubError::NotFound(format!("source element {}", spec.source)))?;
        let target = self
            .elements
            .get(&spec.target)
            .ok_or_else(|| HubError::NotFound(format!("target element {}", spec.target)))?;

        if spec.source == spec.target && !self_loop_allowed(spec.relationship_type) {
            return Err(HubError::Execution(format!(
                "{} may not connect {} to itself",
                spec.relationship_type.wire_name(),
                spec.source
            )));
        }
        if !allowed_relationship(source.element_type, spec.relationship_type, target.element_type)
        {
            return Err(HubError::Execution(format!(
                "matrix forbids {} from {} to {}",
                spec.relationship_type.wire_name(),
                source.element_type.wire_name(),
                target.element_type.wire_name()
            )));
        }

        let folder = match spec.folder {
            Some(folder) => {
                if !self.folders.contains_key(&folder) {
                    return Err(HubError::NotFound(format!("folder {folder}")));
                }
                folder
            }
            None => self.relations_root(),
        };

        let relationship = Relationship {
            id: RelationshipId::generate(),
            relationship_type: spec.relationship_type,
            source: spec.source,
            target: spec.target,
            name: spec.name,
            properties: spec.properties,
            access_type: spec.access_type,
            strength: spec.strength,
            folder: folder.clone(),
        };
        let id = relationship.id.clone();

        self.folders
            .get_mut(&folder)
            .expect("folder checked above")
            .items
            .push(id.0.clone());
        self.relationships.insert(id.clone(), relationship);
        self.undo
            .record(InversePrimitive::RemoveRelationship(id.clone()));
        Ok(id)
    }

    pub fn update_relationship(
        &mut self,
        id: &RelationshipId,
        patch: RelationshipPatch,
    ) -> HubResult<()> {
        let relationship = self
            .relationships
            .get_mut(id)
            .ok_or_else(|| HubError::NotFound(format!("relationship {id}")))?;
        let prior = relationship.clone();

        if let Some(name) = patch.name {
            relationship.name = Some(name);
        }
        for (key, value) in patch.properties {
            relationship.properties.insert(key, value);
        }
        if let Some(access) = patch.access_type {
            relationship.access_type = access;
        }
        if let Some(strength) = patch.strength {
            relationship.strength = Some(strength);
        }

        self.undo
            .record(InversePrimitive::RestoreRelationship(prior));
        Ok(())
    }

    pub fn delete_relationship(&mut self, id: &RelationshipId) -> HubResult<()> {
        if !self.relationships.contains_key(id) {
            return Err(HubError::NotFound(format!("relationship {id}")));
        }

        // Cascade through visual connections on every view
        let connection_refs: Vec<(ViewId, VisualId)> = self
            .views
            .values()
            .flat_map(|view| {
                view.connections
                    .values()
                    .filter(|c| c.relationship == *id)
                    .map(|c| (view.id.clone(), c.id.clone()))
            })
            .collect();
        for (view_id, visual_id) in connection_refs {
            self.remove_visual_connection(&view_id, &visual_id)?;
        }

        let relationship = self.relationships.shift_remove(id).expect("checked above");
        if let Some(folder) = self.folders.get_mut(&relationship.folder) {
            folder.remove_item(relationship.id.as_str());
        }
        self.undo
            .record(InversePrimitive::RestoreRelationship(relationship));
        Ok(())
    }

    // --- properties -------------------------------------------------------

    /// Set (or clear, with `value: None`) one property on an element or
    /// relationship, addressed by its raw id
    pub fn set_property(
        &mut self,
        concept_id: &str,
        key: &str,
        value: Option<String>,
    ) -> HubResult<()> {
        let element_id = ElementId::from(concept_id);
        if let Some(element) = self.elements.get_mut(&element_id) {
            let prior = element.clone();
            match value {
                Some(value) => {
                    element.properties.insert(key.to_string(), value);
                }
                None => {
                    element.properties.shift_remove(key);
                }
            }
            self.undo.record(InversePrimitive::RestoreElement(prior));
            return Ok(());
        }

        let rel_id = RelationshipId::from(concept_id);
        if let Some(relationship) = self.relationships.get_mut(&rel_id) {
            let prior = relationship.clone();
            match value {
                Some(value) => {
                    relationship.properties.insert(key.to_string(), value);
                }
                None => {
                    relationship.properties.shift_remove(key);
                }
            }
            self.undo
                .record(InversePrimitive::RestoreRelationship(prior));
            return Ok(());
        }

        Err(HubError::NotFound(format!("concept {concept_id}")))
    }

    // --- folders ----------------------------------------------------------

    pub fn create_folder(
        &mut self,
        name: impl Into<String>,
        kind: FolderKind,
        parent: Option<FolderId>,
    ) -> HubResult<FolderId> {
        if let Some(parent_id) = &parent {
            if !self.folders.contains_key(parent_id) {
                return Err(HubError::NotFound(format!("folder {parent_id}")));
            }
        }
        let folder = Folder::new(name, kind, parent.clone());
        let id = folder.id.clone();
        if let Some(parent_id) = parent {
            self.folders
                .get_mut(&parent_id)
                .expect("parent checked above")
                .folders
                .push(id.clone());
        }
        self.folders.insert(id.clone(), folder);
        self.undo.record(InversePrimitive::RemoveFolder(id.clone()));
        Ok(id)
    }

    /// Move a concept or view into another folder
    pub fn move_to_folder(&mut self, item_id: &str, folder: &FolderId) -> HubResult<()> {
        if !self.folders.contains_key(folder) {
            return Err(HubError::NotFound(format!("folder {folder}")));
        }

        let from = {
            let element_id = ElementId::from(item_id);
            let view_id = ViewId::from(item_id);
            let rel_id = RelationshipId::from(item_id);
            if let Some(element) = self.elements.get_mut(&element_id) {
                std::mem::replace(&mut element.folder, folder.clone())
            } else if let Some(relationship) = self.relationships.get_mut(&rel_id) {
                std::mem::replace(&mut relationship.folder, folder.clone())
            } else if let Some(view) = self.views.get_mut(&view_id) {
                std::mem::replace(&mut view.folder, folder.clone())
            } else {
                return Err(HubError::NotFound(format!("item {item_id}")));
            }
        };

        if let Some(prior) = self.folders.get_mut(&from) {
            prior.remove_item(item_id);
        }
        self.folders
            .get_mut(folder)
            .expect("folder checked above")
            .items
            .push(item_id.to_string());
        self.undo.record(InversePrimitive::MoveItem {
            item: item_id.to_string(),
            from,
            to: folder.clone(),
        });
        Ok(())
    }

    // --- views ------------------------------------------------------------

    pub fn create_view(
        &mut self,
        name: impl Into<String>,
        viewpoint: Option<String>,
        folder: Option<FolderId>,
    ) -> HubResult<ViewId> {
        let folder = match folder {
            Some(folder) => {
                if !self.folders.contains_key(&folder) {
                    return Err(HubError::NotFound(format!("folder {folder}")));
                }
                folder
            }
            None => self.views_root(),
        };
        let view = View::new(name, viewpoint, folder.clone());
        let id = view.id.clone();
        self.folders
            .get_mut(&folder)
            .expect("folder checked above")
            .items
            .push(id.0.clone());
        self.views.insert(id.clone(), view);
        self.undo.record(InversePrimitive::RemoveView(id.clone()));
        Ok(id)
    }

    pub fn delete_view(&mut self, id: &ViewId) -> HubResult<()> {
        let view = self
            .views
            .shift_remove(id)
            .ok_or_else(|| HubError::NotFound(format!("view {id}")))?;
        if let Some(folder) = self.folders.get_mut(&view.folder) {
            folder.remove_item(view.id.as_str());
        }
        self.undo
            .record(InversePrimitive::RestoreView(Box::new(view)));
        Ok(())
    }

    pub fn set_router(&mut self, id: &ViewId, preset: RouterPreset) -> HubResult<()> {
        let view = self
            .views
            .get_mut(id)
            .ok_or_else(|| HubError::NotFound(format!("view {id}")))?;
        view.router = preset;
        Ok(())
    }

    // --- visual primitives --------------------------------------------------

    /// Insert a fully formed visual object; the composer owns the semantic
    /// checks, the adapter re-checks referential basics
    pub fn add_visual_object(
        &mut self,
        view_id: &ViewId,
        object: VisualObject,
    ) -> HubResult<VisualId> {
        if let Some(element) = object.element_id() {
            if !self.elements.contains_key(element) {
                return Err(HubError::NotFound(format!("element {element}")));
            }
        }
        if !object.bounds.is_finite() {
            return Err(HubError::Execution("visual bounds must be finite".into()));
        }
        let view = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;
        if let Some(parent) = &object.parent {
            if !view.objects.contains_key(parent) {
                return Err(HubError::NotFound(format!("parent visual {parent}")));
            }
        }
        let id = object.id.clone();
        view.objects.insert(id.clone(), object);
        self.undo.record(InversePrimitive::RemoveVisual {
            view: view_id.clone(),
            visual: id.clone(),
        });
        Ok(id)
    }

    pub fn add_visual_connection(
        &mut self,
        view_id: &ViewId,
        connection: VisualConnection,
    ) -> HubResult<VisualId> {
        if !self.relationships.contains_key(&connection.relationship) {
            return Err(HubError::NotFound(format!(
                "relationship {}",
                connection.relationship
            )));
        }
        let view = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;
        for endpoint in [&connection.source_visual, &connection.target_visual] {
            if !view.objects.contains_key(endpoint) {
                return Err(HubError::NotFound(format!("visual {endpoint}")));
            }
        }
        let id = connection.id.clone();
        view.connections.insert(id.clone(), connection);
        self.undo.record(InversePrimitive::RemoveConnection {
            view: view_id.clone(),
            visual: id.clone(),
        });
        Ok(id)
    }

    /// Rewrite a visual's parent pointer and bounds in one primitive
    pub fn reparent_visual(
        &mut self,
        view_id: &ViewId,
        visual_id: &VisualId,
        new_parent: Option<VisualId>,
        new_bounds: Bounds,
    ) -> HubResult<()> {
        let view = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;
        if let Some(parent) = &new_parent {
            if !view.objects.contains_key(parent) {
                return Err(HubError::NotFound(format!("parent visual {parent}")));
            }
        }
        let object = view
            .objects
            .get_mut(visual_id)
            .ok_or_else(|| HubError::NotFound(format!("visual {visual_id}")))?;
        let inverse = InversePrimitive::RestoreVisualBounds {
            view: view_id.clone(),
            visual: visual_id.clone(),
            bounds: object.bounds,
            parent: object.parent.clone(),
        };
        object.parent = new_parent;
        object.bounds = new_bounds;
        self.undo.record(inverse);
        Ok(())
    }

    pub fn set_visual_bounds(
        &mut self,
        view_id: &ViewId,
        visual_id: &VisualId,
        bounds: Bounds,
    ) -> HubResult<()> {
        if !bounds.is_finite() {
            return Err(HubError::Execution("visual bounds must be finite".into()));
        }
        let object = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?
            .objects
            .get_mut(visual_id)
            .ok_or_else(|| HubError::NotFound(format!("visual {visual_id}")))?;
        let inverse = InversePrimitive::RestoreVisualBounds {
            view: view_id.clone(),
            visual: visual_id.clone(),
            bounds: object.bounds,
            parent: object.parent.clone(),
        };
        object.bounds = bounds;
        self.undo.record(inverse);
        Ok(())
    }

    pub fn set_visual_style(
        &mut self,
        view_id: &ViewId,
        visual_id: &VisualId,
        patch: &VisualStyle,
    ) -> HubResult<()> {
        let object = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?
            .objects
            .get_mut(visual_id)
            .ok_or_else(|| HubError::NotFound(format!("visual {visual_id}")))?;
        let inverse = InversePrimitive::RestoreVisualStyle {
            view: view_id.clone(),
            visual: visual_id.clone(),
            style: object.style.clone(),
        };
        object.style.merge(patch);
        self.undo.record(inverse);
        Ok(())
    }

    pub fn set_connection_style(
        &mut self,
        view_id: &ViewId,
        visual_id: &VisualId,
        patch: &VisualStyle,
    ) -> HubResult<()> {
        let connection = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?
            .connections
            .get_mut(visual_id)
            .ok_or_else(|| HubError::NotFound(format!("connection {visual_id}")))?;
        let inverse = InversePrimitive::RestoreConnectionStyle {
            view: view_id.clone(),
            visual: visual_id.clone(),
            style: connection.style.clone(),
        };
        connection.style.merge(patch);
        self.undo.record(inverse);
        Ok(())
    }

    /// Remove a visual object, its nested children and attached connections
    pub fn remove_visual_object(
        &mut self,
        view_id: &ViewId,
        visual_id: &VisualId,
    ) -> HubResult<()> {
        let view = self
            .views
            .get(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;
        if !view.objects.contains_key(visual_id) {
            return Err(HubError::NotFound(format!("visual {visual_id}")));
        }

        let children: Vec<VisualId> = view
            .objects
            .values()
            .filter(|v| v.parent.as_ref() == Some(visual_id))
            .map(|v| v.id.clone())
            .collect();
        for child in children {
            self.remove_visual_object(view_id, &child)?;
        }

        let view = self.views.get_mut(view_id).expect("checked above");
        let attached: Vec<VisualId> = view
            .connections
            .values()
            .filter(|c| c.source_visual == *visual_id || c.target_visual == *visual_id)
            .map(|c| c.id.clone())
            .collect();
        for connection_id in attached {
            let connection = view
                .connections
                .shift_remove(&connection_id)
                .expect("listed above");
            self.undo.record(InversePrimitive::RestoreConnection {
                view: view_id.clone(),
                connection,
            });
        }

        let object = view.objects.shift_remove(visual_id).expect("checked above");
        self.undo.record(InversePrimitive::RestoreVisual {
            view: view_id.clone(),
            object,
        });
        Ok(())
    }

    pub fn set_connection_bendpoints(
        &mut self,
        view_id: &ViewId,
        visual_id: &VisualId,
        bendpoints: Vec<archihub_core_types::AbsolutePoint>,
    ) -> HubResult<()> {
        let connection = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?
            .connections
            .get_mut(visual_id)
            .ok_or_else(|| HubError::NotFound(format!("connection {visual_id}")))?;
        let prior = connection.clone();
        connection.bendpoints = bendpoints;
        self.undo.record(InversePrimitive::RestoreConnection {
            view: view_id.clone(),
            connection: prior,
        });
        Ok(())
    }

    pub fn remove_visual_connection(
        &mut self,
        view_id: &ViewId,
        visual_id: &VisualId,
    ) -> HubResult<()> {
        let view = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;
        let connection = view
            .connections
            .shift_remove(visual_id)
            .ok_or_else(|| HubError::NotFound(format!("connection {visual_id}")))?;
        self.undo.record(InversePrimitive::RestoreConnection {
            view: view_id.clone(),
            connection,
        });
        Ok(())
    }

    // --- queries ------------------------------------------------------------

    pub fn get_element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get_relationship(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.relationships.get(id)
    }

    pub fn get_view(&self, id: &ViewId) -> Option<&View> {
        self.views.get(id)
    }

    pub fn list_views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    pub fn list_folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// Existing element matching the duplicate-identity key (type, name)
    pub fn find_element_by_key(&self, element_type: ElementType, name: &str) -> Option<&Element> {
        let key = element_identity_key(element_type, name);
        self.elements
            .values()
            .find(|e| element_identity_key(e.element_type, &e.name) == key)
    }

    /// Existing relationship matching the full identity key
    pub fn find_relationship_by_key(
        &self,
        relationship_type: RelationshipType,
        source: &ElementId,
        target: &ElementId,
        access: AccessVariant,
        strength: Option<&str>,
    ) -> Option<&Relationship> {
        let key = relationship_identity_key(relationship_type, source, target, access, strength);
        self.relationships.values().find(|r| r.identity_key() == key)
    }

    /// Elements with the exact name, optionally narrowed by type
    pub fn elements_named(
        &self,
        name: &str,
        element_type: Option<ElementType>,
    ) -> Vec<&Element> {
        self.elements
            .values()
            .filter(|e| e.name == name && element_type.is_none_or(|t| e.element_type == t))
            .collect()
    }

    pub fn relationships_of(&self, element: &ElementId) -> Vec<&Relationship> {
        self.relationships
            .values()
            .filter(|r| r.source == *element || r.target == *element)
            .collect()
    }

    pub fn views_containing(&self, element: &ElementId) -> Vec<&View> {
        self.views
            .values()
            .filter(|v| !v.visuals_of_element(element).is_empty())
            .collect()
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.elements.len(), self.relationships.len(), self.views.len())
    }

    /// Run `f` inside a single undoable compound; roll back on error
    pub fn with_compound<R>(
        &mut self,
        label: impl Into<String>,
        tag: Option<String>,
        f: impl FnOnce(&mut Model) -> HubResult<R>,
    ) -> HubResult<R> {
        self.begin_compound(label, tag);
        match f(self) {
            Ok(value) => {
                self.commit_compound();
                Ok(value)
            }
            Err(err) => {
                self.rollback_compound();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::new("test")
    }

    fn actor(m: &mut Model, name: &str) -> ElementId {
        m.create_element(NewElement {
            element_type: Some(ElementType::BusinessActor),
            name: name.into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn create_element_lands_in_layer_folder() {
        let mut m = model();
        m.begin_compound("test", None);
        let id = actor(&mut m, "Customer");
        m.commit_compound();

        let element = m.get_element(&id).unwrap();
        let folder = m.folders.get(&element.folder).unwrap();
        assert!(folder.items.contains(&id.0));
        assert_eq!(m.counts().0, 1);
    }

    #[test]
    fn rollback_restores_pre_compound_state() {
        let mut m = model();
        m.begin_compound("keep", None);
        actor(&mut m, "Customer");
        m.commit_compound();

        m.begin_compound("abort", None);
        actor(&mut m, "Doomed");
        let rel = m.create_relationship(NewRelationship {
            relationship_type: RelationshipType::Association,
            source: ElementId::from("id-missing"),
            target: ElementId::from("id-missing"),
            name: None,
            properties: IndexMap::new(),
            access_type: AccessVariant::Generic,
            strength: None,
            folder: None,
        });
        assert!(rel.is_err());
        m.rollback_compound();

        assert_eq!(m.counts().0, 1);
        assert!(m.find_element_by_key(ElementType::BusinessActor, "Doomed").is_none());
    }

    #[test]
    fn delete_element_cascades_relationships_and_visuals() {
        let mut m = model();
        m.begin_compound("setup", None);
        let a = actor(&mut m, "A");
        let b = actor(&mut m, "B");
        let rel = m
            .create_relationship(NewRelationship {
                relationship_type: RelationshipType::Association,
                source: a.clone(),
                target: b.clone(),
                name: None,
                properties: IndexMap::new(),
                access_type: AccessVariant::Generic,
                strength: None,
                folder: None,
            })
            .unwrap();
        let view = m.create_view("main", None, None).unwrap();
        let va = m
            .add_visual_object(
                &view,
                VisualObject {
                    id: VisualId::generate(),
                    kind: crate::view::VisualKind::Element { element: a.clone() },
                    bounds: Bounds::default(),
                    parent: None,
                    style: VisualStyle::default(),
                },
            )
            .unwrap();
        let vb = m
            .add_visual_object(
                &view,
                VisualObject {
                    id: VisualId::generate(),
                    kind: crate::view::VisualKind::Element { element: b.clone() },
                    bounds: Bounds::default(),
                    parent: None,
                    style: VisualStyle::default(),
                },
            )
            .unwrap();
        m.add_visual_connection(
            &view,
            VisualConnection {
                id: VisualId::generate(),
                relationship: rel.clone(),
                source_visual: va,
                target_visual: vb,
                bendpoints: Vec::new(),
                style: VisualStyle::default(),
            },
        )
        .unwrap();
        m.commit_compound();

        m.begin_compound("delete", None);
        m.delete_element(&a, true).unwrap();
        m.commit_compound();

        assert!(m.get_element(&a).is_none());
        assert!(m.get_relationship(&rel).is_none());
        let view = m.get_view(&view).unwrap();
        assert_eq!(view.objects.len(), 1);
        assert!(view.connections.is_empty());
    }

    #[test]
    fn undo_collapses_merged_compounds() {
        let mut m = model();
        m.begin_compound("chunk 0", Some("op-x".into()));
        actor(&mut m, "One");
        m.commit_compound();
        m.begin_compound("chunk 1", Some("op-x".into()));
        actor(&mut m, "Two");
        m.commit_compound();

        assert_eq!(m.undo_depth(), 1);
        assert!(m.undo_last());
        assert_eq!(m.counts().0, 0);
    }

    #[test]
    fn matrix_violation_fails_at_execution() {
        let mut m = model();
        m.begin_compound("setup", None);
        let process = m
            .create_element(NewElement {
                element_type: Some(ElementType::BusinessProcess),
                name: "P".into(),
                ..Default::default()
            })
            .unwrap();
        let object = m
            .create_element(NewElement {
                element_type: Some(ElementType::BusinessObject),
                name: "O".into(),
                ..Default::default()
            })
            .unwrap();
        let err = m
            .create_relationship(NewRelationship {
                relationship_type: RelationshipType::Triggering,
                source: object,
                target: process,
                name: None,
                properties: IndexMap::new(),
                access_type: AccessVariant::Generic,
                strength: None,
                folder: None,
            })
            .unwrap_err();
        assert!(matches!(err, HubError::Execution(_)));
        m.rollback_compound();
    }
}
