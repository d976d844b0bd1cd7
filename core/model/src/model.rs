//! The in-memory model graph
//!
//! The model exclusively owns its elements, relationships, views and
//! folders. Mutation happens only through the adapter primitives (see
//! `adapter.rs`), and only on the editor actor.

use std::path::PathBuf;

use archihub_core_types::{ElementId, FolderId, Layer, RelationshipId, ViewId};
use indexmap::IndexMap;

use crate::concept::{Element, Relationship};
use crate::folder::{Folder, FolderKind};
use crate::undo::{InversePrimitive, UndoStack};
use crate::view::View;

pub struct Model {
    pub(crate) elements: IndexMap<ElementId, Element>,
    pub(crate) relationships: IndexMap<RelationshipId, Relationship>,
    pub(crate) views: IndexMap<ViewId, View>,
    pub(crate) folders: IndexMap<FolderId, Folder>,
    pub(crate) layer_roots: IndexMap<Layer, FolderId>,
    pub(crate) relations_root: FolderId,
    pub(crate) views_root: FolderId,
    pub(crate) undo: UndoStack,
    /// Last explicit save target; reused when save is called without a path
    pub(crate) save_path: Option<PathBuf>,
    pub name: String,
}

impl Model {
    /// Empty model with the standard folder skeleton
    pub fn new(name: impl Into<String>) -> Self {
        let mut folders = IndexMap::new();
        let mut layer_roots = IndexMap::new();

        for layer in [
            Layer::Strategy,
            Layer::Business,
            Layer::Application,
            Layer::Technology,
            Layer::Physical,
            Layer::Motivation,
            Layer::Implementation,
            Layer::Other,
        ] {
            let folder = Folder::new(format!("{layer:?}"), FolderKind::Layer(layer), None);
            layer_roots.insert(layer, folder.id.clone());
            folders.insert(folder.id.clone(), folder);
        }

        let relations = Folder::new("Relations", FolderKind::Relations, None);
        let relations_root = relations.id.clone();
        folders.insert(relations_root.clone(), relations);

        let views = Folder::new("Views", FolderKind::Views, None);
        let views_root = views.id.clone();
        folders.insert(views_root.clone(), views);

        Self {
            elements: IndexMap::new(),
            relationships: IndexMap::new(),
            views: IndexMap::new(),
            folders,
            layer_roots,
            relations_root,
            views_root,
            undo: UndoStack::default(),
            save_path: None,
            name: name.into(),
        }
    }

    /// Default folder for a concept of the given layer
    pub fn layer_root(&self, layer: Layer) -> FolderId {
        self.layer_roots
            .get(&layer)
            .cloned()
            .unwrap_or_else(|| self.relations_root.clone())
    }

    pub fn relations_root(&self) -> FolderId {
        self.relations_root.clone()
    }

    pub fn views_root(&self) -> FolderId {
        self.views_root.clone()
    }

    // --- undo ------------------------------------------------------------

    /// Open an atomic compound; see `UndoStack`
    pub fn begin_compound(&mut self, label: impl Into<String>, tag: Option<String>) {
        self.undo.begin(label, tag);
    }

    /// Commit the open compound (merging per tag)
    pub fn commit_compound(&mut self) {
        self.undo.commit();
    }

    /// Roll the open compound back, restoring the pre-compound state
    pub fn rollback_compound(&mut self) {
        let inverses = self.undo.take_open();
        for inverse in inverses.into_iter().rev() {
            self.apply_inverse(inverse);
        }
    }

    /// Undo the most recent committed unit (a whole BOM collapses into one)
    pub fn undo_last(&mut self) -> bool {
        match self.undo.pop() {
            Some(compound) => {
                for inverse in compound.inverses.into_iter().rev() {
                    self.apply_inverse(inverse);
                }
                true
            }
            None => false,
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.depth()
    }

    fn apply_inverse(&mut self, inverse: InversePrimitive) {
        match inverse {
            InversePrimitive::RemoveElement(id) => {
                if let Some(element) = self.elements.shift_remove(&id) {
                    if let Some(folder) = self.folders.get_mut(&element.folder) {
                        folder.remove_item(element.id.as_str());
                    }
                }
            }
            InversePrimitive::RestoreElement(element) => {
                if let Some(folder) = self.folders.get_mut(&element.folder) {
                    if !folder.items.iter().any(|i| i == element.id.as_str()) {
                        folder.items.push(element.id.0.clone());
                    }
                }
                self.elements.insert(element.id.clone(), element);
            }
            InversePrimitive::RemoveRelationship(id) => {
                if let Some(rel) = self.relationships.shift_remove(&id) {
                    if let Some(folder) = self.folders.get_mut(&rel.folder) {
                        folder.remove_item(rel.id.as_str());
                    }
                }
            }
            InversePrimitive::RestoreRelationship(rel) => {
                if let Some(folder) = self.folders.get_mut(&rel.folder) {
                    if !folder.items.iter().any(|i| i == rel.id.as_str()) {
                        folder.items.push(rel.id.0.clone());
                    }
                }
                self.relationships.insert(rel.id.clone(), rel);
            }
            InversePrimitive::RemoveView(id) => {
                if let Some(view) = self.views.shift_remove(&id) {
                    if let Some(folder) = self.folders.get_mut(&view.folder) {
                        folder.remove_item(view.id.as_str());
                    }
                }
            }
            InversePrimitive::RestoreView(view) => {
                if let Some(folder) = self.folders.get_mut(&view.folder) {
                    if !folder.items.iter().any(|i| i == view.id.as_str()) {
                        folder.items.push(view.id.0.clone());
                    }
                }
                self.views.insert(view.id.clone(), *view);
            }
            InversePrimitive::RemoveFolder(id) => {
                if let Some(folder) = self.folders.shift_remove(&id) {
                    if let Some(parent) = folder.parent.and_then(|p| self.folders.get_mut(&p)) {
                        parent.folders.retain(|f| *f != id);
                    }
                }
            }
            InversePrimitive::RestoreFolder(folder) => {
                if let Some(parent) = folder.parent.clone().and_then(|p| self.folders.get_mut(&p)) {
                    if !parent.folders.contains(&folder.id) {
                        parent.folders.push(folder.id.clone());
                    }
                }
                self.folders.insert(folder.id.clone(), folder);
            }
            InversePrimitive::RemoveVisual { view, visual } => {
                if let Some(view) = self.views.get_mut(&view) {
                    view.objects.shift_remove(&visual);
                }
            }
            InversePrimitive::RestoreVisual { view, object } => {
                if let Some(view) = self.views.get_mut(&view) {
                    view.objects.insert(object.id.clone(), object);
                }
            }
            InversePrimitive::RemoveConnection { view, visual } => {
                if let Some(view) = self.views.get_mut(&view) {
                    view.connections.shift_remove(&visual);
                }
            }
            InversePrimitive::RestoreConnection { view, connection } => {
                if let Some(view) = self.views.get_mut(&view) {
                    view.connections.insert(connection.id.clone(), connection);
                }
            }
            InversePrimitive::RestoreVisualBounds { view, visual, bounds, parent } => {
                if let Some(object) = self
                    .views
                    .get_mut(&view)
                    .and_then(|v| v.objects.get_mut(&visual))
                {
                    object.bounds = bounds;
                    object.parent = parent;
                }
            }
            InversePrimitive::RestoreVisualStyle { view, visual, style } => {
                if let Some(object) = self
                    .views
                    .get_mut(&view)
                    .and_then(|v| v.objects.get_mut(&visual))
                {
                    object.style = style;
                }
            }
            InversePrimitive::RestoreConnectionStyle { view, visual, style } => {
                if let Some(connection) = self
                    .views
                    .get_mut(&view)
                    .and_then(|v| v.connections.get_mut(&visual))
                {
                    connection.style = style;
                }
            }
            InversePrimitive::MoveItem { item, from, to } => {
                if let Some(folder) = self.folders.get_mut(&to) {
                    folder.remove_item(&item);
                }
                if let Some(folder) = self.folders.get_mut(&from) {
                    if !folder.items.contains(&item) {
                        folder.items.push(item);
                    }
                }
            }
        }
    }
}
