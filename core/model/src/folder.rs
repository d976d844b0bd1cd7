//! Hierarchical organization tree for concepts and views

use archihub_core_types::{FolderId, Layer};
use serde::{Deserialize, Serialize};

/// What a folder's child list may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    /// Concepts of one layer
    Layer(Layer),
    /// Relationships (all layers)
    Relations,
    /// Diagram views
    Views,
}

/// An organization container; children are ordered
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub kind: FolderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<FolderId>,
    /// Child folder ids, in display order
    #[serde(default)]
    pub folders: Vec<FolderId>,
    /// Member concept/view ids, in display order
    #[serde(default)]
    pub items: Vec<String>,
}

impl Folder {
    pub fn new(name: impl Into<String>, kind: FolderKind, parent: Option<FolderId>) -> Self {
        Self {
            id: FolderId::generate(),
            name: name.into(),
            kind,
            parent,
            folders: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn remove_item(&mut self, item: &str) {
        self.items.retain(|i| i != item);
    }
}
