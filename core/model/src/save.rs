//! Whole-model persistence (C9 save)

use std::path::{Path, PathBuf};

use archihub_core_types::{HubError, HubResult};
use serde::Serialize;
use tracing::info;

use crate::model::Model;

/// Serialized shape of a saved model file
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedModel<'a> {
    name: &'a str,
    saved_at: chrono::DateTime<chrono::Utc>,
    elements: Vec<&'a crate::concept::Element>,
    relationships: Vec<&'a crate::concept::Relationship>,
    views: Vec<&'a crate::view::View>,
    folders: Vec<&'a crate::folder::Folder>,
}

impl Model {
    /// Persist the model as JSON. Without an explicit path, the previously
    /// saved path is reused.
    pub fn save(&mut self, path: Option<&Path>) -> HubResult<PathBuf> {
        let target: PathBuf = match path {
            Some(p) => p.to_path_buf(),
            None => self
                .save_path
                .clone()
                .ok_or_else(|| HubError::Usage("no save path given and none remembered".into()))?,
        };

        let doc = SavedModel {
            name: &self.name,
            saved_at: chrono::Utc::now(),
            elements: self.elements.values().collect(),
            relationships: self.relationships.values().collect(),
            views: self.views.values().collect(),
            folders: self.folders.values().collect(),
        };
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| HubError::Fatal(format!("serialize model: {e}")))?;
        std::fs::write(&target, json)?;

        info!(path = %target.display(), "model saved");
        self.save_path = Some(target.clone());
        Ok(target)
    }
}
