//! Read-consistent snapshots of the model (C8)
//!
//! A snapshot is a structural copy taken on the editor actor; every read
//! endpoint works from one so HTTP workers never observe a half-applied
//! chunk.

use archihub_core_types::{
    ElementId, ElementType, HubError, HubResult, Layer, RelationshipId, RelationshipType, ViewId,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::concept::{Element, Relationship, element_identity_key};
use crate::folder::Folder;
use crate::model::Model;
use crate::view::View;

/// Structural copy of the model at one editor-thread instant
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub model_name: String,
    pub elements: IndexMap<ElementId, Element>,
    pub relationships: IndexMap<RelationshipId, Relationship>,
    pub views: IndexMap<ViewId, View>,
    pub folders: IndexMap<archihub_core_types::FolderId, Folder>,
}

/// Compact element listing used by query/search responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSummary {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
    pub layer: Layer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSummary {
    pub id: RelationshipId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub source: ElementId,
    pub target: ElementId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSummary {
    pub id: ViewId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewpoint: Option<String>,
    pub object_count: usize,
    pub connection_count: usize,
}

/// Counts by type, served by /model/stats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub elements: usize,
    pub relationships: usize,
    pub views: usize,
    pub folders: usize,
    pub elements_by_type: IndexMap<String, usize>,
    pub relationships_by_type: IndexMap<String, usize>,
    pub elements_by_layer: IndexMap<String, usize>,
}

/// Filter set accepted by /model/search
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchFilter {
    #[serde(rename = "type")]
    pub element_type: Option<ElementType>,
    pub layer: Option<Layer>,
    /// Regular expression matched against element names
    pub name: Option<String>,
    /// All listed properties must be present with the given values
    #[serde(default)]
    pub properties: HashMap<String, String>,
    pub limit: Option<usize>,
}

impl Model {
    /// Take a structural copy; called only on the editor actor
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            taken_at: Utc::now(),
            model_name: self.name.clone(),
            elements: self.elements.clone(),
            relationships: self.relationships.clone(),
            views: self.views.clone(),
            folders: self.folders.clone(),
        }
    }
}

impl Snapshot {
    pub fn stats(&self) -> ModelStats {
        let mut by_type: IndexMap<String, usize> = IndexMap::new();
        let mut by_layer: IndexMap<String, usize> = IndexMap::new();
        for element in self.elements.values() {
            *by_type.entry(element.element_type.wire_name()).or_default() += 1;
            *by_layer
                .entry(format!("{:?}", element.element_type.layer()).to_lowercase())
                .or_default() += 1;
        }
        let mut rel_by_type: IndexMap<String, usize> = IndexMap::new();
        for relationship in self.relationships.values() {
            *rel_by_type
                .entry(relationship.relationship_type.wire_name())
                .or_default() += 1;
        }
        ModelStats {
            elements: self.elements.len(),
            relationships: self.relationships.len(),
            views: self.views.len(),
            folders: self.folders.len(),
            elements_by_type: by_type,
            relationships_by_type: rel_by_type,
            elements_by_layer: by_layer,
        }
    }

    /// Filtered element listing; the name filter is a regular expression
    pub fn search(&self, filter: &SearchFilter) -> HubResult<Vec<ElementSummary>> {
        let name_re = match &filter.name {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| HubError::Usage(format!("bad name pattern: {e}")))?,
            ),
            None => None,
        };
        let limit = filter.limit.unwrap_or(usize::MAX);

        let mut hits = Vec::new();
        for element in self.elements.values() {
            if filter
                .element_type
                .is_some_and(|t| element.element_type != t)
            {
                continue;
            }
            if filter
                .layer
                .is_some_and(|l| element.element_type.layer() != l)
            {
                continue;
            }
            if let Some(re) = &name_re {
                if !re.is_match(&element.name) {
                    continue;
                }
            }
            if !filter
                .properties
                .iter()
                .all(|(k, v)| element.properties.get(k) == Some(v))
            {
                continue;
            }
            hits.push(ElementSummary {
                id: element.id.clone(),
                element_type: element.element_type,
                name: element.name.clone(),
                layer: element.element_type.layer(),
            });
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }

    pub fn view_summaries(&self) -> Vec<ViewSummary> {
        self.views
            .values()
            .map(|v| ViewSummary {
                id: v.id.clone(),
                name: v.name.clone(),
                viewpoint: v.viewpoint.clone(),
                object_count: v.objects.len(),
                connection_count: v.connections.len(),
            })
            .collect()
    }

    /// Existing element with the given duplicate-identity key
    pub fn find_element_by_key(
        &self,
        element_type: ElementType,
        name: &str,
    ) -> Option<&Element> {
        let key = element_identity_key(element_type, name);
        self.elements
            .values()
            .find(|e| element_identity_key(e.element_type, &e.name) == key)
    }

    /// All relationship identity keys present in the model
    pub fn relationship_keys(&self) -> HashMap<String, RelationshipId> {
        self.relationships
            .values()
            .map(|r| (r.identity_key(), r.id.clone()))
            .collect()
    }

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
}
