//! Model-level concepts: elements and relationships

use archihub_core_types::{
    AccessVariant, ElementId, ElementType, FolderId, RelationshipId, RelationshipType,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An ArchiMate concept with a durable identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// String properties; key order carries no meaning
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, String>,
    pub folder: FolderId,
}

/// A directed connection between two elements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: RelationshipId,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub source: ElementId,
    pub target: ElementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, String>,
    /// Only meaningful for access-relationships; part of identity
    #[serde(default, skip_serializing_if = "is_generic")]
    pub access_type: AccessVariant,
    /// Only meaningful for influence-relationships; part of identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    pub folder: FolderId,
}

fn is_generic(v: &AccessVariant) -> bool {
    *v == AccessVariant::Generic
}

impl Relationship {
    /// Identity key used for duplicate detection and reuse matching.
    ///
    /// Access variant and influence strength participate so a read-access
    /// and a write-access between the same pair are distinct.
    pub fn identity_key(&self) -> String {
        relationship_identity_key(
            self.relationship_type,
            &self.source,
            &self.target,
            self.access_type,
            self.strength.as_deref(),
        )
    }
}

/// Identity key for a (possibly not yet created) relationship
pub fn relationship_identity_key(
    rel_type: RelationshipType,
    source: &ElementId,
    target: &ElementId,
    access: AccessVariant,
    strength: Option<&str>,
) -> String {
    format!(
        "{}|{}|{}|{:?}|{}",
        rel_type.wire_name(),
        source,
        target,
        access,
        strength.unwrap_or("")
    )
}

/// Identity key for element duplicate detection
pub fn element_identity_key(element_type: ElementType, name: &str) -> String {
    format!("{}|{}", element_type.wire_name(), name)
}
