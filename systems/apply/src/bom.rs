//! Bill of Materials: the declarative change list clients submit
//!
//! A BOM is a JSON document with a closed set of change operations. Other
//! BOM files can be composed in via `includes`, and previously produced
//! tempId maps preloaded via `idFiles`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use archihub_core_types::{
    AccessVariant, ElementType, HubError, HubResult, Layer, RelationshipType, VisualStyle,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const BOM_VERSION: &str = "1.0";

/// Hard cap on changes per apply request
pub const MAX_CHANGES: usize = 1000;

/// A parsed BOM document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomDocument {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Other BOM files to splice in before this document's changes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    /// `.ids.json` files whose tempId→realId maps are preloaded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_files: Vec<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

fn default_true() -> bool {
    true
}

/// One change operation; the `op` discriminator selects the variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Change {
    #[serde(rename_all = "camelCase")]
    CreateElement {
        #[serde(rename = "type")]
        element_type: ElementType,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        documentation: Option<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<String>,
    },
    /// Upsert form: reuse the existing element matching (type, name)
    #[serde(rename_all = "camelCase")]
    CreateOrGetElement {
        #[serde(rename = "type")]
        element_type: ElementType,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        documentation: Option<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CreateRelationship {
        #[serde(rename = "type")]
        relationship_type: RelationshipType,
        source_id: String,
        target_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_type: Option<AccessVariant>,
        #[serde(skip_serializing_if = "Option::is_none")]
        strength: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<String>,
    },
    /// Upsert form: reuse the existing relationship with the same identity
    #[serde(rename_all = "camelCase")]
    CreateOrGetRelationship {
        #[serde(rename = "type")]
        relationship_type: RelationshipType,
        source_id: String,
        target_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_type: Option<AccessVariant>,
        #[serde(skip_serializing_if = "Option::is_none")]
        strength: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateElement {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        documentation: Option<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateRelationship {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_type: Option<AccessVariant>,
        #[serde(skip_serializing_if = "Option::is_none")]
        strength: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteElement {
        id: String,
        #[serde(default = "default_true")]
        cascade: bool,
    },
    #[serde(rename_all = "camelCase")]
    DeleteRelationship { id: String },
    #[serde(rename_all = "camelCase")]
    SetProperty {
        id: String,
        key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MoveToFolder { id: String, folder_id: String },
    #[serde(rename_all = "camelCase")]
    CreateFolder {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        layer: Option<Layer>,
    },
    #[serde(rename_all = "camelCase")]
    CreateView {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        viewpoint: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteView { view_id: String },
    #[serde(rename_all = "camelCase")]
    AddToView {
        view_id: String,
        element_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
        /// When set, x/y are relative to this parent visual
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_visual_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<VisualStyle>,
    },
    #[serde(rename_all = "camelCase")]
    NestInView {
        view_id: String,
        visual_id: String,
        parent_visual_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    AddConnectionToView {
        view_id: String,
        relationship_id: String,
        source_visual_id: String,
        target_visual_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteConnectionFromView {
        view_id: String,
        connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StyleViewObject {
        view_id: String,
        visual_id: String,
        style: VisualStyle,
    },
    #[serde(rename_all = "camelCase")]
    StyleConnection {
        view_id: String,
        connection_id: String,
        style: VisualStyle,
    },
    #[serde(rename_all = "camelCase")]
    MoveViewObject {
        view_id: String,
        visual_id: String,
        x: f64,
        y: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    CreateNote {
        view_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    CreateGroup {
        view_id: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
}

/// Role a reference field plays, used by the resolver's name fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Element,
    Relationship,
    View,
    Visual,
    Folder,
}

impl Change {
    /// Wire name of the op discriminator
    pub fn op_name(&self) -> &'static str {
        match self {
            Change::CreateElement { .. } => "createElement",
            Change::CreateOrGetElement { .. } => "createOrGetElement",
            Change::CreateRelationship { .. } => "createRelationship",
            Change::CreateOrGetRelationship { .. } => "createOrGetRelationship",
            Change::UpdateElement { .. } => "updateElement",
            Change::UpdateRelationship { .. } => "updateRelationship",
            Change::DeleteElement { .. } => "deleteElement",
            Change::DeleteRelationship { .. } => "deleteRelationship",
            Change::SetProperty { .. } => "setProperty",
            Change::MoveToFolder { .. } => "moveToFolder",
            Change::CreateFolder { .. } => "createFolder",
            Change::CreateView { .. } => "createView",
            Change::DeleteView { .. } => "deleteView",
            Change::AddToView { .. } => "addToView",
            Change::NestInView { .. } => "nestInView",
            Change::AddConnectionToView { .. } => "addConnectionToView",
            Change::DeleteConnectionFromView { .. } => "deleteConnectionFromView",
            Change::StyleViewObject { .. } => "styleViewObject",
            Change::StyleConnection { .. } => "styleConnection",
            Change::MoveViewObject { .. } => "moveViewObject",
            Change::CreateNote { .. } => "createNote",
            Change::CreateGroup { .. } => "createGroup",
        }
    }

    /// tempId this change declares for the entity it creates, if any
    pub fn declared_temp_id(&self) -> Option<&str> {
        match self {
            Change::CreateElement { temp_id, .. }
            | Change::CreateOrGetElement { temp_id, .. }
            | Change::CreateRelationship { temp_id, .. }
            | Change::CreateOrGetRelationship { temp_id, .. }
            | Change::CreateFolder { temp_id, .. }
            | Change::CreateView { temp_id, .. }
            | Change::AddToView { temp_id, .. }
            | Change::AddConnectionToView { temp_id, .. }
            | Change::CreateNote { temp_id, .. }
            | Change::CreateGroup { temp_id, .. } => temp_id.as_deref(),
            _ => None,
        }
    }

    /// Every symbolic reference field, with the kind of entity it names
    pub fn reference_fields(&mut self) -> Vec<(RefKind, &mut String)> {
        match self {
            Change::CreateElement { folder_id, .. }
            | Change::CreateOrGetElement { folder_id, .. } => folder_id
                .as_mut()
                .map(|f| (RefKind::Folder, f))
                .into_iter()
                .collect(),
            Change::CreateRelationship { source_id, target_id, folder_id, .. }
            | Change::CreateOrGetRelationship { source_id, target_id, folder_id, .. } => {
                let mut fields = vec![
                    (RefKind::Element, source_id),
                    (RefKind::Element, target_id),
                ];
                if let Some(folder) = folder_id.as_mut() {
                    fields.push((RefKind::Folder, folder));
                }
                fields
            }
            Change::UpdateElement { id, .. } | Change::DeleteElement { id, .. } => {
                vec![(RefKind::Element, id)]
            }
            Change::UpdateRelationship { id, .. } | Change::DeleteRelationship { id } => {
                vec![(RefKind::Relationship, id)]
            }
            Change::SetProperty { id, .. } => vec![(RefKind::Element, id)],
            Change::MoveToFolder { id, folder_id } => {
                vec![(RefKind::Element, id), (RefKind::Folder, folder_id)]
            }
            Change::CreateFolder { parent_id, .. } => parent_id
                .as_mut()
                .map(|p| (RefKind::Folder, p))
                .into_iter()
                .collect(),
            Change::CreateView { folder_id, .. } => folder_id
                .as_mut()
                .map(|f| (RefKind::Folder, f))
                .into_iter()
                .collect(),
            Change::DeleteView { view_id } => vec![(RefKind::View, view_id)],
            Change::AddToView { view_id, element_id, parent_visual_id, .. } => {
                let mut fields = vec![
                    (RefKind::View, view_id),
                    (RefKind::Element, element_id),
                ];
                if let Some(parent) = parent_visual_id.as_mut() {
                    fields.push((RefKind::Visual, parent));
                }
                fields
            }
            Change::NestInView { view_id, visual_id, parent_visual_id, .. } => vec![
                (RefKind::View, view_id),
                (RefKind::Visual, visual_id),
                (RefKind::Visual, parent_visual_id),
            ],
            Change::AddConnectionToView {
                view_id,
                relationship_id,
                source_visual_id,
                target_visual_id,
                ..
            } => vec![
                (RefKind::View, view_id),
                (RefKind::Relationship, relationship_id),
                (RefKind::Visual, source_visual_id),
                (RefKind::Visual, target_visual_id),
            ],
            Change::DeleteConnectionFromView { view_id, connection_id } => vec![
                (RefKind::View, view_id),
                (RefKind::Visual, connection_id),
            ],
            Change::StyleViewObject { view_id, visual_id, .. } => vec![
                (RefKind::View, view_id),
                (RefKind::Visual, visual_id),
            ],
            Change::StyleConnection { view_id, connection_id, .. } => vec![
                (RefKind::View, view_id),
                (RefKind::Visual, connection_id),
            ],
            Change::MoveViewObject { view_id, visual_id, .. } => vec![
                (RefKind::View, view_id),
                (RefKind::Visual, visual_id),
            ],
            Change::CreateNote { view_id, .. } | Change::CreateGroup { view_id, .. } => {
                vec![(RefKind::View, view_id)]
            }
        }
    }
}

/// Load a BOM file, splicing `includes` recursively (depth-first, before the
/// including document's own changes) and merging `idFiles` maps.
pub fn load_bom_file(path: &Path) -> HubResult<(BomDocument, HashMap<String, String>)> {
    let mut seen = Vec::new();
    load_bom_inner(path, &mut seen)
}

/// Compose an inline BOM document: splice its `includes` and load its
/// `idFiles`, resolving paths against `base_dir` (the submitted bomPath's
/// directory, or the server working directory).
pub fn compose_document(
    mut doc: BomDocument,
    base_dir: Option<&Path>,
) -> HubResult<(BomDocument, HashMap<String, String>)> {
    if doc.version != BOM_VERSION {
        return Err(HubError::Usage(format!(
            "unsupported BOM version '{}'",
            doc.version
        )));
    }
    let base = base_dir.unwrap_or(Path::new("."));

    let mut id_map = HashMap::new();
    for id_file in &doc.id_files {
        id_map.extend(load_id_file(&base.join(id_file))?);
    }

    let mut changes = Vec::new();
    for include in &doc.includes {
        let (included, included_ids) = load_bom_file(&base.join(include))?;
        changes.extend(included.changes);
        id_map.extend(included_ids);
    }
    changes.append(&mut doc.changes);
    doc.changes = changes;
    doc.includes.clear();

    Ok((doc, id_map))
}

fn load_bom_inner(
    path: &Path,
    seen: &mut Vec<PathBuf>,
) -> HubResult<(BomDocument, HashMap<String, String>)> {
    let canonical = path
        .canonicalize()
        .map_err(|e| HubError::Usage(format!("cannot read BOM {}: {e}", path.display())))?;
    if seen.contains(&canonical) {
        return Err(HubError::Usage(format!(
            "include cycle through {}",
            path.display()
        )));
    }
    seen.push(canonical);

    let text = std::fs::read_to_string(path)
        .map_err(|e| HubError::Usage(format!("cannot read BOM {}: {e}", path.display())))?;
    let mut doc: BomDocument = serde_json::from_str(&text)
        .map_err(|e| HubError::Usage(format!("malformed BOM {}: {e}", path.display())))?;
    if doc.version != BOM_VERSION {
        return Err(HubError::Usage(format!(
            "unsupported BOM version '{}' in {}",
            doc.version,
            path.display()
        )));
    }

    let base = path.parent().unwrap_or(Path::new("."));
    let mut id_map = HashMap::new();
    for id_file in &doc.id_files {
        let resolved = base.join(id_file);
        id_map.extend(load_id_file(&resolved)?);
    }

    let mut changes = Vec::new();
    for include in &doc.includes {
        let resolved = base.join(include);
        let (included, included_ids) = load_bom_inner(&resolved, seen)?;
        changes.extend(included.changes);
        id_map.extend(included_ids);
    }
    changes.append(&mut doc.changes);
    doc.changes = changes;
    doc.includes.clear();

    Ok((doc, id_map))
}

/// Load one `.ids.json` flat tempId→realId map
pub fn load_id_file(path: &Path) -> HubResult<HashMap<String, String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| HubError::Usage(format!("cannot read idFile {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| HubError::Usage(format!("malformed idFile {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_union_round_trips_by_op_tag() {
        let json = serde_json::json!({
            "op": "createElement",
            "type": "business-actor",
            "name": "Customer",
            "tempId": "t1",
        });
        let change: Change = serde_json::from_value(json).unwrap();
        assert_eq!(change.op_name(), "createElement");
        assert_eq!(change.declared_temp_id(), Some("t1"));
    }

    #[test]
    fn unknown_op_is_rejected() {
        let json = serde_json::json!({ "op": "teleportElement", "id": "x" });
        assert!(serde_json::from_value::<Change>(json).is_err());
    }

    #[test]
    fn delete_element_cascade_defaults_true() {
        let change: Change =
            serde_json::from_value(serde_json::json!({ "op": "deleteElement", "id": "id-1" }))
                .unwrap();
        match change {
            Change::DeleteElement { cascade, .. } => assert!(cascade),
            _ => unreachable!(),
        }
    }

    #[test]
    fn reference_fields_cover_connection_endpoints() {
        let mut change: Change = serde_json::from_value(serde_json::json!({
            "op": "addConnectionToView",
            "viewId": "v",
            "relationshipId": "r",
            "sourceVisualId": "a",
            "targetVisualId": "b",
        }))
        .unwrap();
        let kinds: Vec<RefKind> = change.reference_fields().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![RefKind::View, RefKind::Relationship, RefKind::Visual, RefKind::Visual]
        );
    }

    #[test]
    fn includes_splice_before_own_changes() {
        let dir = std::env::temp_dir().join("archihub-bom-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("base.json"),
            serde_json::json!({
                "version": "1.0",
                "changes": [
                    { "op": "createElement", "type": "business-actor", "name": "Base", "tempId": "base" }
                ]
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.join("main.json"),
            serde_json::json!({
                "version": "1.0",
                "includes": ["base.json"],
                "changes": [
                    { "op": "createElement", "type": "business-actor", "name": "Main", "tempId": "main" }
                ]
            })
            .to_string(),
        )
        .unwrap();

        let (doc, _) = load_bom_file(&dir.join("main.json")).unwrap();
        assert_eq!(doc.changes.len(), 2);
        assert_eq!(doc.changes[0].declared_temp_id(), Some("base"));
        assert_eq!(doc.changes[1].declared_temp_id(), Some("main"));
    }
}
