//! Diagram views and their visual instances
//!
//! A visual object's bounds are parent-relative when `parent` is set and
//! view-root otherwise. Connections reference visuals, not concepts.

use archihub_core_types::{
    AbsolutePoint, Bounds, ElementId, FolderId, RelationshipId, ViewId, VisualId, VisualStyle,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Connection routing preset applied per view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterPreset {
    /// Straight lines honoring explicit bendpoints
    #[default]
    Straight,
    /// Right-angle manhattan routing
    Manhattan,
}

/// What a visual object represents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum VisualKind {
    /// Diagram instance of a model element
    Element { element: ElementId },
    /// Free-standing note with text content
    Note { content: String },
    /// Named grouping box, not a model concept
    Group { name: String },
}

/// A visual object on one view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualObject {
    pub id: VisualId,
    #[serde(flatten)]
    pub kind: VisualKind,
    /// Parent-relative when `parent` is set, view-root otherwise
    pub bounds: Bounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<VisualId>,
    #[serde(default, skip_serializing_if = "style_is_default")]
    pub style: VisualStyle,
}

fn style_is_default(s: &VisualStyle) -> bool {
    *s == VisualStyle::default()
}

impl VisualObject {
    pub fn element_id(&self) -> Option<&ElementId> {
        match &self.kind {
            VisualKind::Element { element } => Some(element),
            _ => None,
        }
    }
}

/// A visual instance of a relationship between two visuals on the same view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualConnection {
    pub id: VisualId,
    pub relationship: RelationshipId,
    pub source_visual: VisualId,
    pub target_visual: VisualId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bendpoints: Vec<AbsolutePoint>,
    #[serde(default, skip_serializing_if = "style_is_default")]
    pub style: VisualStyle,
}

impl VisualConnection {
    /// Per-view uniqueness key: the same relationship may not be drawn twice
    /// between the same pair of visuals
    pub fn triple_key(&self) -> (RelationshipId, VisualId, VisualId) {
        (
            self.relationship.clone(),
            self.source_visual.clone(),
            self.target_visual.clone(),
        )
    }
}

/// A named diagram over the model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: ViewId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewpoint: Option<String>,
    pub folder: FolderId,
    #[serde(default)]
    pub objects: IndexMap<VisualId, VisualObject>,
    #[serde(default)]
    pub connections: IndexMap<VisualId, VisualConnection>,
    #[serde(default)]
    pub router: RouterPreset,
}

impl View {
    pub fn new(name: impl Into<String>, viewpoint: Option<String>, folder: FolderId) -> Self {
        Self {
            id: ViewId::generate(),
            name: name.into(),
            viewpoint,
            folder,
            objects: IndexMap::new(),
            connections: IndexMap::new(),
            router: RouterPreset::default(),
        }
    }

    /// Absolute top-left of a visual, walking the parent chain.
    ///
    /// Returns `None` when the visual does not exist or the parent chain is
    /// broken.
    pub fn absolute_origin(&self, id: &VisualId) -> Option<AbsolutePoint> {
        let mut x = 0.0;
        let mut y = 0.0;
        let mut current = self.objects.get(id)?;
        let mut hops = 0usize;
        loop {
            x += current.bounds.x;
            y += current.bounds.y;
            match &current.parent {
                Some(parent) => {
                    current = self.objects.get(parent)?;
                    hops += 1;
                    // nesting is acyclic by construction; bail out rather
                    // than loop if the invariant is ever broken
                    if hops > self.objects.len() {
                        return None;
                    }
                }
                None => return Some(AbsolutePoint::new(x, y)),
            }
        }
    }

    /// Whether `ancestor` appears on `id`'s parent chain
    pub fn is_ancestor(&self, ancestor: &VisualId, id: &VisualId) -> bool {
        let mut current = self.objects.get(id).and_then(|v| v.parent.as_ref());
        let mut hops = 0usize;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.objects.len() {
                return false;
            }
            current = self.objects.get(p).and_then(|v| v.parent.as_ref());
        }
        false
    }

    /// Visuals backed by the given element (a view may show it repeatedly)
    pub fn visuals_of_element(&self, element: &ElementId) -> Vec<&VisualObject> {
        self.objects
            .values()
            .filter(|v| v.element_id() == Some(element))
            .collect()
    }
}
