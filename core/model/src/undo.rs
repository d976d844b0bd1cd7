//! Compound-command undo log
//!
//! Every adapter mutation records an inverse primitive into the open
//! compound. Compounds committed with the same operation tag merge into one
//! undo unit, so a whole BOM collapses to a single undo step while a failed
//! chunk can still be rolled back on its own.

use crate::concept::{Element, Relationship};
use crate::folder::Folder;
use crate::view::{View, VisualConnection, VisualObject};
use archihub_core_types::{Bounds, ElementId, FolderId, RelationshipId, ViewId, VisualId, VisualStyle};

/// Captured inverse of one adapter primitive
#[derive(Debug, Clone)]
pub enum InversePrimitive {
    RemoveElement(ElementId),
    RestoreElement(Element),
    RemoveRelationship(RelationshipId),
    RestoreRelationship(Relationship),
    RemoveView(ViewId),
    RestoreView(Box<View>),
    RemoveFolder(FolderId),
    RestoreFolder(Folder),
    RemoveVisual { view: ViewId, visual: VisualId },
    RestoreVisual { view: ViewId, object: VisualObject },
    RemoveConnection { view: ViewId, visual: VisualId },
    RestoreConnection { view: ViewId, connection: VisualConnection },
    RestoreVisualBounds { view: ViewId, visual: VisualId, bounds: Bounds, parent: Option<VisualId> },
    RestoreVisualStyle { view: ViewId, visual: VisualId, style: VisualStyle },
    RestoreConnectionStyle { view: ViewId, visual: VisualId, style: VisualStyle },
    MoveItem { item: String, from: FolderId, to: FolderId },
}

/// One atomic undoable unit
#[derive(Debug, Clone)]
pub struct Compound {
    pub label: String,
    /// Compounds sharing a tag merge on commit (one undo step per BOM)
    pub tag: Option<String>,
    pub inverses: Vec<InversePrimitive>,
}

/// Append-only list of committed compounds plus at most one open compound
#[derive(Debug, Default)]
pub struct UndoStack {
    committed: Vec<Compound>,
    open: Option<Compound>,
}

impl UndoStack {
    pub fn begin(&mut self, label: impl Into<String>, tag: Option<String>) {
        debug_assert!(self.open.is_none(), "compound already open");
        self.open = Some(Compound {
            label: label.into(),
            tag,
            inverses: Vec::new(),
        });
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Record the inverse of a primitive that just ran
    pub fn record(&mut self, inverse: InversePrimitive) {
        if let Some(open) = self.open.as_mut() {
            open.inverses.push(inverse);
        }
    }

    /// Commit the open compound, merging into the previous one when the
    /// operation tag matches
    pub fn commit(&mut self) {
        let Some(compound) = self.open.take() else {
            return;
        };
        if compound.inverses.is_empty() {
            return;
        }
        if let (Some(tag), Some(top)) = (&compound.tag, self.committed.last_mut()) {
            if top.tag.as_deref() == Some(tag.as_str()) {
                top.inverses.extend(compound.inverses);
                return;
            }
        }
        self.committed.push(compound);
    }

    /// Abandon the open compound and hand its inverses back for rollback
    pub fn take_open(&mut self) -> Vec<InversePrimitive> {
        self.open.take().map(|c| c.inverses).unwrap_or_default()
    }

    /// Pop the most recent undo unit
    pub fn pop(&mut self) -> Option<Compound> {
        self.committed.pop()
    }

    pub fn depth(&self) -> usize {
        self.committed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tag_compounds_merge_into_one_unit() {
        let mut stack = UndoStack::default();
        stack.begin("chunk 0", Some("op-1".into()));
        stack.record(InversePrimitive::RemoveElement(ElementId::from("id-a")));
        stack.commit();
        stack.begin("chunk 1", Some("op-1".into()));
        stack.record(InversePrimitive::RemoveElement(ElementId::from("id-b")));
        stack.commit();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop().unwrap().inverses.len(), 2);
    }

    #[test]
    fn different_tags_stay_separate() {
        let mut stack = UndoStack::default();
        stack.begin("a", Some("op-1".into()));
        stack.record(InversePrimitive::RemoveElement(ElementId::from("id-a")));
        stack.commit();
        stack.begin("b", Some("op-2".into()));
        stack.record(InversePrimitive::RemoveElement(ElementId::from("id-b")));
        stack.commit();
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn empty_compound_commits_to_nothing() {
        let mut stack = UndoStack::default();
        stack.begin("noop", None);
        stack.commit();
        assert_eq!(stack.depth(), 0);
    }
}
