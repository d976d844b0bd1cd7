//! In-memory ArchiMate model graph, its mutation primitives and the editor
//! actor that owns it.
//!
//! All mutation goes through the adapter primitives in [`adapter`], which
//! record undo information; all cross-thread access goes through the
//! [`actor::EditorHandle`].

pub mod actor;
pub mod adapter;
pub mod concept;
pub mod diagnostics;
pub mod folder;
pub mod model;
pub mod save;
pub mod snapshot;
pub mod undo;
pub mod view;

pub use actor::{EditorHandle, spawn_editor};
pub use adapter::{ElementPatch, NewElement, NewRelationship, RelationshipPatch};
pub use concept::{Element, Relationship, element_identity_key, relationship_identity_key};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticReport, Severity};
pub use folder::{Folder, FolderKind};
pub use model::Model;
pub use snapshot::{ElementSummary, ModelStats, RelationshipSummary, SearchFilter, Snapshot, ViewSummary};
pub use view::{RouterPreset, View, VisualConnection, VisualKind, VisualObject};
