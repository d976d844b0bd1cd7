pub mod catalog;
pub mod error;
pub mod geometry;
pub mod id;
pub mod shared;
pub mod style;

// Re-export commonly used types
pub use catalog::{
    AccessVariant, ElementType, Layer, RelationshipType, allowed_relationship, self_loop_allowed,
};
pub use error::{ErrorCode, HubError, HubResult};
pub use geometry::{AbsolutePoint, Bounds, ParentRelativePoint};
pub use id::{
    ElementId, FolderId, OperationId, Ref, RelationshipId, TempId, ViewId, VisualId,
};
pub use shared::{Handle, Shared, handle, shared};
pub use style::{TextAlignment, VisualStyle};
