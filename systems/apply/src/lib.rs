//! BOM apply subsystem: validation, reference resolution, chunked
//! execution, and the async operation queue.

pub mod bom;
pub mod engine;
pub mod operation;
pub mod options;
pub mod planner;
pub mod queue;
pub mod resolver;
pub mod validate;

pub use bom::{BOM_VERSION, BomDocument, Change, MAX_CHANGES, load_bom_file, load_id_file};
pub use engine::ApplyEngine;
pub use operation::{
    ChangeOutcome, Digest, OperationRecord, OperationStatus, OutcomeStatus, TimelineEvent,
};
pub use options::{ApplyOptions, DuplicateStrategy, LayoutAlgorithm};
pub use planner::PlanReport;
pub use queue::{DEFAULT_OP_TTL, OperationStore, spawn_sweeper};
