//! ArchiMate concept catalog and the default allowed-relationship matrix
//!
//! The catalog is an input to the control plane: validation consults it but
//! never extends it. The shipped matrix derives permissions from structural
//! element kinds rather than a literal 60x11x60 table.

use serde::{Deserialize, Serialize};

/// The eight catalog layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Strategy,
    Business,
    Application,
    Technology,
    Physical,
    Motivation,
    Implementation,
    Other,
}

/// Structural kind used by the matrix rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    ActiveStructure,
    Behavior,
    PassiveStructure,
    Motivation,
    Composite,
}

/// Closed element type catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    // Strategy
    Resource,
    Capability,
    CourseOfAction,
    ValueStream,
    // Business
    BusinessActor,
    BusinessRole,
    BusinessCollaboration,
    BusinessInterface,
    BusinessProcess,
    BusinessFunction,
    BusinessInteraction,
    BusinessEvent,
    BusinessService,
    BusinessObject,
    Contract,
    Representation,
    Product,
    // Application
    ApplicationComponent,
    ApplicationCollaboration,
    ApplicationInterface,
    ApplicationFunction,
    ApplicationInteraction,
    ApplicationProcess,
    ApplicationEvent,
    ApplicationService,
    DataObject,
    // Technology
    Node,
    Device,
    SystemSoftware,
    TechnologyCollaboration,
    TechnologyInterface,
    Path,
    CommunicationNetwork,
    TechnologyFunction,
    TechnologyProcess,
    TechnologyInteraction,
    TechnologyEvent,
    TechnologyService,
    Artifact,
    // Physical
    Equipment,
    Facility,
    DistributionNetwork,
    Material,
    // Motivation
    Stakeholder,
    Driver,
    Assessment,
    Goal,
    Outcome,
    Principle,
    Requirement,
    Constraint,
    Meaning,
    Value,
    // Implementation & migration
    WorkPackage,
    Deliverable,
    ImplementationEvent,
    Plateau,
    Gap,
    // Other
    Location,
    Grouping,
}

impl ElementType {
    pub fn layer(&self) -> Layer {
        use ElementType::*;
        match self {
            Resource | Capability | CourseOfAction | ValueStream => Layer::Strategy,
            BusinessActor | BusinessRole | BusinessCollaboration | BusinessInterface
            | BusinessProcess | BusinessFunction | BusinessInteraction | BusinessEvent
            | BusinessService | BusinessObject | Contract | Representation | Product => {
                Layer::Business
            }
            ApplicationComponent | ApplicationCollaboration | ApplicationInterface
            | ApplicationFunction | ApplicationInteraction | ApplicationProcess
            | ApplicationEvent | ApplicationService | DataObject => Layer::Application,
            Node | Device | SystemSoftware | TechnologyCollaboration | TechnologyInterface
            | Path | CommunicationNetwork | TechnologyFunction | TechnologyProcess
            | TechnologyInteraction | TechnologyEvent | TechnologyService | Artifact => {
                Layer::Technology
            }
            Equipment | Facility | DistributionNetwork | Material => Layer::Physical,
            Stakeholder | Driver | Assessment | Goal | Outcome | Principle | Requirement
            | Constraint | Meaning | Value => Layer::Motivation,
            WorkPackage | Deliverable | ImplementationEvent | Plateau | Gap => {
                Layer::Implementation
            }
            Location | Grouping => Layer::Other,
        }
    }

    pub fn kind(&self) -> ElementKind {
        use ElementType::*;
        match self {
            Resource | BusinessActor | BusinessRole | BusinessCollaboration
            | BusinessInterface | ApplicationComponent | ApplicationCollaboration
            | ApplicationInterface | Node | Device | SystemSoftware
            | TechnologyCollaboration | TechnologyInterface | Path | CommunicationNetwork
            | Equipment | Facility | DistributionNetwork => ElementKind::ActiveStructure,

            Capability | CourseOfAction | ValueStream | BusinessProcess | BusinessFunction
            | BusinessInteraction | BusinessEvent | BusinessService | ApplicationFunction
            | ApplicationInteraction | ApplicationProcess | ApplicationEvent
            | ApplicationService | TechnologyFunction | TechnologyProcess
            | TechnologyInteraction | TechnologyEvent | TechnologyService | WorkPackage
            | ImplementationEvent => ElementKind::Behavior,

            BusinessObject | Contract | Representation | Product | DataObject | Artifact
            | Material | Deliverable | Gap => ElementKind::PassiveStructure,

            Stakeholder | Driver | Assessment | Goal | Outcome | Principle | Requirement
            | Constraint | Meaning | Value => ElementKind::Motivation,

            Plateau | Location | Grouping => ElementKind::Composite,
        }
    }

    /// Canonical wire name ("business-actor")
    pub fn wire_name(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Closed relationship type catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    #[serde(rename = "composition-relationship")]
    Composition,
    #[serde(rename = "aggregation-relationship")]
    Aggregation,
    #[serde(rename = "assignment-relationship")]
    Assignment,
    #[serde(rename = "realization-relationship")]
    Realization,
    #[serde(rename = "serving-relationship")]
    Serving,
    #[serde(rename = "access-relationship")]
    Access,
    #[serde(rename = "influence-relationship")]
    Influence,
    #[serde(rename = "triggering-relationship")]
    Triggering,
    #[serde(rename = "flow-relationship")]
    Flow,
    #[serde(rename = "specialization-relationship")]
    Specialization,
    #[serde(rename = "association-relationship")]
    Association,
}

impl RelationshipType {
    pub fn wire_name(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Access direction of an access-relationship; part of relationship identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessVariant {
    Read,
    Write,
    ReadWrite,
    #[default]
    Generic,
}

/// Whether a relationship of this type may connect an element to itself
pub fn self_loop_allowed(rel: RelationshipType) -> bool {
    matches!(rel, RelationshipType::Association | RelationshipType::Flow)
}

/// Default allowed-relationship matrix.
///
/// Permissions are derived from the structural kind of both endpoints.
/// Grouping and Location may structure anything; association connects any
/// two concepts.
pub fn allowed_relationship(
    src: ElementType,
    rel: RelationshipType,
    tgt: ElementType,
) -> bool {
    use ElementKind::*;
    use RelationshipType::*;

    let sk = src.kind();
    let tk = tgt.kind();

    match rel {
        Association => true,
        Specialization => src == tgt,
        Composition | Aggregation => {
            sk == Composite
                || tk == Composite
                || src.layer() == tgt.layer()
        }
        Assignment => sk == ActiveStructure && matches!(tk, Behavior | ActiveStructure),
        Serving => {
            matches!(sk, ActiveStructure | Behavior) && matches!(tk, ActiveStructure | Behavior)
        }
        Access => matches!(sk, ActiveStructure | Behavior) && tk == PassiveStructure,
        Realization => {
            matches!(sk, ActiveStructure | Behavior | PassiveStructure)
                && matches!(tk, Behavior | PassiveStructure | Motivation)
        }
        Influence => tk == Motivation,
        Triggering | Flow => {
            matches!(sk, ActiveStructure | Behavior) && matches!(tk, ActiveStructure | Behavior)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_kebab_case() {
        assert_eq!(ElementType::BusinessActor.wire_name(), "business-actor");
        assert_eq!(ElementType::CourseOfAction.wire_name(), "course-of-action");
        assert_eq!(RelationshipType::Access.wire_name(), "access-relationship");
    }

    #[test]
    fn layer_partition_covers_strategy_and_physical() {
        assert_eq!(ElementType::Capability.layer(), Layer::Strategy);
        assert_eq!(ElementType::Equipment.layer(), Layer::Physical);
        assert_eq!(ElementType::Grouping.layer(), Layer::Other);
    }

    #[test]
    fn matrix_permits_actor_assignment_to_process() {
        assert!(allowed_relationship(
            ElementType::BusinessActor,
            RelationshipType::Assignment,
            ElementType::BusinessProcess,
        ));
    }

    #[test]
    fn matrix_rejects_object_triggering_actor() {
        assert!(!allowed_relationship(
            ElementType::BusinessObject,
            RelationshipType::Triggering,
            ElementType::BusinessActor,
        ));
    }

    #[test]
    fn access_requires_passive_target() {
        assert!(allowed_relationship(
            ElementType::BusinessProcess,
            RelationshipType::Access,
            ElementType::BusinessObject,
        ));
        assert!(!allowed_relationship(
            ElementType::BusinessProcess,
            RelationshipType::Access,
            ElementType::BusinessActor,
        ));
    }

    #[test]
    fn self_loops_limited_to_association_and_flow() {
        assert!(self_loop_allowed(RelationshipType::Flow));
        assert!(self_loop_allowed(RelationshipType::Association));
        assert!(!self_loop_allowed(RelationshipType::Composition));
    }
}
