//! Model health diagnostics (C8)
//!
//! Ghost detection exists because a failed compound can leave an id in the
//! folder structure without a backing concept; the post-chunk verification
//! in the apply engine uses the same notion.

use archihub_core_types::allowed_relationship;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::concept::element_identity_key;
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    Orphan,
    Ghost,
    MatrixViolation,
    Duplicate,
}

/// One finding with a remediation hint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub subject: String,
    pub message: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub diagnostics: Vec<Diagnostic>,
    pub orphans: usize,
    pub ghosts: usize,
    pub matrix_violations: usize,
    pub duplicates: usize,
}

impl Model {
    /// Full diagnostic sweep; runs on the editor actor
    pub fn diagnostics(&self) -> DiagnosticReport {
        let mut report = DiagnosticReport::default();

        // Ids referenced by the folder structure
        let mut foldered: HashSet<&str> = HashSet::new();
        for folder in self.folders.values() {
            for item in &folder.items {
                foldered.insert(item.as_str());
            }
        }

        // Orphans: concepts in the graph but missing from any folder
        for element in self.elements.values() {
            if !foldered.contains(element.id.as_str()) {
                report.push(Diagnostic {
                    kind: DiagnosticKind::Orphan,
                    severity: Severity::Warning,
                    subject: element.id.to_string(),
                    message: format!("element '{}' is not in any folder", element.name),
                    remediation: "move it into a folder with moveToFolder".into(),
                });
            }
        }
        for relationship in self.relationships.values() {
            if !foldered.contains(relationship.id.as_str()) {
                report.push(Diagnostic {
                    kind: DiagnosticKind::Orphan,
                    severity: Severity::Warning,
                    subject: relationship.id.to_string(),
                    message: "relationship is not in any folder".into(),
                    remediation: "move it into a folder with moveToFolder".into(),
                });
            }
        }

        // Ghosts: folder entries with no backing concept or view
        for folder in self.folders.values() {
            for item in &folder.items {
                let exists = self
                    .elements
                    .contains_key(&archihub_core_types::ElementId::from(item.as_str()))
                    || self
                        .relationships
                        .contains_key(&archihub_core_types::RelationshipId::from(item.as_str()))
                    || self
                        .views
                        .contains_key(&archihub_core_types::ViewId::from(item.as_str()));
                if !exists {
                    report.push(Diagnostic {
                        kind: DiagnosticKind::Ghost,
                        severity: Severity::Error,
                        subject: item.clone(),
                        message: format!(
                            "folder '{}' lists '{item}' but no such concept exists",
                            folder.name
                        ),
                        remediation: "re-apply the originating batch or delete the entry".into(),
                    });
                }
            }
        }

        // Existing relationships that violate the allowed matrix
        for relationship in self.relationships.values() {
            let (Some(source), Some(target)) = (
                self.elements.get(&relationship.source),
                self.elements.get(&relationship.target),
            ) else {
                report.push(Diagnostic {
                    kind: DiagnosticKind::Ghost,
                    severity: Severity::Error,
                    subject: relationship.id.to_string(),
                    message: "relationship endpoint no longer exists".into(),
                    remediation: "delete the relationship".into(),
                });
                continue;
            };
            if !allowed_relationship(
                source.element_type,
                relationship.relationship_type,
                target.element_type,
            ) {
                report.push(Diagnostic {
                    kind: DiagnosticKind::MatrixViolation,
                    severity: Severity::Error,
                    subject: relationship.id.to_string(),
                    message: format!(
                        "{} from {} to {} is not permitted",
                        relationship.relationship_type.wire_name(),
                        source.element_type.wire_name(),
                        target.element_type.wire_name()
                    ),
                    remediation: "delete or retype the relationship".into(),
                });
            }
        }

        // Duplicate (type, name) elements and identical relationships
        let mut element_keys: HashMap<String, u32> = HashMap::new();
        for element in self.elements.values() {
            *element_keys
                .entry(element_identity_key(element.element_type, &element.name))
                .or_default() += 1;
        }
        for (key, count) in element_keys {
            if count > 1 {
                report.push(Diagnostic {
                    kind: DiagnosticKind::Duplicate,
                    severity: Severity::Warning,
                    subject: key.clone(),
                    message: format!("{count} elements share (type, name) '{key}'"),
                    remediation: "merge them or use duplicateStrategy=reuse".into(),
                });
            }
        }
        let mut rel_keys: HashMap<String, u32> = HashMap::new();
        for relationship in self.relationships.values() {
            *rel_keys.entry(relationship.identity_key()).or_default() += 1;
        }
        for (key, count) in rel_keys {
            if count > 1 {
                report.push(Diagnostic {
                    kind: DiagnosticKind::Duplicate,
                    severity: Severity::Warning,
                    subject: key.clone(),
                    message: format!("{count} identical relationships '{key}'"),
                    remediation: "delete the extra relationships".into(),
                });
            }
        }

        report
    }
}

impl DiagnosticReport {
    fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.kind {
            DiagnosticKind::Orphan => self.orphans += 1,
            DiagnosticKind::Ghost => self.ghosts += 1,
            DiagnosticKind::MatrixViolation => self.matrix_violations += 1,
            DiagnosticKind::Duplicate => self.duplicates += 1,
        }
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NewElement;
    use archihub_core_types::ElementType;

    #[test]
    fn clean_model_reports_nothing() {
        let mut m = Model::new("test");
        m.begin_compound("setup", None);
        m.create_element(NewElement {
            element_type: Some(ElementType::BusinessActor),
            name: "A".into(),
            ..Default::default()
        })
        .unwrap();
        m.commit_compound();

        let report = m.diagnostics();
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn duplicate_elements_are_flagged() {
        let mut m = Model::new("test");
        m.begin_compound("setup", None);
        for _ in 0..2 {
            m.create_element(NewElement {
                element_type: Some(ElementType::BusinessActor),
                name: "Twin".into(),
                ..Default::default()
            })
            .unwrap();
        }
        m.commit_compound();

        let report = m.diagnostics();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.ghosts, 0);
    }

    #[test]
    fn dangling_folder_entry_is_a_ghost() {
        let mut m = Model::new("test");
        let root = m.views_root();
        m.folders
            .get_mut(&root)
            .unwrap()
            .items
            .push("id-vanished".into());

        let report = m.diagnostics();
        assert_eq!(report.ghosts, 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Error);
    }
}
