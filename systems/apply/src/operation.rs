//! Operation records: the server-side ledger of one /model/apply submission

use archihub_core_types::OperationId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle of an operation; terminal states are sticky
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Complete | OperationStatus::Error)
    }
}

/// Outcome status of one executed change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Created,
    Reused,
    Renamed,
    Skipped,
    Failed,
}

/// Per-change result record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOutcome {
    /// Index of the change in the submitted (composed) BOM
    pub index: usize,
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_id: Option<String>,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One state-transition event on the operation timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub ts: DateTime<Utc>,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Compact roll-up of outcomes plus integrity flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    /// op-kind → outcome-status → count
    pub by_op: IndexMap<String, IndexMap<String, usize>>,
    /// skip reason → count
    pub by_skip_reason: IndexMap<String, usize>,
    pub ghost_detected: bool,
    pub mapping_incomplete: bool,
    pub allowed_matrix_violations: usize,
}

impl Digest {
    /// Roll outcomes up; `expected_temp_ids` drives the mapping check
    pub fn from_outcomes(
        outcomes: &[ChangeOutcome],
        temp_map: &IndexMap<String, String>,
        expected_temp_ids: &[String],
        ghost_detected: bool,
    ) -> Self {
        let mut digest = Digest {
            ghost_detected,
            ..Default::default()
        };
        for outcome in outcomes {
            let status = format!("{:?}", outcome.status).to_lowercase();
            *digest
                .by_op
                .entry(outcome.op.clone())
                .or_default()
                .entry(status)
                .or_default() += 1;
            if let Some(reason) = &outcome.skip_reason {
                *digest.by_skip_reason.entry(reason.clone()).or_default() += 1;
            }
            if outcome
                .error
                .as_deref()
                .is_some_and(|e| e.contains("matrix"))
            {
                digest.allowed_matrix_violations += 1;
            }
        }
        // Seeded-but-unfilled entries are empty strings; both absence and
        // emptiness count as an incomplete mapping
        digest.mapping_incomplete = expected_temp_ids
            .iter()
            .any(|temp_id| temp_map.get(temp_id).is_none_or(|v| v.is_empty()));
        digest
    }
}

/// The full server-side record of one apply submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub id: OperationId,
    pub status: OperationStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Hash binding the key to this exact payload
    #[serde(skip)]
    pub payload_hash: String,
    pub change_count: usize,
    pub outcomes: Vec<ChangeOutcome>,
    /// tempId → realId for every successful creation
    pub temp_id_map: IndexMap<String, String>,
    pub digest: Digest,
    pub timeline: Vec<TimelineEvent>,
    /// Resolved payload fragments for the changes that failed
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub retry_hints: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Terminal records may be evicted after this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OperationRecord {
    pub fn new(
        description: Option<String>,
        idempotency_key: Option<String>,
        payload_hash: String,
        change_count: usize,
        seeded_temp_ids: &[String],
    ) -> Self {
        let now = Utc::now();
        let mut record = Self {
            id: OperationId::generate(),
            status: OperationStatus::Queued,
            submitted_at: now,
            updated_at: now,
            description,
            idempotency_key,
            payload_hash,
            change_count,
            outcomes: Vec::new(),
            temp_id_map: seeded_temp_ids
                .iter()
                .map(|t| (t.clone(), String::new()))
                .collect(),
            digest: Digest::default(),
            timeline: Vec::new(),
            retry_hints: Vec::new(),
            error: None,
            expires_at: None,
        };
        record.push_event("queued", None);
        record
    }

    pub fn push_event(&mut self, event: &str, note: Option<String>) {
        self.updated_at = Utc::now();
        self.timeline.push(TimelineEvent {
            ts: self.updated_at,
            event: event.to_string(),
            note,
        });
    }

    /// Summary view without the (possibly huge) outcome array
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "operationId": self.id,
            "status": self.status,
            "submittedAt": self.submitted_at,
            "updatedAt": self.updated_at,
            "description": self.description,
            "changeCount": self.change_count,
            "outcomeCount": self.outcomes.len(),
            "digest": self.digest,
            "error": self.error,
        })
    }
}
