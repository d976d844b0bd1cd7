//! Apply-time options

use serde::{Deserialize, Serialize};

pub const MIN_CHUNK_SIZE: usize = 1;
pub const MAX_CHUNK_SIZE: usize = 50;

/// Chunk size used by the throughput (`--fast`) profile
pub const FAST_CHUNK_SIZE: usize = 20;

/// How a duplicate creation is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateStrategy {
    /// Reject the submission
    #[default]
    Error,
    /// Resolve to the existing entity's real id without creating
    Reuse,
    /// Append a deterministic suffix; elements only
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithm {
    #[default]
    Dagre,
    Sugiyama,
}

/// Options accepted alongside a BOM on /model/apply and /model/plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyOptions {
    /// 1..=50; 1 favors precise failure isolation, 20 favors throughput
    pub chunk_size: usize,
    pub duplicate_strategy: DuplicateStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub continue_on_error: bool,
    /// Allow exact-name fallback when a reference is otherwise unresolved
    pub resolve_names: bool,
    /// Run auto-layout on every touched view after a successful apply
    pub layout_after: bool,
    pub layout_algorithm: LayoutAlgorithm,
    /// Deprecated alias of duplicateStrategy=reuse for elements
    pub skip_existing: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1,
            duplicate_strategy: DuplicateStrategy::default(),
            idempotency_key: None,
            continue_on_error: false,
            resolve_names: false,
            layout_after: false,
            layout_algorithm: LayoutAlgorithm::default(),
            skip_existing: false,
        }
    }
}

impl ApplyOptions {
    /// Normalize legacy fields and clamp ranges; fast mode widens chunks.
    pub fn normalized(mut self, fast: bool) -> Self {
        if self.skip_existing {
            // Legacy alias; the modern field wins when both are set
            if self.duplicate_strategy == DuplicateStrategy::Error {
                self.duplicate_strategy = DuplicateStrategy::Reuse;
            }
            self.skip_existing = false;
        }
        if fast && self.chunk_size == 1 {
            self.chunk_size = FAST_CHUNK_SIZE;
        }
        self.chunk_size = self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_favor_correctness() {
        let options = ApplyOptions::default();
        assert_eq!(options.chunk_size, 1);
        assert_eq!(options.duplicate_strategy, DuplicateStrategy::Error);
        assert!(!options.continue_on_error);
    }

    #[test]
    fn skip_existing_is_an_alias_for_reuse() {
        let options = ApplyOptions {
            skip_existing: true,
            ..Default::default()
        }
        .normalized(false);
        assert_eq!(options.duplicate_strategy, DuplicateStrategy::Reuse);
        assert!(!options.skip_existing);
    }

    #[test]
    fn fast_profile_widens_default_chunks_only() {
        assert_eq!(ApplyOptions::default().normalized(true).chunk_size, 20);
        let explicit = ApplyOptions {
            chunk_size: 5,
            ..Default::default()
        };
        assert_eq!(explicit.normalized(true).chunk_size, 5);
    }

    #[test]
    fn chunk_size_is_clamped() {
        let options = ApplyOptions {
            chunk_size: 500,
            ..Default::default()
        }
        .normalized(false);
        assert_eq!(options.chunk_size, 50);
    }
}
