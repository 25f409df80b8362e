use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why an item was skipped by the per-item pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    IdentityUnresolved,
    OutOfScope,
    RetryWindowActive,
    ContentUnresolved,
    Promotional,
    ExternalAttribution,
    Duplicate,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::IdentityUnresolved => "identity_unresolved",
            SkipReason::OutOfScope => "out_of_scope",
            SkipReason::RetryWindowActive => "retry_window_active",
            SkipReason::ContentUnresolved => "content_unresolved",
            SkipReason::Promotional => "promotional",
            SkipReason::ExternalAttribution => "external_attribution",
            SkipReason::Duplicate => "duplicate",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one item through the pipeline.
///
/// Expected skip paths are values, not exceptions — the navigation loop
/// consumes these without any error handling of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Skip(SkipReason),
    Failed(String),
}

/// Why a navigation loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Processed the requested number of items.
    LimitReached,
    /// The stream reported completion; nothing left to do.
    StreamEnd,
    /// Required context (viewer, page, session) was never established.
    ContextMissing,
    /// Advancing the stream failed and recovery did not help.
    NavigationFailed,
    /// Repeated iterations made no forward movement.
    NoProgress,
    /// Every reachable item was already visited and skipping produced no
    /// forward movement.
    DuplicateKeyStalled,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::LimitReached => "limit_reached",
            ExitReason::StreamEnd => "stream_end",
            ExitReason::ContextMissing => "context_missing",
            ExitReason::NavigationFailed => "navigation_failed",
            ExitReason::NoProgress => "no_progress",
            ExitReason::DuplicateKeyStalled => "duplicate_key_stalled",
        }
    }

    /// True when the run ended for a healthy reason ("nothing left to do"),
    /// as opposed to something being broken.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ExitReason::LimitReached | ExitReason::StreamEnd)
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one workflow invocation.
///
/// Silent partial completion is not allowed: every run reports a typed exit
/// reason and a reason-keyed skip histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub items_seen: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped_by_reason: HashMap<SkipReason, u64>,
    pub exit_reason: ExitReason,
}

impl WorkflowStats {
    pub fn new(exit_reason: ExitReason) -> Self {
        Self {
            items_seen: 0,
            succeeded: 0,
            failed: 0,
            skipped_by_reason: HashMap::new(),
            exit_reason,
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        self.items_seen += 1;
        match outcome {
            Outcome::Done => self.succeeded += 1,
            Outcome::Failed(_) => self.failed += 1,
            Outcome::Skip(reason) => {
                *self.skipped_by_reason.entry(*reason).or_insert(0) += 1;
            }
        }
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped_by_reason.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_histogram() {
        let mut stats = WorkflowStats::new(ExitReason::LimitReached);
        stats.record(&Outcome::Done);
        stats.record(&Outcome::Skip(SkipReason::Duplicate));
        stats.record(&Outcome::Skip(SkipReason::Duplicate));
        stats.record(&Outcome::Failed("boom".into()));

        assert_eq!(stats.items_seen, 4);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped_by_reason[&SkipReason::Duplicate], 2);
        assert_eq!(stats.skipped_total(), 2);
    }

    #[test]
    fn test_healthy_exit_reasons() {
        assert!(ExitReason::LimitReached.is_healthy());
        assert!(ExitReason::StreamEnd.is_healthy());
        assert!(!ExitReason::NoProgress.is_healthy());
        assert!(!ExitReason::DuplicateKeyStalled.is_healthy());
        assert!(!ExitReason::NavigationFailed.is_healthy());
    }
}
