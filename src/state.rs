use chrono::{DateTime, Utc};

use crate::types::{ExitSummary, ItemReport};

/// The watcher's only mutable state: the highest item id already handled.
///
/// Passed into each poll and returned from it; never shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherState {
    pub last_known_item_id: u64,
}

impl WatcherState {
    pub fn new(last_known_item_id: u64) -> Self {
        Self { last_known_item_id }
    }

    /// Move the last known id forward. Never moves backwards.
    pub fn advanced_to(self, item_id: u64) -> Self {
        Self {
            last_known_item_id: self.last_known_item_id.max(item_id),
        }
    }
}

/// Counters for the lifetime of one process run.
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub initial_item_id: u64,
    pub total_polls: u64,
    pub failed_polls: u64,
    pub items_detected: u64,
    pub items_published: u64,
    pub items_failed: u64,
}

impl RunStats {
    pub fn new(initial: WatcherState) -> Self {
        Self {
            started_at: Utc::now(),
            initial_item_id: initial.last_known_item_id,
            total_polls: 0,
            failed_polls: 0,
            items_detected: 0,
            items_published: 0,
            items_failed: 0,
        }
    }

    pub fn record_failed_poll(&mut self) {
        self.total_polls += 1;
        self.failed_polls += 1;
    }

    /// Count one successful poll and the items it processed.
    pub fn record_poll(&mut self, reports: &[ItemReport]) {
        self.total_polls += 1;
        self.items_detected += reports.len() as u64;
        for report in reports {
            if report.is_published() {
                self.items_published += 1;
            } else {
                self.items_failed += 1;
            }
        }
    }

    pub fn exit_summary(&self, state: WatcherState) -> ExitSummary {
        ExitSummary {
            started_at: self.started_at.to_rfc3339(),
            stopped_at: Utc::now().to_rfc3339(),
            initial_item_id: self.initial_item_id,
            last_known_item_id: state.last_known_item_id,
            total_polls: self.total_polls,
            failed_polls: self.failed_polls,
            items_detected: self.items_detected,
            items_published: self.items_published,
            items_failed: self.items_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::types::{ItemOutcome, PublishReceipt};

    fn report(item_id: u64, published: bool) -> ItemReport {
        let outcome = if published {
            ItemOutcome::Published {
                receipt: PublishReceipt {
                    media_id: None,
                    post_id: None,
                    mock: true,
                },
            }
        } else {
            ItemOutcome::Failed {
                stage: Stage::Publish,
                error: "boom".into(),
            }
        };
        ItemReport {
            timestamp: String::new(),
            item_id,
            caption: String::new(),
            outcome,
        }
    }

    #[test]
    fn advance_moves_forward() {
        assert_eq!(WatcherState::new(5).advanced_to(7).last_known_item_id, 7);
    }

    #[test]
    fn advance_never_regresses() {
        assert_eq!(WatcherState::new(9).advanced_to(3).last_known_item_id, 9);
    }

    #[test]
    fn stats_count_outcomes() {
        let mut stats = RunStats::new(WatcherState::new(5));
        stats.record_poll(&[]);
        stats.record_failed_poll();
        stats.record_poll(&[report(6, false), report(7, true)]);

        let summary = stats.exit_summary(WatcherState::new(7));
        assert_eq!(summary.initial_item_id, 5);
        assert_eq!(summary.last_known_item_id, 7);
        assert_eq!(summary.total_polls, 3);
        assert_eq!(summary.failed_polls, 1);
        assert_eq!(summary.items_detected, 2);
        assert_eq!(summary.items_published, 1);
        assert_eq!(summary.items_failed, 1);
    }
}
