use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Stage;

/// Snapshot of the auction house, produced by a single oracle read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionState {
    /// Id of the item currently (or most recently) under auction.
    pub current_item_id: u64,
    pub end_time: DateTime<Utc>,
    pub settled: bool,
}

/// A newly detected item, handed to the artwork/publish pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintEvent {
    pub item_id: u64,
}

/// Proof that a publish call went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Id of the uploaded media, if the publisher uploads separately.
    pub media_id: Option<String>,
    /// Id of the created post.
    pub post_id: Option<String>,
    /// True when the publisher only logged the post.
    pub mock: bool,
}

/// What happened to a single emitted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Published { receipt: PublishReceipt },
    Failed { stage: Stage, error: String },
}

/// One JSON line per processed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub timestamp: String,
    pub item_id: u64,
    pub caption: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl ItemReport {
    pub fn is_published(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Published { .. })
    }
}

/// Printed once on shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSummary {
    pub started_at: String,
    pub stopped_at: String,
    pub initial_item_id: u64,
    pub last_known_item_id: u64,
    pub total_polls: u64,
    pub failed_polls: u64,
    pub items_detected: u64,
    pub items_published: u64,
    pub items_failed: u64,
}
