//! The mint watcher: detects new items, drives the artwork → image → publish
//! pipeline for each, and picks the next poll delay.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::chain::{ArtworkFetcher, AuctionOracle};
use crate::engine::{Detection, PollPolicy, detect_new_items, next_poll_delay};
use crate::error::PipelineError;
use crate::publisher::{CaptionTemplate, Publisher};
use crate::render::ImageConverter;
use crate::state::WatcherState;
use crate::types::{AuctionState, ItemOutcome, ItemReport, MintEvent, PublishReceipt};

/// What to assume about items minted before the process started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColdStart {
    /// Take the oracle's current id as already handled.
    SkipExisting,
    /// Treat this id as the last handled one; later items are replayed.
    ReplayAfter(u64),
}

impl From<Option<u64>> for ColdStart {
    fn from(replay_after: Option<u64>) -> Self {
        replay_after.map_or(ColdStart::SkipExisting, ColdStart::ReplayAfter)
    }
}

/// Outcome of one successful oracle read and the items it triggered.
#[derive(Debug, Clone)]
pub struct PollCycle {
    pub state: WatcherState,
    pub auction: AuctionState,
    pub reports: Vec<ItemReport>,
}

/// One loop iteration: the state to carry forward and how long to sleep.
#[derive(Debug, Clone)]
pub struct Tick {
    pub state: WatcherState,
    pub delay: Duration,
    pub reports: Vec<ItemReport>,
    pub poll_error: Option<PipelineError>,
}

pub struct Watcher<O, F, C, P> {
    oracle: O,
    fetcher: F,
    converter: C,
    publisher: P,
    caption: CaptionTemplate,
}

impl<O, F, C, P> Watcher<O, F, C, P>
where
    O: AuctionOracle,
    F: ArtworkFetcher,
    C: ImageConverter,
    P: Publisher,
{
    pub fn new(oracle: O, fetcher: F, converter: C, publisher: P, caption: CaptionTemplate) -> Self {
        Self {
            oracle,
            fetcher,
            converter,
            publisher,
            caption,
        }
    }

    /// Read the oracle once and derive the starting state.
    pub async fn initialize(
        &self,
        cold_start: ColdStart,
    ) -> Result<(WatcherState, AuctionState), PipelineError> {
        let auction = self.oracle.read_auction().await?;
        let state = match cold_start {
            ColdStart::SkipExisting => WatcherState::new(auction.current_item_id),
            ColdStart::ReplayAfter(id) => {
                if id > auction.current_item_id {
                    warn!(
                        "replay_after={id} is ahead of the current item {}; nothing to replay",
                        auction.current_item_id
                    );
                }
                WatcherState::new(id)
            }
        };
        info!(
            "Starting at item {} (oracle: {}, cold start: {cold_start:?})",
            state.last_known_item_id, auction.current_item_id
        );
        Ok((state, auction))
    }

    /// Read the oracle and process every item past `state`, in ascending order.
    ///
    /// On an oracle failure the caller keeps its previous state.
    pub async fn check_for_new_item(&self, state: WatcherState) -> Result<PollCycle, PipelineError> {
        let auction = self.oracle.read_auction().await?;

        let events = match detect_new_items(state, &auction) {
            Detection::Unchanged => {
                debug!("No new items (last known: {})", state.last_known_item_id);
                Vec::new()
            }
            Detection::Regressed {
                last_known,
                observed,
            } => {
                // Only possible if ids are reused after a burn; nothing is emitted.
                warn!("Oracle item id went backwards: {last_known} -> {observed}, ignoring");
                Vec::new()
            }
            Detection::NewItems(events) => {
                info!(
                    "New items detected! {} -> {}",
                    state.last_known_item_id, auction.current_item_id
                );
                events
            }
        };

        let mut reports = Vec::with_capacity(events.len());
        for event in &events {
            reports.push(self.process_item(*event).await);
        }

        let state = match events.last() {
            Some(last) => state.advanced_to(last.item_id),
            None => state,
        };

        Ok(PollCycle {
            state,
            auction,
            reports,
        })
    }

    /// Fetch, convert and publish one item. Failures are logged and reported,
    /// never propagated.
    pub async fn process_item(&self, event: MintEvent) -> ItemReport {
        let caption = self.caption.render(event.item_id);
        let outcome = match self.run_pipeline(event, &caption).await {
            Ok(receipt) => ItemOutcome::Published { receipt },
            Err(e) => {
                warn!(
                    "Item {} failed at {} stage: {e}",
                    event.item_id,
                    e.stage()
                );
                ItemOutcome::Failed {
                    stage: e.stage(),
                    error: e.to_string(),
                }
            }
        };
        ItemReport {
            timestamp: Utc::now().to_rfc3339(),
            item_id: event.item_id,
            caption,
            outcome,
        }
    }

    async fn run_pipeline(
        &self,
        event: MintEvent,
        caption: &str,
    ) -> Result<PublishReceipt, PipelineError> {
        let svg = self.fetcher.read_token_artwork(event.item_id).await?;
        let png = self.converter.to_raster_image(&svg)?;
        info!("Publishing item #{} ({} byte png)", event.item_id, png.len());
        self.publisher.publish(&png, caption).await
    }

    /// One poll plus the delay decision. Oracle failures fall back to the retry interval.
    pub async fn tick(&self, state: WatcherState, policy: &PollPolicy) -> Tick {
        match self.check_for_new_item(state).await {
            Ok(cycle) => Tick {
                state: cycle.state,
                delay: next_poll_delay(&cycle.auction, Utc::now(), policy),
                reports: cycle.reports,
                poll_error: None,
            },
            Err(e) => {
                warn!("Poll failed: {e}");
                Tick {
                    state,
                    delay: policy.retry,
                    reports: Vec::new(),
                    poll_error: Some(e),
                }
            }
        }
    }
}
