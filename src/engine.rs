use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::WatcherState;
use crate::types::{AuctionState, MintEvent};

/// Poll cadence used by the watcher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// While the current auction is still running.
    pub long: Duration,
    /// After the auction ended, until the next one is observed.
    pub short: Duration,
    /// After a failed oracle read.
    pub retry: Duration,
}

/// Result of comparing a fresh auction snapshot against the watcher state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Oracle id equals the last known id.
    Unchanged,
    /// Oracle id is below the last known id. Ignored.
    Regressed { last_known: u64, observed: u64 },
    /// New ids in ascending order, ending at the oracle id.
    NewItems(Vec<MintEvent>),
}

/// Decide which items are new given the last known id and a fresh snapshot.
///
/// Emits one event per id in `(last_known, current]`, ascending.
pub fn detect_new_items(state: WatcherState, auction: &AuctionState) -> Detection {
    let last_known = state.last_known_item_id;
    let observed = auction.current_item_id;

    if observed == last_known {
        Detection::Unchanged
    } else if observed < last_known {
        Detection::Regressed {
            last_known,
            observed,
        }
    } else {
        Detection::NewItems(
            (last_known + 1..=observed)
                .map(|item_id| MintEvent { item_id })
                .collect(),
        )
    }
}

/// How long to sleep before the next oracle read.
///
/// Long while the auction is open (no mint can happen), short once it has
/// ended: either settlement is pending or the next auction has not been seen yet.
pub fn next_poll_delay(auction: &AuctionState, now: DateTime<Utc>, policy: &PollPolicy) -> Duration {
    if now < auction.end_time {
        policy.long
    } else {
        policy.short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> PollPolicy {
        PollPolicy {
            long: Duration::from_secs(300),
            short: Duration::from_secs(30),
            retry: Duration::from_secs(60),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn auction(id: u64, end: i64, settled: bool) -> AuctionState {
        AuctionState {
            current_item_id: id,
            end_time: at(end),
            settled,
        }
    }

    fn ids(detection: &Detection) -> Vec<u64> {
        match detection {
            Detection::NewItems(events) => events.iter().map(|e| e.item_id).collect(),
            _ => Vec::new(),
        }
    }

    // ── detect_new_items ───────────────────────────────────────────

    #[test]
    fn detect_equal_is_unchanged() {
        let d = detect_new_items(WatcherState::new(5), &auction(5, 0, false));
        assert_eq!(d, Detection::Unchanged);
    }

    #[test]
    fn detect_single_step() {
        let d = detect_new_items(WatcherState::new(5), &auction(6, 0, false));
        assert_eq!(ids(&d), vec![6]);
    }

    #[test]
    fn detect_skipped_ids_in_order() {
        let d = detect_new_items(WatcherState::new(5), &auction(7, 0, false));
        assert_eq!(ids(&d), vec![6, 7]);
    }

    #[test]
    fn detect_regression_is_reported_not_emitted() {
        let d = detect_new_items(WatcherState::new(9), &auction(4, 0, true));
        assert_eq!(
            d,
            Detection::Regressed {
                last_known: 9,
                observed: 4
            }
        );
    }

    #[test]
    fn detect_from_zero_excludes_zero() {
        let d = detect_new_items(WatcherState::new(0), &auction(3, 0, false));
        assert_eq!(ids(&d), vec![1, 2, 3]);
    }

    #[test]
    fn detect_across_cycles_covers_range_once() {
        let readings = [5, 5, 6, 6, 9, 10, 10, 13];
        let mut state = WatcherState::new(5);
        let mut emitted = Vec::new();
        for id in readings {
            let d = detect_new_items(state, &auction(id, 0, false));
            if let Detection::NewItems(events) = d {
                emitted.extend(events.iter().map(|e| e.item_id));
                state = state.advanced_to(id);
            }
        }
        assert_eq!(emitted, (6..=13).collect::<Vec<_>>());
        assert_eq!(state.last_known_item_id, 13);
    }

    // ── next_poll_delay ────────────────────────────────────────────

    #[test]
    fn delay_long_while_open() {
        let a = auction(5, 1_000, false);
        assert_eq!(next_poll_delay(&a, at(999), &policy()), Duration::from_secs(300));
    }

    #[test]
    fn delay_short_at_end_time() {
        let a = auction(5, 1_000, false);
        assert_eq!(next_poll_delay(&a, at(1_000), &policy()), Duration::from_secs(30));
    }

    #[test]
    fn delay_short_while_unsettled() {
        let a = auction(5, 1_000, false);
        assert_eq!(next_poll_delay(&a, at(5_000), &policy()), Duration::from_secs(30));
    }

    #[test]
    fn delay_short_when_settled_but_next_not_seen() {
        let a = auction(5, 1_000, true);
        assert_eq!(next_poll_delay(&a, at(1_200), &policy()), Duration::from_secs(30));
    }

    #[test]
    fn delay_long_once_next_auction_open() {
        let a = auction(6, 90_000, false);
        assert_eq!(next_poll_delay(&a, at(1_200), &policy()), Duration::from_secs(300));
    }

    #[test]
    fn delay_deterministic_for_fixed_inputs() {
        let a = auction(5, 1_000, false);
        let first = next_poll_delay(&a, at(2_000), &policy());
        for _ in 0..10 {
            assert_eq!(next_poll_delay(&a, at(2_000), &policy()), first);
        }
    }
}
