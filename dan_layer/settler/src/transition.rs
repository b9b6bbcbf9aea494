//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use common_types::{Epoch, EpochTrigger};

const LAG_TOLERANCE: u64 = 5;
const GENESIS_WINDOW_MARGIN: Duration = Duration::from_secs(3600);

/// What the loop decided to do this tick (`spec.md` §4.F transition table).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Indexer is catching up; do nothing this tick.
    Noop,
    WaitForGenesis,
    WaitForFinalization,
    /// `submitEpochProof(epochID)`.
    Submit(u64),
    WaitForIndexerIngest,
    /// `retryEpochProof(epochID)` - a reorg was detected.
    Retry(u64),
    /// Interval hasn't elapsed yet; sleep and re-evaluate next tick.
    WaitForNextSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub action: Action,
    pub delay: Duration,
}

/// Pure per-tick decision function. Evaluates the guards of `spec.md` §4.F
/// in order; the first match wins. Kept free of I/O so every scenario in
/// §8 is directly unit-testable without a cache, database, or chain.
#[allow(clippy::too_many_arguments)]
pub fn decide(
    checkpoint: u64,
    latest_finalized: u64,
    last_epoch: Option<&Epoch>,
    last_trigger: Option<&EpochTrigger>,
    on_chain_current_epoch: u64,
    genesis_epoch_time: Option<i64>,
    epoch_interval: Duration,
    now: DateTime<Utc>,
) -> Transition {
    let lag = latest_finalized.saturating_sub(checkpoint);
    if lag > LAG_TOLERANCE {
        return Transition {
            action: Action::Noop,
            delay: Duration::from_secs(5),
        };
    }

    let epoch_interval_chrono =
        chrono::Duration::from_std(epoch_interval).unwrap_or_else(|_| chrono::Duration::zero());

    if let Some(genesis_unix) = genesis_epoch_time {
        if let Some(genesis_time) = Utc.timestamp_opt(genesis_unix, 0).single() {
            let since_genesis = now.signed_duration_since(genesis_time);
            let window = epoch_interval_chrono
                - chrono::Duration::from_std(GENESIS_WINDOW_MARGIN).unwrap_or_else(|_| chrono::Duration::zero());
            if since_genesis < window {
                let remaining = (window - since_genesis).to_std().unwrap_or(Duration::from_secs(1));
                return Transition {
                    action: Action::WaitForGenesis,
                    delay: remaining,
                };
            }
        }
    }

    if let Some(epoch) = last_epoch {
        if !epoch.finalized {
            return Transition {
                action: Action::WaitForFinalization,
                delay: Duration::from_secs(60),
            };
        }
    }

    // `notFound` is treated as "no prior state" (`spec.md` §7): absence of
    // a prior epoch/trigger behaves as if an arbitrarily long time has
    // elapsed since it, so the loop proceeds straight to submission.
    let never = chrono::Duration::weeks(52 * 1000);
    let time_since_last_epoch = last_epoch
        .map(|e| now.signed_duration_since(e.block_timestamp))
        .unwrap_or(never);
    let time_since_last_trigger = last_trigger
        .map(|t| now.signed_duration_since(t.created_at))
        .unwrap_or(never);

    if time_since_last_epoch >= epoch_interval_chrono && time_since_last_trigger >= epoch_interval_chrono {
        return Transition {
            action: Action::Submit(on_chain_current_epoch + 1),
            delay: Duration::ZERO,
        };
    }

    if time_since_last_epoch >= epoch_interval_chrono && time_since_last_trigger < epoch_interval_chrono {
        if let Some(trigger) = last_trigger {
            if trigger.epoch_id == on_chain_current_epoch {
                return Transition {
                    action: Action::WaitForIndexerIngest,
                    delay: Duration::from_secs(5),
                };
            }
        }
    }

    if time_since_last_epoch >= epoch_interval_chrono {
        if let Some(trigger) = last_trigger {
            if trigger.epoch_id > on_chain_current_epoch {
                return Transition {
                    action: Action::Retry(trigger.epoch_id),
                    delay: Duration::ZERO,
                };
            }
        }
    }

    // Otherwise the interval hasn't elapsed: sleep until the next slot, then
    // let the next tick's guard above perform the actual submission.
    let remaining = (epoch_interval_chrono - time_since_last_epoch)
        .to_std()
        .unwrap_or(Duration::from_secs(1));
    Transition {
        action: Action::WaitForNextSlot,
        delay: remaining,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use common_types::TriggerStatus;

    use super::*;

    fn epoch(id: u64, block_timestamp: DateTime<Utc>, finalized: bool) -> Epoch {
        Epoch {
            id,
            block_number: 100,
            block_timestamp,
            finalized,
        }
    }

    fn trigger(epoch_id: u64, created_at: DateTime<Utc>, status: TriggerStatus) -> EpochTrigger {
        EpochTrigger {
            epoch_id,
            transaction_hash: "0xdead".to_string(),
            created_at,
            status,
        }
    }

    #[test]
    fn indexer_lag_delays_tick() {
        let now = Utc::now();
        let transition = decide(100, 110, None, None, 0, None, Duration::from_secs(3600), now);
        assert_eq!(transition.action, Action::Noop);
        assert_eq!(transition.delay, Duration::from_secs(5));
    }

    #[test]
    fn normal_epoch_advance_submits() {
        let now = Utc::now();
        let interval = Duration::from_secs(3600);
        let last_epoch = epoch(41, now - ChronoDuration::seconds(3660), true);
        let last_trigger = trigger(41, now - ChronoDuration::seconds(3660), TriggerStatus::Succeeded);

        let transition = decide(100, 100, Some(&last_epoch), Some(&last_trigger), 41, None, interval, now);
        assert_eq!(transition.action, Action::Submit(42));
        assert_eq!(transition.delay, Duration::ZERO);
    }

    #[test]
    fn reorg_triggers_retry() {
        let now = Utc::now();
        let interval = Duration::from_secs(3600);
        let last_epoch = epoch(41, now - ChronoDuration::seconds(3660), true);
        let last_trigger = trigger(42, now - ChronoDuration::seconds(10), TriggerStatus::Succeeded);

        // on-chain still reports 41 even though we already triggered 42 - a reorg.
        let transition = decide(100, 100, Some(&last_epoch), Some(&last_trigger), 41, None, interval, now);
        assert_eq!(transition.action, Action::Retry(42));
    }

    #[test]
    fn waits_for_finalization() {
        let now = Utc::now();
        let last_epoch = epoch(41, now, false);
        let transition = decide(100, 100, Some(&last_epoch), None, 41, None, Duration::from_secs(3600), now);
        assert_eq!(transition.action, Action::WaitForFinalization);
        assert_eq!(transition.delay, Duration::from_secs(60));
    }

    #[test]
    fn waits_for_indexer_to_ingest_recent_trigger() {
        let now = Utc::now();
        let interval = Duration::from_secs(3600);
        let last_epoch = epoch(41, now - ChronoDuration::seconds(3660), true);
        let last_trigger = trigger(42, now - ChronoDuration::seconds(10), TriggerStatus::Pending);

        let transition = decide(100, 100, Some(&last_epoch), Some(&last_trigger), 42, None, interval, now);
        assert_eq!(transition.action, Action::WaitForIndexerIngest);
    }

    #[test]
    fn sleeps_until_next_slot_when_interval_not_elapsed() {
        let now = Utc::now();
        let interval = Duration::from_secs(3600);
        let last_epoch = epoch(41, now - ChronoDuration::seconds(1800), true);

        let transition = decide(100, 100, Some(&last_epoch), None, 41, None, interval, now);
        assert_eq!(transition.action, Action::WaitForNextSlot);
        assert!(transition.delay > Duration::from_secs(1700) && transition.delay <= Duration::from_secs(1800));
    }
}
