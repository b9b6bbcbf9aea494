//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

//! Pure, deterministic Node reliability scoring.
//!
//! Callers are responsible for excluding demoted nodes (`epoch_invalid_request
//! >= DEMOTION_THRESHOLD`) upstream; this function does not know about the
//! threshold and will happily score a demoted node if asked to.

use common_types::NodeStat;

/// `score >= 0`, monotone increasing in `total_request`, strictly decreasing
/// as `epoch_invalid_request / epoch_request` rises.
pub fn score(stat: &NodeStat) -> f64 {
    let invalid_ratio = stat.epoch_invalid_request as f64 / stat.epoch_request.max(1) as f64;
    let reliability = (1.0 - invalid_ratio).max(0.0);
    ((1 + stat.total_request) as f64).ln() * reliability.powi(2)
}

#[cfg(test)]
mod tests {
    use common_types::Address;

    use super::*;

    fn stat(total: u64, epoch_request: u64, epoch_invalid: u64) -> NodeStat {
        NodeStat {
            address: Address::new([1; 20]),
            endpoint: "https://node.example".to_string(),
            access_token: "token".to_string(),
            total_request: total,
            epoch_request,
            epoch_invalid_request: epoch_invalid,
            score: 0.0,
        }
    }

    #[test]
    fn is_never_negative() {
        assert!(score(&stat(0, 0, 0)) >= 0.0);
        assert!(score(&stat(100, 10, 10)) >= 0.0);
    }

    #[test]
    fn increases_with_total_request() {
        let low = score(&stat(10, 100, 0));
        let high = score(&stat(1000, 100, 0));
        assert!(high > low);
    }

    #[test]
    fn decreases_as_invalid_ratio_rises() {
        let clean = score(&stat(100, 100, 0));
        let dirty = score(&stat(100, 100, 50));
        let filthy = score(&stat(100, 100, 99));
        assert!(clean > dirty);
        assert!(dirty > filthy);
    }
}
