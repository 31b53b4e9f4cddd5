// ===============================
// src/tradelog.rs (bounded recent-trades ring)
// ===============================
//
// The snapshot path only ever serves the most recent `cap` trades, so the
// in-memory log is a ring: O(1) append, O(cap) copy on read, no O(n) slicing
// as history grows. The full append history goes to the recorder (if on).
//
use std::collections::VecDeque;

use crate::domain::Trade;

#[derive(Debug)]
pub struct TradeLog {
    ring: VecDeque<Trade>,
    cap: usize,
    total: u64,
}

impl TradeLog {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { ring: VecDeque::with_capacity(cap), cap, total: 0 }
    }

    pub fn push(&mut self, trade: Trade) {
        if self.ring.len() == self.cap {
            self.ring.pop_front();
        }
        self.ring.push_back(trade);
        self.total += 1;
    }

    /// Most recent trades in insertion order, oldest first.
    pub fn recent(&self) -> Vec<Trade> {
        self.ring.iter().cloned().collect()
    }

    /// Count of every trade ever accepted, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use uuid::Uuid;

    fn trade(n: u64) -> Trade {
        Trade {
            trade_id: Uuid::new_v4(),
            agent_id: "agent-1".to_string(),
            symbol: "AAPL".to_string(),
            qty: 10,
            px: 100_00,
            side: Side::Buy,
            logical_ts: n,
            wall_ms: n as i64,
        }
    }

    #[test]
    fn keeps_only_last_cap_in_order() {
        let mut log = TradeLog::new(50);
        for n in 1..=120 {
            log.push(trade(n));
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 50);
        assert_eq!(recent.first().unwrap().logical_ts, 71);
        assert_eq!(recent.last().unwrap().logical_ts, 120);
        assert!(recent.windows(2).all(|w| w[0].logical_ts < w[1].logical_ts));
        assert_eq!(log.total(), 120);
    }

    #[test]
    fn under_capacity_returns_everything() {
        let mut log = TradeLog::new(50);
        for n in 1..=7 {
            log.push(trade(n));
        }
        assert_eq!(log.recent().len(), 7);
        assert_eq!(log.total(), 7);
    }
}
