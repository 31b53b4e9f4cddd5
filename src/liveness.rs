// ===============================
// src/liveness.rs (per-agent heartbeat registry)
// ===============================
//
// Last-seen wall-clock time per agent. Writers touch one key at a time; bulk
// reads judge every agent against a single `now` captured at call start.
// Entries are created lazily on first contact and never removed -- a silent
// agent simply ages into FAILED.
//
use ahash::AHashMap;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::AgentStatus;

#[derive(Debug, Default)]
pub struct LivenessTracker {
    last_seen: RwLock<AHashMap<String, i64>>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self { last_seen: RwLock::new(AHashMap::new()) }
    }

    /// Record contact from an agent. Idempotent, never fails.
    pub fn refresh(&self, agent_id: &str) {
        self.last_seen
            .write()
            .insert(agent_id.to_string(), Utc::now().timestamp_millis());
    }

    pub fn status_of(&self, agent_id: &str, timeout_ms: i64) -> AgentStatus {
        self.status_at(agent_id, timeout_ms, Utc::now().timestamp_millis())
    }

    pub fn all_statuses(&self, timeout_ms: i64) -> HashMap<String, AgentStatus> {
        self.all_statuses_at(timeout_ms, Utc::now().timestamp_millis())
    }

    /// An agent with no record yet is UNKNOWN, not FAILED.
    fn status_at(&self, agent_id: &str, timeout_ms: i64, now_ms: i64) -> AgentStatus {
        match self.last_seen.read().get(agent_id) {
            Some(seen) => Self::classify(*seen, timeout_ms, now_ms),
            None => AgentStatus::Unknown,
        }
    }

    fn all_statuses_at(&self, timeout_ms: i64, now_ms: i64) -> HashMap<String, AgentStatus> {
        self.last_seen
            .read()
            .iter()
            .map(|(agent, seen)| (agent.clone(), Self::classify(*seen, timeout_ms, now_ms)))
            .collect()
    }

    fn classify(seen_ms: i64, timeout_ms: i64, now_ms: i64) -> AgentStatus {
        if now_ms - seen_ms > timeout_ms {
            AgentStatus::Failed
        } else {
            AgentStatus::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_agent_is_active() {
        let tracker = LivenessTracker::new();
        tracker.refresh("agent-1");
        assert_eq!(tracker.status_of("agent-1", 10_000), AgentStatus::Active);
    }

    #[test]
    fn never_seen_is_unknown() {
        let tracker = LivenessTracker::new();
        assert_eq!(tracker.status_of("ghost", 10_000), AgentStatus::Unknown);
        assert!(tracker.all_statuses(10_000).is_empty());
    }

    #[test]
    fn stale_agent_fails_exactly_past_timeout() {
        let tracker = LivenessTracker::new();
        tracker.refresh("agent-1");
        let seen = *tracker.last_seen.read().get("agent-1").unwrap();

        // at exactly timeout: still active (strict >)
        assert_eq!(tracker.status_at("agent-1", 10_000, seen + 10_000), AgentStatus::Active);
        // one ms past: failed
        assert_eq!(tracker.status_at("agent-1", 10_000, seen + 10_001), AgentStatus::Failed);
    }

    #[test]
    fn bulk_evaluation_uses_one_instant() {
        let tracker = LivenessTracker::new();
        {
            let mut map = tracker.last_seen.write();
            map.insert("old".to_string(), 0);
            map.insert("new".to_string(), 9_500);
        }
        let statuses = tracker.all_statuses_at(1_000, 10_000);
        assert_eq!(statuses["old"], AgentStatus::Failed);
        assert_eq!(statuses["new"], AgentStatus::Active);
    }

    #[test]
    fn refresh_revives_failed_agent() {
        let tracker = LivenessTracker::new();
        tracker.last_seen.write().insert("agent-1".to_string(), 0);
        assert_eq!(tracker.status_at("agent-1", 1_000, 5_000), AgentStatus::Failed);
        tracker.refresh("agent-1");
        assert_eq!(tracker.status_of("agent-1", 1_000), AgentStatus::Active);
    }
}
