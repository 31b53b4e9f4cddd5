// ===============================
// src/detector.rs (failure sweep)
// ===============================
//
// Periodic liveness sweep. Each tick re-evaluates every known agent and
// diffs against the sweep's own cached map, so an agent that stays dead
// raises exactly one alarm. A late heartbeat flips it back on the next tick.
// Errors here stay here; the event-processing path is never affected.
//
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use crate::domain::{AgentStatus, Event};
use crate::liveness::LivenessTracker;
use crate::metrics::Observer;

#[derive(Debug, Clone)]
pub struct SweepCfg {
    pub sweep_period_ms: u64,
    pub agent_timeout_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Down(String),
    Up(String),
}

/// Status edges between two sweep evaluations. An agent first observed as
/// FAILED counts as a failure edge; staying FAILED raises nothing.
pub fn transitions(
    prev: &HashMap<String, AgentStatus>,
    cur: &HashMap<String, AgentStatus>,
) -> Vec<Transition> {
    let mut out = Vec::new();
    for (agent, status) in cur {
        let before = prev.get(agent).copied().unwrap_or(AgentStatus::Active);
        match (before, *status) {
            (AgentStatus::Failed, AgentStatus::Failed) => {}
            (_, AgentStatus::Failed) => out.push(Transition::Down(agent.clone())),
            (AgentStatus::Failed, AgentStatus::Active) => out.push(Transition::Up(agent.clone())),
            _ => {}
        }
    }
    out
}

pub async fn run(
    liveness: Arc<LivenessTracker>,
    observer: Arc<dyn Observer>,
    rec_tx: Option<mpsc::Sender<Event>>,
    cfg: SweepCfg,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(Duration::from_millis(cfg.sweep_period_ms.max(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut prev: HashMap<String, AgentStatus> = HashMap::new();
    info!(
        period_ms = cfg.sweep_period_ms,
        timeout_ms = cfg.agent_timeout_ms,
        "failure detector started"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let cur = liveness.all_statuses(cfg.agent_timeout_ms);
                for tr in transitions(&prev, &cur) {
                    match tr {
                        Transition::Down(agent) => {
                            warn!(agent = %agent, "agent failed (no heartbeat), marking FAILED");
                            observer.failure_detected();
                            observer.node_up(&agent, false);
                            if let Some(tx) = &rec_tx {
                                let _ = tx.try_send(Event::Failure { agent_id: agent });
                            }
                        }
                        Transition::Up(agent) => {
                            info!(agent = %agent, "agent recovered (heartbeat resumed)");
                            observer.node_up(&agent, true);
                            if let Some(tx) = &rec_tx {
                                let _ = tx.try_send(Event::Recovery { agent_id: agent });
                            }
                        }
                    }
                }
                prev = cur;
            }
            res = shutdown.changed() => {
                // a dropped sender means the node is going away too
                if res.is_err() || *shutdown.borrow() {
                    info!("failure detector: shutdown");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn map(pairs: &[(&str, AgentStatus)]) -> HashMap<String, AgentStatus> {
        pairs.iter().map(|(a, s)| (a.to_string(), *s)).collect()
    }

    #[test]
    fn active_to_failed_emits_one_down() {
        let prev = map(&[("agent-1", AgentStatus::Active)]);
        let cur = map(&[("agent-1", AgentStatus::Failed)]);
        assert_eq!(transitions(&prev, &cur), vec![Transition::Down("agent-1".to_string())]);
    }

    #[test]
    fn first_observation_failed_counts_as_edge() {
        let prev = HashMap::new();
        let cur = map(&[("agent-1", AgentStatus::Failed)]);
        assert_eq!(transitions(&prev, &cur), vec![Transition::Down("agent-1".to_string())]);
    }

    #[test]
    fn staying_failed_is_silent() {
        let prev = map(&[("agent-1", AgentStatus::Failed)]);
        let cur = map(&[("agent-1", AgentStatus::Failed)]);
        assert!(transitions(&prev, &cur).is_empty());
    }

    #[test]
    fn late_heartbeat_revives_once() {
        let prev = map(&[("agent-1", AgentStatus::Failed)]);
        let cur = map(&[("agent-1", AgentStatus::Active)]);
        assert_eq!(transitions(&prev, &cur), vec![Transition::Up("agent-1".to_string())]);

        // and the next sweep is quiet again
        let cur2 = map(&[("agent-1", AgentStatus::Active)]);
        assert!(transitions(&cur, &cur2).is_empty());
    }

    #[derive(Default)]
    struct FailureCounter {
        failures: AtomicUsize,
    }

    impl Observer for FailureCounter {
        fn message_received(&self, _: &str) {}
        fn message_sent(&self, _: &str) {}
        fn clock_advanced(&self, _: &str, _: u64) {}
        fn trade_recorded(&self, _: Side) {}
        fn heartbeat_sent(&self, _: &str) {}
        fn node_up(&self, _: &str, _: bool) {}
        fn failure_detected(&self) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn sweep_alarms_once_while_agent_stays_dead() {
        let liveness = Arc::new(LivenessTracker::new());
        liveness.refresh("agent-1");

        let observer = Arc::new(FailureCounter::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cfg = SweepCfg { sweep_period_ms: 20, agent_timeout_ms: 50 };
        let sweep = tokio::spawn(run(liveness, observer.clone(), None, cfg, shutdown_rx));

        // long enough for the agent to expire and several further sweeps to run
        tokio::time::sleep(Duration::from_millis(250)).await;
        let _ = shutdown_tx.send(true);
        sweep.await.unwrap();

        assert_eq!(observer.failures.load(Ordering::SeqCst), 1);
    }
}
