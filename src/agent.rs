// ===============================
// src/agent.rs (trading agent harness)
// ===============================
//
// One task per agent. Each agent keeps its OWN Lamport clock, sleeps a
// randomized interval, then sends either a random order (70%) or a heartbeat
// (30%), stamping the message with tick_for_send(). Losing the node is fatal
// to that agent: mark down, stop, no retry.
//
use rand::Rng;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::clock::LamportClock;
use crate::domain::{EventBody, MarketEvent, Order, Side};
use crate::metrics::Observer;
use crate::transport::{NodeClient, TransportError};

#[derive(Debug, Clone)]
pub struct AgentCfg {
    pub node_url: String,
    pub receiver_id: String,
    pub symbols: Vec<String>,
    pub min_delay_ms: u64,
    pub jitter_ms: u64,
    /// Go silent after a handful of messages so the sweep has something to catch.
    pub simulate_failure: bool,
}

fn random_order(agent_id: &str, symbols: &[String]) -> Order {
    // jangan simpan ThreadRng melewati .await
    let mut rng = rand::thread_rng();
    let symbol = symbols[rng.gen_range(0..symbols.len())].clone();
    Order {
        agent_id: agent_id.to_string(),
        symbol,
        qty: rng.gen_range(1..=100),
        px: rng.gen_range(10_00..=200_00),
        side: if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
    }
}

pub async fn run(agent_id: String, cfg: AgentCfg, observer: Arc<dyn Observer>) {
    let client = NodeClient::new(cfg.node_url.clone());
    let clock = LamportClock::new();

    observer.node_up(&agent_id, true);
    clock.tick(); // agent startup is a local event
    observer.clock_advanced(&agent_id, clock.current());

    let fail_after: Option<u32> = if cfg.simulate_failure {
        Some(5 + rand::thread_rng().gen_range(0..5))
    } else {
        None
    };
    if fail_after.is_some() {
        info!(agent = %agent_id, "agent will simulate failure");
    }

    let mut sent: u32 = 0;
    loop {
        let delay = cfg.min_delay_ms + rand::thread_rng().gen_range(0..=cfg.jitter_ms);
        sleep(Duration::from_millis(delay)).await;

        if let Some(limit) = fail_after {
            if sent >= limit {
                warn!(agent = %agent_id, sent, "simulating failure, going silent");
                observer.node_up(&agent_id, false);
                break;
            }
        }

        let send_order = rand::thread_rng().gen_bool(0.7);
        let ts = clock.tick_for_send();
        observer.clock_advanced(&agent_id, ts);

        let body = if send_order {
            EventBody::Order(random_order(&agent_id, &cfg.symbols))
        } else {
            EventBody::Heartbeat
        };
        let is_heartbeat = matches!(body, EventBody::Heartbeat);
        let ev = MarketEvent {
            sender_id: agent_id.clone(),
            receiver_id: cfg.receiver_id.clone(),
            lamport_ts: ts,
            body,
        };

        match client.submit(&ev).await {
            Ok(()) => {
                observer.message_sent(&agent_id);
                if is_heartbeat {
                    observer.heartbeat_sent(&agent_id);
                    info!(lt = ts, agent = %agent_id, "sent HEARTBEAT");
                } else if let EventBody::Order(o) = &ev.body {
                    info!(
                        lt = ts,
                        agent = %agent_id,
                        side = o.side.label(),
                        qty = o.qty,
                        symbol = %o.symbol,
                        px = o.px,
                        "sent ORDER"
                    );
                }
                sent += 1;
            }
            Err(TransportError::Rejected(reason)) => {
                // our bug, not the node's: the event is gone, say so and move on
                warn!(agent = %agent_id, %reason, "node rejected event");
                sent += 1;
            }
            Err(e) => {
                error!(agent = %agent_id, err = %e, "lost connection to node, stopping");
                observer.node_up(&agent_id, false);
                break;
            }
        }
    }
}
