// ===============================
// src/coordinator.rs (venue node event loop)
// ===============================
//
// Single serialization point. The mpsc channel feeding `run` is the mutual
// exclusion: one event at a time, so the clock-merge -> trade-append sequence
// never interleaves and tape order equals acceptance order. Readers get
// copies over the watch channel and never touch live state.
//
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::LamportClock;
use crate::domain::{AgentStatus, Event, EventBody, MarketEvent, Order, Trade};
use crate::liveness::LivenessTracker;
use crate::metrics::Observer;
use crate::tradelog::TradeLog;

pub struct Coordinator {
    node_id: String,
    clock: Arc<LamportClock>,
    liveness: Arc<LivenessTracker>,
    agent_timeout_ms: i64,
    log: TradeLog,
    tape_tx: watch::Sender<Vec<Trade>>,
    rec_tx: Option<mpsc::Sender<Event>>,
    observer: Arc<dyn Observer>,
}

impl Coordinator {
    pub fn new(
        node_id: String,
        clock: Arc<LamportClock>,
        liveness: Arc<LivenessTracker>,
        agent_timeout_ms: i64,
        max_recent_trades: usize,
        tape_tx: watch::Sender<Vec<Trade>>,
        rec_tx: Option<mpsc::Sender<Event>>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            node_id,
            clock,
            liveness,
            agent_timeout_ms,
            log: TradeLog::new(max_recent_trades),
            tape_tx,
            rec_tx,
            observer,
        }
    }

    fn handle(&mut self, ev: MarketEvent) {
        self.observer.message_received(&self.node_id);

        debug!(
            sender = %ev.sender_id,
            msg_lt = ev.lamport_ts,
            local_lt = self.clock.current(),
            "merging receive event"
        );
        self.clock.observe_received(ev.lamport_ts);
        self.observer.clock_advanced(&self.node_id, self.clock.current());

        // Any accepted event counts as contact from its sender.
        let was = self.liveness.status_of(&ev.sender_id, self.agent_timeout_ms);
        self.liveness.refresh(&ev.sender_id);
        if was == AgentStatus::Failed {
            info!(agent = %ev.sender_id, "agent back in contact");
        }

        match ev.body {
            EventBody::Order(order) => self.record_trade(ev.lamport_ts, order),
            EventBody::Heartbeat => self.record_heartbeat(&ev.sender_id, ev.lamport_ts),
        }
    }

    fn record_trade(&mut self, msg_lt: u64, order: Order) {
        let trade = Trade {
            trade_id: Uuid::new_v4(),
            agent_id: order.agent_id,
            symbol: order.symbol,
            qty: order.qty,
            px: order.px,
            side: order.side,
            // the node's clock is the official trade timestamp, not the sender's
            logical_ts: self.clock.current(),
            wall_ms: Utc::now().timestamp_millis(),
        };
        self.observer.trade_recorded(trade.side);

        info!(
            lt = trade.logical_ts,
            agent = %trade.agent_id,
            side = trade.side.label(),
            qty = trade.qty,
            px = trade.px,
            symbol = %trade.symbol,
            msg_lt,
            "trade recorded"
        );

        if let Some(tx) = &self.rec_tx {
            let _ = tx.try_send(Event::Trade(trade.clone()));
        }
        self.log.push(trade);
        let _ = self.tape_tx.send(self.log.recent());
    }

    fn record_heartbeat(&mut self, sender_id: &str, msg_lt: u64) {
        // A heartbeat from a down-marked agent brings it back up.
        self.observer.node_up(sender_id, true);
        info!(lt = self.clock.current(), agent = %sender_id, msg_lt, "heartbeat");

        if let Some(tx) = &self.rec_tx {
            let _ = tx.try_send(Event::Heartbeat {
                agent_id: sender_id.to_string(),
                lamport_ts: msg_lt,
            });
        }
    }
}

/// Drain events in arrival order until every submitter is gone.
pub async fn run(mut co: Coordinator, mut rx: mpsc::Receiver<MarketEvent>) {
    info!(node = %co.node_id, "coordinator started");
    while let Some(ev) = rx.recv().await {
        co.handle(ev);
    }
    info!(trades = co.log.total(), "coordinator: channel closed, stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentStatus, Side};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        received: AtomicUsize,
        trades: AtomicUsize,
    }

    impl Observer for CountingObserver {
        fn message_received(&self, _: &str) {
            self.received.fetch_add(1, Ordering::SeqCst);
        }
        fn message_sent(&self, _: &str) {}
        fn clock_advanced(&self, _: &str, _: u64) {}
        fn trade_recorded(&self, _: Side) {
            self.trades.fetch_add(1, Ordering::SeqCst);
        }
        fn heartbeat_sent(&self, _: &str) {}
        fn node_up(&self, _: &str, _: bool) {}
        fn failure_detected(&self) {}
    }

    fn order(agent: &str, px: i64) -> Order {
        Order {
            agent_id: agent.to_string(),
            symbol: "AAPL".to_string(),
            qty: 5,
            px,
            side: Side::Buy,
        }
    }

    fn event(sender: &str, ts: u64, body: EventBody) -> MarketEvent {
        MarketEvent {
            sender_id: sender.to_string(),
            receiver_id: "market-node-01".to_string(),
            lamport_ts: ts,
            body,
        }
    }

    struct Rig {
        clock: Arc<LamportClock>,
        liveness: Arc<LivenessTracker>,
        observer: Arc<CountingObserver>,
        tape_rx: watch::Receiver<Vec<Trade>>,
        event_tx: mpsc::Sender<MarketEvent>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn rig(cap: usize) -> Rig {
        let clock = Arc::new(LamportClock::new());
        let liveness = Arc::new(LivenessTracker::new());
        let observer = Arc::new(CountingObserver::default());
        let (tape_tx, tape_rx) = watch::channel(Vec::new());
        let (event_tx, event_rx) = mpsc::channel(256);
        let co = Coordinator::new(
            "market-node-01".to_string(),
            clock.clone(),
            liveness.clone(),
            10_000,
            cap,
            tape_tx,
            None,
            observer.clone(),
        );
        let handle = tokio::spawn(run(co, event_rx));
        Rig { clock, liveness, observer, tape_rx, event_tx, handle }
    }

    #[tokio::test]
    async fn order_then_heartbeat_end_to_end() {
        let r = rig(50);

        r.event_tx
            .send(event("agent-a", 1, EventBody::Order(order("agent-a", 120_00))))
            .await
            .unwrap();
        r.event_tx
            .send(event("agent-b", 1, EventBody::Heartbeat))
            .await
            .unwrap();
        drop(r.event_tx);
        r.handle.await.unwrap();

        // max(0,1)+1 = 2 for the order, then max(2,1)+1 = 3 for the heartbeat
        assert_eq!(r.clock.current(), 3);

        let tape = r.tape_rx.borrow().clone();
        assert_eq!(tape.len(), 1);
        assert_eq!(tape[0].logical_ts, 2);
        assert_eq!(tape[0].agent_id, "agent-a");

        let statuses = r.liveness.all_statuses(10_000);
        assert_eq!(statuses["agent-a"], AgentStatus::Active);
        assert_eq!(statuses["agent-b"], AgentStatus::Active);

        assert_eq!(r.observer.received.load(Ordering::SeqCst), 2);
        assert_eq!(r.observer.trades.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_orders_serialize_with_unique_increasing_timestamps() {
        let r = rig(256);

        let mut senders = Vec::new();
        for task in 0..4 {
            let tx = r.event_tx.clone();
            senders.push(tokio::spawn(async move {
                for n in 0..25 {
                    let agent = format!("agent-{task}");
                    tx.send(event(&agent, n, EventBody::Order(order(&agent, 100_00))))
                        .await
                        .unwrap();
                }
            }));
        }
        for s in senders {
            s.await.unwrap();
        }
        drop(r.event_tx);
        r.handle.await.unwrap();

        let tape = r.tape_rx.borrow().clone();
        assert_eq!(tape.len(), 100);
        assert!(
            tape.windows(2).all(|w| w[0].logical_ts < w[1].logical_ts),
            "coordinator timestamps must strictly increase in tape order"
        );
    }

    #[tokio::test]
    async fn heartbeat_appends_no_trade() {
        let r = rig(50);
        r.event_tx
            .send(event("agent-b", 7, EventBody::Heartbeat))
            .await
            .unwrap();
        drop(r.event_tx);
        r.handle.await.unwrap();

        assert_eq!(r.clock.current(), 8);
        assert!(r.tape_rx.borrow().is_empty());
        assert_eq!(r.observer.trades.load(Ordering::SeqCst), 0);
    }
}
