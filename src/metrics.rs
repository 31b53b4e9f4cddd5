// ===============================
// src/metrics.rs
// ===============================
//
// Observability seam: the core tasks talk to an injected `Observer`, never to
// the registry directly. `PromObserver` is the production implementation; a
// test double just counts calls.
//
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::{debug, error, info};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server};

use crate::domain::Side;

/// Read-only observations the core exposes; how they are published is the
/// collaborator's concern.
pub trait Observer: Send + Sync {
    fn message_received(&self, node_id: &str);
    fn message_sent(&self, node_id: &str);
    fn clock_advanced(&self, node_id: &str, time: u64);
    fn trade_recorded(&self, side: Side);
    fn heartbeat_sent(&self, agent_id: &str);
    fn node_up(&self, node_id: &str, up: bool);
    fn failure_detected(&self);
}

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static LAMPORT_CLOCK: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("lamport_timestamp", "current Lamport clock per node"),
        &["node_id"],
    )
    .unwrap()
});

pub static NODE_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("node_status", "node/agent status (1=UP, 0=DOWN/FAILED)"),
        &["node_id"],
    )
    .unwrap()
});

pub static TRADES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trade_count_total", "trades recorded by the venue node"),
        &["order_type"],
    )
    .unwrap()
});

pub static HEARTBEATS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("heartbeat_count_total", "heartbeats sent per agent"),
        &["agent_id"],
    )
    .unwrap()
});

pub static MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("message_sent_total", "messages sent from a node"),
        &["node_id"],
    )
    .unwrap()
});

pub static MESSAGES_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("message_received_total", "messages received by a node"),
        &["node_id"],
    )
    .unwrap()
});

pub static FAILURES_DETECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("failure_detected_total", "agent failures detected by the sweep").unwrap()
});

// ---- Config visibility (role / symbols) ----
pub static CONFIG_SYMBOL: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_symbol", "configured symbols (label: symbol)"),
        &["symbol"],
    )
    .unwrap()
});

pub static CONFIG_ROLE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_role", "process role (label: role)"), &["role"]).unwrap()
});

pub fn init() {
    for r in [
        REGISTRY.register(Box::new(LAMPORT_CLOCK.clone())),
        REGISTRY.register(Box::new(NODE_STATUS.clone())),
        REGISTRY.register(Box::new(TRADES_TOTAL.clone())),
        REGISTRY.register(Box::new(HEARTBEATS_TOTAL.clone())),
        REGISTRY.register(Box::new(MESSAGES_SENT.clone())),
        REGISTRY.register(Box::new(MESSAGES_RECEIVED.clone())),
        REGISTRY.register(Box::new(FAILURES_DETECTED.clone())),
        REGISTRY.register(Box::new(CONFIG_SYMBOL.clone())),
        REGISTRY.register(Box::new(CONFIG_ROLE.clone())),
    ] {
        if let Err(e) = r {
            debug!(?e, "metric already registered");
        }
    }
}

/// Prometheus-backed observer, one per process.
pub struct PromObserver;

impl Observer for PromObserver {
    fn message_received(&self, node_id: &str) {
        MESSAGES_RECEIVED.with_label_values(&[node_id]).inc();
    }
    fn message_sent(&self, node_id: &str) {
        MESSAGES_SENT.with_label_values(&[node_id]).inc();
    }
    fn clock_advanced(&self, node_id: &str, time: u64) {
        LAMPORT_CLOCK.with_label_values(&[node_id]).set(time as i64);
    }
    fn trade_recorded(&self, side: Side) {
        TRADES_TOTAL.with_label_values(&[side.label()]).inc();
    }
    fn heartbeat_sent(&self, agent_id: &str) {
        HEARTBEATS_TOTAL.with_label_values(&[agent_id]).inc();
    }
    fn node_up(&self, node_id: &str, up: bool) {
        NODE_STATUS.with_label_values(&[node_id]).set(if up { 1 } else { 0 });
    }
    fn failure_detected(&self) {
        FAILURES_DETECTED.inc();
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

/// Serve GET / and /metrics. Any path answers with the full text exposition.
pub async fn serve_metrics(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make = make_service_fn(|_conn| async {
        Ok::<_, Infallible>(service_fn(|_req| async {
            let resp = Response::builder()
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Body::from(encode_metrics()))
                .unwrap_or_else(|_| Response::new(Body::empty()));
            Ok::<_, Infallible>(resp)
        }))
    });
    info!("metrics listening on http://{addr}/ (and /metrics)");
    if let Err(e) = Server::bind(&addr).serve(make).await {
        error!(?e, "metrics server error");
    }
}
