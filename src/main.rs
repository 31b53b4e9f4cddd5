// ===============================
// src/main.rs
// ===============================
/*
 # node (market venue + failure detector + /submit /state API)
 cargo run -- --role node

 # agents (3 simulated traders, first one goes silent after a few messages)
 NODE_URL=http://127.0.0.1:8080 METRICS_PORT=9899 cargo run -- --role agents

 # watch the venue from a third terminal
 METRICS_PORT=9900 cargo run -- --role monitor

 # metrics
 curl -s localhost:9898/metrics | egrep '^(lamport_timestamp|node_status|trade_count_total|failure_detected_total)'
*/
/*
=============================================================================
stocksim_rust — distributed trading venue simulator in Rust

Summary : Simulates a small trading venue: agent tasks send orders and
          heartbeats (each with its own Lamport clock) to one venue node,
          which merges them into a causally ordered trade log through a
          single-consumer event loop, sweeps agent liveness in the
          background, exposes Prometheus metrics, and serves read-only
          state snapshots over HTTP.
=============================================================================
*/
mod agent;
mod clock;
mod config;
mod coordinator;
mod detector;
mod domain;
mod liveness;
mod metrics;
mod monitor;
mod recorder;
mod tradelog;
mod transport;

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::clock::LamportClock;
use crate::config::{Args, Role};
use crate::domain::{Event, MarketEvent, Trade};
use crate::liveness::LivenessTracker;
use crate::metrics::{Observer, PromObserver};
use crate::transport::NodeHandle;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    // ---- Load config ----
    let args = config::load();

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    // ---- Human-friendly startup info + export config to metrics ----
    info!(
        role = args.role.label(),
        node_id = %args.node_id,
        node_url = %args.node_url,
        symbols = ?args.symbols,
        agent_timeout_ms = args.agent_timeout_ms,
        sweep_period_ms = args.sweep_period_ms,
        max_trades_in_snapshot = args.max_trades_in_snapshot,
        "startup config"
    );
    metrics::CONFIG_ROLE.with_label_values(&[args.role.label()]).set(1);
    for s in &args.symbols {
        metrics::CONFIG_SYMBOL.with_label_values(&[s]).set(1);
    }

    match args.role {
        Role::Node => run_node(args).await,
        Role::Agents => run_agents(args).await,
        Role::Monitor => {
            tokio::select! {
                _ = monitor::run(args.node_url.clone(), args.sweep_period_ms) => {}
                _ = tokio::signal::ctrl_c() => info!("monitor stopped"),
            }
        }
    }
}

async fn run_node(args: Args) {
    let observer: Arc<dyn Observer> = Arc::new(PromObserver);
    let clock = Arc::new(LamportClock::new());
    let liveness = Arc::new(LivenessTracker::new());

    observer.node_up(&args.node_id, true);
    observer.clock_advanced(&args.node_id, clock.current());

    // ---- Buses ----
    let (event_tx, event_rx) = mpsc::channel::<MarketEvent>(2048);
    let (tape_tx, tape_rx) = watch::channel::<Vec<Trade>>(Vec::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ---- Recorder (optional) ----
    let rec_tx = args.record_file.clone().map(|path| {
        let (tx, rx) = mpsc::channel::<Event>(8192);
        tokio::spawn(recorder::run(rx, path));
        tx
    });

    // ---- Coordinator (the serialization point) ----
    let co = coordinator::Coordinator::new(
        args.node_id.clone(),
        clock.clone(),
        liveness.clone(),
        args.agent_timeout_ms,
        args.max_trades_in_snapshot,
        tape_tx,
        rec_tx.clone(),
        observer.clone(),
    );
    tokio::spawn(coordinator::run(co, event_rx));

    // ---- Failure detector ----
    tokio::spawn(detector::run(
        liveness.clone(),
        observer.clone(),
        rec_tx,
        detector::SweepCfg {
            sweep_period_ms: args.sweep_period_ms,
            agent_timeout_ms: args.agent_timeout_ms,
        },
        shutdown_rx.clone(),
    ));

    // ---- Node API ----
    let handle = NodeHandle {
        event_tx,
        tape_rx,
        liveness,
        symbols: Arc::new(args.symbols.clone()),
        agent_timeout_ms: args.agent_timeout_ms,
    };
    tokio::spawn(transport::serve(handle, args.node_port, shutdown_rx));

    info!(node = %args.node_id, "market node ready");
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    // let the server close its listener and the sweep log its exit
    sleep(Duration::from_millis(200)).await;
}

async fn run_agents(args: Args) {
    let observer: Arc<dyn Observer> = Arc::new(PromObserver);

    for i in 0..args.num_agents {
        let agent_id = format!("agent-{}", i + 1);
        let will_fail = args.simulate_failure && i == 0;
        let cfg = agent::AgentCfg {
            node_url: args.node_url.clone(),
            receiver_id: args.node_id.clone(),
            symbols: args.symbols.clone(),
            min_delay_ms: args.agent_min_delay_ms,
            jitter_ms: args.agent_jitter_ms,
            simulate_failure: will_fail,
        };
        tokio::spawn(agent::run(agent_id, cfg, observer.clone()));
    }
    info!(count = args.num_agents, "trading agents started");

    let _ = tokio::signal::ctrl_c().await;
    info!("agents stopped");
}
