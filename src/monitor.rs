// ===============================
// src/monitor.rs (console state poller)
// ===============================
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use crate::transport::NodeClient;

/// Poll GET /state and log what the venue looks like. An unreachable node is
/// reported as DOWN and polling continues.
pub async fn run(node_url: String, period_ms: u64) {
    let client = NodeClient::new(node_url);
    let mut tick = interval(Duration::from_millis(period_ms.max(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        match client.state().await {
            Ok(snap) => {
                let mut agents: Vec<String> = snap
                    .agent_statuses
                    .iter()
                    .map(|(id, st)| format!("{id}={}", st.label()))
                    .collect();
                agents.sort();
                info!(
                    node = %snap.node_status,
                    trades = snap.recent_trades.len(),
                    agents = %agents.join(" "),
                    "venue state"
                );
                if let Some(t) = snap.recent_trades.last() {
                    info!(
                        lt = t.logical_ts,
                        agent = %t.agent_id,
                        side = t.side.label(),
                        qty = t.qty,
                        symbol = %t.symbol,
                        px = t.px,
                        "last trade"
                    );
                }
            }
            Err(e) => warn!(err = %e, "node unreachable, treating as DOWN"),
        }
    }
}
