// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side { pub fn label(&self) -> &'static str { match self { Side::Buy => "BUY", Side::Sell => "SELL" } } }

/// Price scale: 2 decimals (px * 100), e.g. 12550 = 125.50
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order { pub agent_id: String, pub symbol: String, pub qty: i64, pub px: i64, pub side: Side }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventBody { Order(Order), Heartbeat }

/// One message from an agent to the venue node, stamped by the sender's clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent { pub sender_id: String, pub receiver_id: String, pub lamport_ts: u64, pub body: EventBody }

/// Every accepted order executes instantly (no book) and becomes a Trade.
/// `logical_ts` is the node's clock after merging the receive event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: Uuid,
    pub agent_id: String,
    pub symbol: String,
    pub qty: i64,
    pub px: i64,
    pub side: Side,
    pub logical_ts: u64,
    pub wall_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus { Active, Failed, Unknown }

impl AgentStatus {
    pub fn label(&self) -> &'static str {
        match self { AgentStatus::Active => "ACTIVE", AgentStatus::Failed => "FAILED", AgentStatus::Unknown => "UNKNOWN" }
    }
}

/// Point-in-time copy handed to external readers; never aliases live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub recent_trades: Vec<Trade>,
    pub agent_statuses: HashMap<String, AgentStatus>,
    pub node_status: String,
}

/// Stream fed to the JSONL recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Trade(Trade),
    Heartbeat { agent_id: String, lamport_ts: u64 },
    Failure { agent_id: String },
    Recovery { agent_id: String },
    Note(String),
}

/// Structural validation errors; surfaced to the transport as HTTP 400
/// instead of silently dropping the message (causal info must not vanish).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("ORDER event without order payload")]
    MissingOrder,
    #[error("quantity must be positive, got {0}")]
    BadQuantity(i64),
    #[error("price must be positive, got {0}")]
    BadPrice(i64),
    #[error("symbol {0} is not traded on this venue")]
    UnknownSymbol(String),
    #[error("unknown event kind {0}")]
    UnknownKind(String),
}
