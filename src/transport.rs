// ===============================
// src/transport.rs (node API: POST /submit, GET /state)
// ===============================
//
// The RPC edge. Any transport with at-least-once delivery and an unmodified
// body could stand here; the coordinator only ever sees channel ends.
// Validation happens at this boundary so a malformed submission is an HTTP
// 400, not a silently dropped message.
//
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};

use crate::domain::{EventBody, EventError, MarketEvent, Order, SystemSnapshot, Trade};
use crate::liveness::LivenessTracker;

pub const KIND_ORDER: &str = "ORDER";
pub const KIND_HEARTBEAT: &str = "HEARTBEAT";

/// Wire form of a submission. `order` may legitimately be absent only for
/// heartbeats; `into_event` enforces that and the numeric invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub kind: String,
    pub order: Option<Order>,
    pub lamport_ts: u64,
}

impl SubmitRequest {
    pub fn into_event(self, symbols: &[String]) -> Result<MarketEvent, EventError> {
        let body = match self.kind.as_str() {
            KIND_ORDER => {
                let order = self.order.ok_or(EventError::MissingOrder)?;
                if order.qty <= 0 {
                    return Err(EventError::BadQuantity(order.qty));
                }
                if order.px <= 0 {
                    return Err(EventError::BadPrice(order.px));
                }
                if !symbols.iter().any(|s| s == &order.symbol) {
                    return Err(EventError::UnknownSymbol(order.symbol));
                }
                EventBody::Order(order)
            }
            KIND_HEARTBEAT => EventBody::Heartbeat,
            other => return Err(EventError::UnknownKind(other.to_string())),
        };
        Ok(MarketEvent {
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            lamport_ts: self.lamport_ts,
            body,
        })
    }
}

impl From<&MarketEvent> for SubmitRequest {
    fn from(ev: &MarketEvent) -> Self {
        let (kind, order) = match &ev.body {
            EventBody::Order(o) => (KIND_ORDER, Some(o.clone())),
            EventBody::Heartbeat => (KIND_HEARTBEAT, None),
        };
        Self {
            sender_id: ev.sender_id.clone(),
            receiver_id: ev.receiver_id.clone(),
            kind: kind.to_string(),
            order,
            lamport_ts: ev.lamport_ts,
        }
    }
}

/// Everything a request handler needs; all clones point at the same node.
#[derive(Clone)]
pub struct NodeHandle {
    pub event_tx: mpsc::Sender<MarketEvent>,
    pub tape_rx: watch::Receiver<Vec<Trade>>,
    pub liveness: Arc<LivenessTracker>,
    pub symbols: Arc<Vec<String>>,
    pub agent_timeout_ms: i64,
}

impl NodeHandle {
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            recent_trades: self.tape_rx.borrow().clone(),
            agent_statuses: self.liveness.all_statuses(self.agent_timeout_ms),
            node_status: "UP".to_string(),
        }
    }
}

fn text_response(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(body.into())
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

async fn route(req: Request<Body>, h: NodeHandle) -> Result<Response<Body>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/submit") => {
            let bytes = hyper::body::to_bytes(req.into_body()).await?;
            let submit: SubmitRequest = match serde_json::from_slice(&bytes) {
                Ok(s) => s,
                Err(e) => {
                    warn!(?e, "unreadable submit payload");
                    return Ok(text_response(StatusCode::BAD_REQUEST, format!("bad payload: {e}")));
                }
            };
            match submit.into_event(&h.symbols) {
                Ok(ev) => {
                    if h.event_tx.send(ev).await.is_err() {
                        return Ok(text_response(
                            StatusCode::SERVICE_UNAVAILABLE,
                            "coordinator stopped",
                        ));
                    }
                    Ok(text_response(StatusCode::OK, "ok"))
                }
                Err(e) => {
                    warn!(err = %e, "rejected submit");
                    Ok(text_response(StatusCode::BAD_REQUEST, e.to_string()))
                }
            }
        }
        (&Method::GET, "/state") => {
            let snap = h.snapshot();
            match serde_json::to_vec(&snap) {
                Ok(body) => Ok(Response::builder()
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap_or_else(|_| Response::new(Body::empty()))),
                Err(e) => {
                    error!(?e, "snapshot encode failed");
                    Ok(text_response(StatusCode::INTERNAL_SERVER_ERROR, "encode error"))
                }
            }
        }
        _ => Ok(text_response(StatusCode::NOT_FOUND, "not found")),
    }
}

pub async fn serve(handle: NodeHandle, port: u16, mut shutdown: watch::Receiver<bool>) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make = make_service_fn(move |_conn| {
        let h = handle.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| route(req, h.clone()))) }
    });
    info!("node api listening on http://{addr}/ (POST /submit, GET /state)");
    let server = Server::bind(&addr).serve(make).with_graceful_shutdown(async move {
        let _ = shutdown.changed().await;
    });
    if let Err(e) = server.await {
        error!(?e, "node api server error");
    }
}

// ---- Client side (agents, monitor) ----

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] reqwest::Error),
    #[error("node rejected event: {0}")]
    Rejected(String),
    #[error("unexpected node response: HTTP {0}")]
    Status(u16),
}

pub struct NodeClient {
    http: reqwest::Client,
    base: String,
}

impl NodeClient {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self { http: reqwest::Client::new(), base: base.trim_end_matches('/').to_string() }
    }

    pub async fn submit(&self, ev: &MarketEvent) -> Result<(), TransportError> {
        let req = SubmitRequest::from(ev);
        let resp = self
            .http
            .post(format!("{}/submit", self.base))
            .json(&req)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::BAD_REQUEST {
            Err(TransportError::Rejected(resp.text().await.unwrap_or_default()))
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }

    pub async fn state(&self) -> Result<SystemSnapshot, TransportError> {
        let resp = self.http.get(format!("{}/state", self.base)).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }
        Ok(resp.json::<SystemSnapshot>().await?)
    }
}
