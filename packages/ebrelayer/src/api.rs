//! Health & Status API endpoints
//!
//! Provides HTTP endpoints for monitoring and status:
//! - GET /health - Simple health check
//! - GET /metrics - Prometheus metrics
//! - GET /status - Uptime and per-chain progress

use eyre::Result;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::metrics;

/// Server start time for uptime calculation
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Progress of one chain worker
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ChainStatus {
    /// Last checkpointed height
    pub height: u64,
    pub last_nonce: Option<String>,
    pub pending_claims: usize,
    /// Set once the worker stops on a fatal condition
    pub halted: Option<String>,
}

/// Shared per-chain status, written by workers and read by `/status`
pub type StatusBoard = Arc<RwLock<BTreeMap<String, ChainStatus>>>;

pub fn new_status_board() -> StatusBoard {
    Arc::new(RwLock::new(BTreeMap::new()))
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: u64,
    chains: BTreeMap<String, ChainStatus>,
}

/// Start the API server (combines metrics and status endpoints)
pub async fn start_api_server(addr: SocketAddr, board: StatusBoard) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server started");

    START_TIME.get_or_init(Instant::now);
    metrics::UP.set(1.0);

    loop {
        let (mut socket, _) = listener.accept().await?;
        let board = board.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            if socket.readable().await.is_ok() {
                let _ = socket.try_read(&mut buf);
            }

            let request = String::from_utf8_lossy(&buf);
            let response = route_request(&request, &board).await;
            let _ = socket.write_all(&response).await;
        });
    }
}

async fn route_request(request: &str, board: &StatusBoard) -> Vec<u8> {
    if request.starts_with("GET /metrics") {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        let _ = encoder.encode(&prometheus::gather(), &mut buffer);
        http_response("200 OK", "text/plain; charset=utf-8", buffer)
    } else if request.starts_with("GET /health") {
        http_response("200 OK", "text/plain", b"OK".to_vec())
    } else if request.starts_with("GET /status") {
        let status = build_status_response(board).await;
        let body = serde_json::to_vec(&status).unwrap_or_else(|_| b"{}".to_vec());
        http_response("200 OK", "application/json", body)
    } else {
        http_response("404 Not Found", "text/plain", Vec::new())
    }
}

fn http_response(status: &str, content_type: &str, body: Vec<u8>) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        status,
        content_type,
        body.len()
    )
    .into_bytes();
    response.extend(body);
    response
}

async fn build_status_response(board: &StatusBoard) -> StatusResponse {
    let chains = board.read().await.clone();
    let halted = chains.values().any(|c| c.halted.is_some());

    StatusResponse {
        status: if halted { "degraded" } else { "ok" },
        uptime_seconds: START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
        chains,
    }
}
