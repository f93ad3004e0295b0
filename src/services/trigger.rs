// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::services::keeper::{Keeper, KeeperStats};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Serve `/run`, `/metrics` and `/health` until `shutdown` fires.
///
/// Returns the bound address, or `None` when the port could not be bound.
pub async fn spawn_trigger_server(
    bind: &str,
    port: u16,
    token: String,
    keeper: Arc<Keeper>,
    shutdown: CancellationToken,
) -> Option<SocketAddr> {
    let listener = match TcpListener::bind((bind, port)).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(target: "trigger", bind, port, "Trigger server failed to bind: {}", e);
            return None;
        }
    };

    let local = listener.local_addr().ok();
    if let Some(addr) = local {
        tracing::info!(target: "trigger", "Trigger server listening on {}", addr);
    }

    let token = Arc::new(token);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "trigger", "Shutdown requested; closing trigger server");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let keeper = keeper.clone();
                        let token = token.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle(socket, &token, &keeper).await {
                                tracing::debug!(target: "trigger", %peer, "Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(target: "trigger", "Trigger accept error: {}", e);
                        continue;
                    }
                }
            }
        }
    });

    local
}

async fn handle(mut socket: TcpStream, token: &str, keeper: &Keeper) -> std::io::Result<()> {
    // Requests carry no body we care about; the head fits in one read.
    let mut buf = [0u8; 4096];
    let n = socket.read(&mut buf).await?;
    let req = String::from_utf8_lossy(&buf[..n]).to_string();
    let mut request_line = req.lines().next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("GET");
    let path = request_line.next().unwrap_or("/");
    let route = path.split_once('?').map(|(r, _)| r).unwrap_or(path);

    let (status, content_type, body) = match (method, route) {
        (_, "/health") => ("200 OK", "text/plain", "ok".to_string()),
        (_, "/metrics") => ("200 OK", "text/plain", render_metrics(&keeper.stats())),
        ("GET" | "POST", "/run") => {
            if authorized(&req, token) {
                let report = keeper.run_due().await;
                let body = serde_json::to_string(&report)
                    .unwrap_or_else(|e| json!({"error": e.to_string()}).to_string());
                ("200 OK", "application/json", body)
            } else {
                tracing::warn!(target: "trigger", "Rejected unauthorized run request");
                (
                    "401 Unauthorized",
                    "application/json",
                    json!({"error": "unauthorized"}).to_string(),
                )
            }
        }
        (_, "/run") => (
            "405 Method Not Allowed",
            "application/json",
            json!({"error": "method not allowed"}).to_string(),
        ),
        _ => (
            "404 Not Found",
            "application/json",
            json!({"error": "not found"}).to_string(),
        ),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn authorized(req: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    req.lines()
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("authorization"))
        .filter_map(|(_, value)| value.trim().strip_prefix("Bearer "))
        .any(|presented| constant_time_eq(presented.trim().as_bytes(), token.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn render_metrics(stats: &KeeperStats) -> String {
    format!(
        concat!(
            "# TYPE keeper_passes counter\nkeeper_passes {}\n",
            "# TYPE keeper_claimed counter\nkeeper_claimed {}\n",
            "# TYPE keeper_success counter\nkeeper_success {}\n",
            "# TYPE keeper_partial counter\nkeeper_partial {}\n",
            "# TYPE keeper_failed counter\nkeeper_failed {}\n",
            "# TYPE keeper_claim_skipped counter\nkeeper_claim_skipped {}\n"
        ),
        stats.passes.load(Ordering::Relaxed),
        stats.claimed.load(Ordering::Relaxed),
        stats.success.load(Ordering::Relaxed),
        stats.partial.load(Ordering::Relaxed),
        stats.failed.load(Ordering::Relaxed),
        stats.claim_skipped.load(Ordering::Relaxed),
    )
}
