// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A bare `/metrics` + `/health` HTTP/1.0 responder over `tokio::net::TcpListener`.
//! No web framework: the request line is the only thing read, and the two
//! routes are matched by a literal prefix, which is all a Prometheus scraper
//! and a liveness probe ever need.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::ValidexMetrics;

pub async fn serve(port: u16, metrics: Arc<ValidexMetrics>) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "metrics endpoint listening");

    loop {
        let (socket, _) = listener.accept().await?;
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = handle(socket, metrics).await {
                warn!(error = %e, "metrics connection closed with an error");
            }
        });
    }
}

async fn handle(socket: tokio::net::TcpStream, metrics: Arc<ValidexMetrics>) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");

    let (status, body) = if path.starts_with("/metrics") {
        match metrics.encode() {
            Ok(text) => ("200 OK", text),
            Err(e) => ("500 Internal Server Error", e.to_string()),
        }
    } else if path.starts_with("/health") {
        ("200 OK", "ok".to_string())
    } else {
        ("404 Not Found", "not found".to_string())
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}
