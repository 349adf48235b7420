// src/server/listener.rs
// Encapsulates the low-level TCP bind so the dispatcher never touches
// socket setup directly.
use anyhow::{Context, Result};
use tokio::net::TcpListener;

pub async fn bind_tcp(host: &str, port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    Ok(listener)
}
