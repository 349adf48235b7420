//! Minimal backend for manual testing: answers every connection with an
//! HTTP 200 naming itself, so it satisfies health probes and shows which
//! backend served a request.
//!
//! Run: cargo run --bin test_backend -- <port> [name]

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let port: u16 = args
        .next()
        .context("usage: test_backend <port> [name]")?
        .parse()
        .context("port must be a number")?;
    let name = args.next().unwrap_or_else(|| format!("backend-{}", port));

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!("{} listening on 127.0.0.1:{}", name, port);

    loop {
        let (mut sock, peer) = listener.accept().await?;
        let name = name.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;

            let body = format!("Hello from {}\n", name);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = sock.write_all(response.as_bytes()).await;
            let _ = sock.shutdown().await;
            debug!(%peer, "Served request");
        });
    }
}
