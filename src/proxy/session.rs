// src/proxy/session.rs
// One proxied client-to-backend session: dial the backend, then pump bytes in
// both directions until each side has hit EOF or errored.

use super::backend::BackendTarget;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const RELAY_CHUNK_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Failed to connect to backend {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
}

/// Decrements the target's connection counter on every exit path.
struct ConnectionGuard<'a>(&'a BackendTarget);

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.decrement_connections();
    }
}

/// Proxy one accepted client connection to `target`. Both sockets are owned
/// by this call and are closed on every exit path. Returns only once both
/// relay directions have terminated; a half-close in one direction does not
/// end the session.
pub async fn serve(client: TcpStream, target: Arc<BackendTarget>) -> Result<(), ProxyError> {
    let backend = TcpStream::connect(target.addr())
        .await
        .map_err(|source| ProxyError::Connect {
            addr: target.addr(),
            source,
        })?;

    let client_addr = client.peer_addr().ok();
    debug!(
        backend_id = target.id,
        backend = %target.addr(),
        "Session opened"
    );

    target.increment_connections();
    let _guard = ConnectionGuard(&target);

    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    // Each direction terminates independently; the session is over when both
    // have. Dropping the halves afterwards closes both sockets.
    tokio::join!(
        relay(client_read, backend_write, client_addr),
        relay(backend_read, client_write, None),
    );

    debug!(backend_id = target.id, "Session closed");
    Ok(())
}

/// Pump bytes from `source` to `dest` until EOF or an I/O error, then
/// half-close `dest` so the peer observes EOF for this direction. When
/// `log_peer` is set (the client-to-backend direction), each chunk is logged
/// with a lossy text preview for diagnostics.
async fn relay<R, W>(mut source: R, mut dest: W, log_peer: Option<SocketAddr>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; RELAY_CHUNK_SIZE];
    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "Relay read ended");
                break;
            }
        };

        if let Some(peer) = log_peer {
            debug!(
                client = %peer,
                preview = %String::from_utf8_lossy(&buf[..n]),
                "Forwarding request bytes"
            );
        }

        if let Err(e) = dest.write_all(&buf[..n]).await {
            debug!(error = %e, "Relay write ended");
            break;
        }
    }

    let _ = dest.shutdown().await;
}
