// src/server/dispatcher.rs

use crate::config::Config;
use crate::health::HealthChecker;
use crate::load_balancer::{create_load_balancer, LoadBalancer};
use crate::proxy::{self, TargetRegistry};
use crate::server::listener::bind_tcp;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Sent verbatim when no healthy target exists, whatever protocol the client
/// speaks. The client is never left hanging.
const SERVICE_UNAVAILABLE_RESPONSE: &[u8] =
    b"HTTP/1.1 503 Service Unavailable\r\n\r\nNo healthy backends available\n";

struct AcceptLoop {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Owns the listening socket and the start/stop lifecycle of itself and the
/// health checker. stopped -> running -> stopped; restart after stop is
/// allowed.
pub struct Dispatcher {
    host: String,
    port: u16,
    load_balancer: Arc<dyn LoadBalancer>,
    health_checker: Arc<HealthChecker>,
    running: Mutex<Option<AcceptLoop>>,
}

impl Dispatcher {
    pub fn new(
        host: String,
        port: u16,
        load_balancer: Arc<dyn LoadBalancer>,
        health_checker: Arc<HealthChecker>,
    ) -> Self {
        Self {
            host,
            port,
            load_balancer,
            health_checker,
            running: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let registry = TargetRegistry::new(&config.backends);
        let health_checker = Arc::new(HealthChecker::new(config.health_check.clone(), registry));
        Self::new(
            config.listen.host.clone(),
            config.listen.port,
            create_load_balancer(config.algorithm),
            health_checker,
        )
    }

    /// Start the health checker, bind the listening socket, and spawn the
    /// accept loop. No-op with a warning if already running.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("Dispatcher is already running");
            return Ok(());
        }

        self.health_checker.start().await;

        let listener = bind_tcp(&self.host, self.port).await?;
        let local_addr = listener.local_addr()?;
        info!("Load balancer listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(
            listener,
            self.load_balancer.clone(),
            self.health_checker.clone(),
            shutdown_rx,
        ));

        *running = Some(AcceptLoop {
            shutdown_tx,
            task,
            local_addr,
        });
        Ok(())
    }

    /// Stop accepting, close the listening socket, and stop the health
    /// checker. In-flight proxy sessions are not interrupted; they drain on
    /// their own EOF or error.
    pub async fn stop(&self) {
        let accept_loop = self.running.lock().await.take();
        if let Some(accept_loop) = accept_loop {
            let _ = accept_loop.shutdown_tx.send(true);
            if let Err(e) = accept_loop.task.await {
                error!("Accept loop task failed: {}", e);
            }
            self.health_checker.stop().await;
            info!("Load balancer stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Address actually bound, once running. Differs from the configured port
    /// when that port is 0.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|l| l.local_addr)
    }
}

async fn accept_loop(
    listener: TcpListener,
    load_balancer: Arc<dyn LoadBalancer>,
    health_checker: Arc<HealthChecker>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((client, peer)) => {
                        debug!(%peer, "Accepted connection");
                        let load_balancer = load_balancer.clone();
                        let health_checker = health_checker.clone();
                        // One task per connection; the accept loop never
                        // waits on a handler.
                        tokio::spawn(async move {
                            handle_connection(client, peer, load_balancer, health_checker).await;
                        });
                    }
                    Err(e) => {
                        warn!("Accept error: {}", e);
                    }
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    // Dropping the listener here closes the listening socket.
    info!("Accept loop stopped");
}

async fn handle_connection(
    mut client: TcpStream,
    peer: SocketAddr,
    load_balancer: Arc<dyn LoadBalancer>,
    health_checker: Arc<HealthChecker>,
) {
    let candidates = health_checker.active_targets();

    let Some(target) = load_balancer.select_target(&candidates).await else {
        warn!(client = %peer, "No healthy targets available, returning 503");
        if let Err(e) = client.write_all(SERVICE_UNAVAILABLE_RESPONSE).await {
            debug!(client = %peer, "Failed to write 503 response: {}", e);
        }
        let _ = client.shutdown().await;
        return;
    };

    debug!(
        client = %peer,
        backend_id = target.id,
        backend = %target.addr(),
        "Selected target"
    );

    // A single session's failure never takes down the dispatcher; serve owns
    // both sockets and closes them on every path.
    if let Err(e) = proxy::serve(client, target).await {
        error!(client = %peer, "Proxy session failed: {}", e);
    }
}
