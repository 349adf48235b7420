// src/health/checker.rs

use crate::config::HealthCheckConfig;
use crate::proxy::{BackendTarget, TargetRegistry};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

struct ProbeLoop {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodically probes every target in the registry and updates its health
/// flag in place. Explicit start/stop lifecycle: `stop` joins the probe loop,
/// so no probe runs after it returns.
pub struct HealthChecker {
    config: HealthCheckConfig,
    registry: TargetRegistry,
    client: Client,
    running: Mutex<Option<ProbeLoop>>,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig, registry: TargetRegistry) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            registry,
            client,
            running: Mutex::new(None),
        }
    }

    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("Health checker is already running");
            return;
        }

        info!(
            "Starting health checker with interval: {:?}",
            self.config.interval()
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_probe_loop(
            self.config.clone(),
            self.registry.clone(),
            self.client.clone(),
            shutdown_rx,
        ));

        *running = Some(ProbeLoop { shutdown_tx, task });
    }

    /// Signal the probe loop and wait for it to exit. Idempotent; restart via
    /// `start` is allowed afterwards.
    pub async fn stop(&self) {
        let probe_loop = self.running.lock().await.take();
        if let Some(probe_loop) = probe_loop {
            let _ = probe_loop.shutdown_tx.send(true);
            if let Err(e) = probe_loop.task.await {
                error!("Probe loop task failed: {}", e);
            }
            info!("Health checker stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Currently healthy targets, in registry order. Recomputed on each call;
    /// callers must tolerate consecutive calls returning different sets.
    pub fn active_targets(&self) -> Vec<Arc<BackendTarget>> {
        self.registry.healthy_targets()
    }
}

async fn run_probe_loop(
    config: HealthCheckConfig,
    registry: TargetRegistry,
    client: Client,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(config.interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                probe_all(&config, &registry, &client).await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Health checker shutting down");
                    break;
                }
            }
        }
    }
}

/// One probe round: all targets concurrently, each outcome written straight
/// onto its target.
async fn probe_all(config: &HealthCheckConfig, registry: &TargetRegistry, client: &Client) {
    let mut tasks = Vec::new();
    for target in registry.all() {
        let target = target.clone();
        let client = client.clone();
        let path = config.path.clone();
        tasks.push(tokio::spawn(async move {
            probe_target(&client, &path, target).await
        }));
    }

    let results = futures::future::join_all(tasks).await;
    let healthy = results
        .iter()
        .filter(|r| matches!(r, Ok(true)))
        .count();

    debug!(
        "Health check round complete: {}/{} targets healthy",
        healthy,
        registry.len()
    );
}

async fn probe_target(client: &Client, path: &str, target: Arc<BackendTarget>) -> bool {
    let url = format!("http://{}:{}{}", target.host, target.port, path);
    let was_healthy = target.is_healthy();

    // Any failure class (refused, timeout, DNS, non-200) counts the same:
    // the target is unhealthy until a probe succeeds again.
    let healthy = match client.get(&url).send().await {
        Ok(response) => response.status() == StatusCode::OK,
        Err(e) => {
            debug!(target_id = target.id, "Health probe failed: {}", e);
            false
        }
    };

    target.update_health(healthy).await;

    if healthy && !was_healthy {
        info!(target_id = target.id, addr = %target.addr(), "Target is healthy again");
    } else if !healthy && was_healthy {
        warn!(target_id = target.id, addr = %target.addr(), "Target is now unhealthy");
    }

    healthy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use tokio::time::Duration;

    fn test_config(interval_secs: u64) -> HealthCheckConfig {
        HealthCheckConfig {
            interval_secs,
            timeout_secs: 2,
            path: "/".to_string(),
        }
    }

    fn registry_for(server: &mockito::Server) -> TargetRegistry {
        let addr: std::net::SocketAddr = server.host_with_port().parse().unwrap();
        TargetRegistry::new(&[BackendConfig {
            id: 1,
            host: addr.ip().to_string(),
            port: addr.port(),
        }])
    }

    #[tokio::test]
    async fn probe_200_marks_target_healthy() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .create_async()
            .await;

        let registry = registry_for(&server);
        registry.all()[0].update_health(false).await;

        let client = Client::new();
        let healthy = probe_target(&client, "/", registry.all()[0].clone()).await;

        assert!(healthy);
        assert!(registry.all()[0].is_healthy());
    }

    #[tokio::test]
    async fn probe_non_200_marks_target_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(500)
            .create_async()
            .await;

        let registry = registry_for(&server);
        let checker = HealthChecker::new(test_config(5), registry.clone());

        let healthy = probe_target(&checker.client, "/", registry.all()[0].clone()).await;

        assert!(!healthy);
        assert!(checker.active_targets().is_empty());
    }

    #[tokio::test]
    async fn probe_connection_refused_marks_target_unhealthy() {
        let dead_port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let registry = TargetRegistry::new(&[BackendConfig {
            id: 1,
            host: "127.0.0.1".to_string(),
            port: dead_port,
        }]);

        let client = Client::new();
        assert!(!probe_target(&client, "/", registry.all()[0].clone()).await);
        assert!(!registry.all()[0].is_healthy());
    }

    #[tokio::test]
    async fn flip_is_visible_within_one_interval() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .expect_at_least(1)
            .create_async()
            .await;

        let registry = registry_for(&server);
        registry.all()[0].update_health(false).await;

        let checker = HealthChecker::new(test_config(1), registry.clone());
        checker.start().await;

        // First tick fires immediately; give the probe time to land.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(checker.active_targets().len(), 1);

        checker.stop().await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn double_start_is_a_noop_and_stop_joins() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .create_async()
            .await;

        let registry = registry_for(&server);
        let checker = HealthChecker::new(test_config(1), registry);

        checker.start().await;
        checker.start().await; // warns, does not spawn a second loop
        assert!(checker.is_running().await);

        checker.stop().await;
        assert!(!checker.is_running().await);
        checker.stop().await; // idempotent

        // Restart after stop re-enters the running state.
        checker.start().await;
        assert!(checker.is_running().await);
        checker.stop().await;
    }
}
