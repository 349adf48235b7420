// src/proxy/backend.rs

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// One backend the balancer can route traffic to. Built once from config at
/// startup; only `healthy` and `active_connections` mutate afterwards, each
/// through its own atomic so unrelated targets never contend.
#[derive(Debug)]
pub struct BackendTarget {
    pub id: u32,
    pub host: String,
    pub port: u16,

    // Runtime state
    healthy: AtomicBool,
    active_connections: AtomicUsize,
    last_health_check: RwLock<Option<DateTime<Utc>>>,
}

impl BackendTarget {
    pub fn new(id: u32, host: String, port: u16) -> Self {
        Self {
            id,
            host,
            port,
            // Assume alive until the first probe round says otherwise, so the
            // balancer can route immediately after startup.
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
            last_health_check: RwLock::new(None),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub async fn update_health(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
        let mut last_check = self.last_health_check.write().await;
        *last_check = Some(Utc::now());
    }

    pub async fn last_health_check(&self) -> Option<DateTime<Utc>> {
        *self.last_health_check.read().await
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn increment_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }
}
