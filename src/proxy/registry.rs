// src/proxy/registry.rs

use super::backend::BackendTarget;
use crate::config::BackendConfig;
use std::sync::Arc;

/// Ordered, fixed set of targets built once at startup. The order is stable
/// for the process lifetime; round-robin indices are only meaningful against
/// this order.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Arc<Vec<Arc<BackendTarget>>>,
}

impl TargetRegistry {
    pub fn new(configs: &[BackendConfig]) -> Self {
        let targets = configs
            .iter()
            .map(|c| Arc::new(BackendTarget::new(c.id, c.host.clone(), c.port)))
            .collect();

        Self {
            targets: Arc::new(targets),
        }
    }

    pub fn all(&self) -> &[Arc<BackendTarget>] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Snapshot of the currently healthy targets, in registry order. Computed
    /// fresh on every call; two consecutive calls may differ.
    pub fn healthy_targets(&self) -> Vec<Arc<BackendTarget>> {
        self.targets
            .iter()
            .filter(|t| t.is_healthy())
            .cloned()
            .collect()
    }
}
