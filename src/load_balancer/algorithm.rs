// src/load_balancer/algorithm.rs
use crate::proxy::BackendTarget;
use async_trait::async_trait;
use std::sync::Arc;

/// Selection policy contract. `None` on an empty candidate set is a defined
/// outcome ("no eligible target"), not an error; the caller turns it into a
/// 503 for the client.
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    async fn select_target(
        &self,
        candidates: &[Arc<BackendTarget>],
    ) -> Option<Arc<BackendTarget>>;

    fn name(&self) -> &'static str;
}
