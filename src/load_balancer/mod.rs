// src/load_balancer/mod.rs
mod algorithm;
mod round_robin;

pub use algorithm::LoadBalancer;
pub use round_robin::RoundRobin;

use crate::config::LoadBalancerAlgorithm;
use std::sync::Arc;

/// Map the config enum to a policy. Unsupported names never reach this point:
/// they fail config deserialization, which is fatal at startup.
pub fn create_load_balancer(algorithm: LoadBalancerAlgorithm) -> Arc<dyn LoadBalancer> {
    match algorithm {
        LoadBalancerAlgorithm::RoundRobin => Arc::new(RoundRobin::new()),
    }
}
