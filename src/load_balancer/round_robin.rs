// src/load_balancer/round_robin.rs
use crate::load_balancer::LoadBalancer;
use crate::proxy::BackendTarget;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoadBalancer for RoundRobin {
    async fn select_target(
        &self,
        candidates: &[Arc<BackendTarget>],
    ) -> Option<Arc<BackendTarget>> {
        if candidates.is_empty() {
            return None;
        }

        // The modulus is taken against the live candidate count on every
        // call, so a cursor advanced against a larger set can never index
        // past the end of a set that has since shrunk. fetch_add gives each
        // concurrent caller a distinct pre-increment value.
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index].clone())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn targets(n: u32) -> Vec<Arc<BackendTarget>> {
        (1..=n)
            .map(|id| {
                Arc::new(BackendTarget::new(
                    id,
                    "localhost".to_string(),
                    9000 + id as u16,
                ))
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_candidate_set_yields_none() {
        let lb = RoundRobin::new();
        assert!(lb.select_target(&[]).await.is_none());
    }

    #[tokio::test]
    async fn visits_each_candidate_once_per_rotation() {
        let lb = RoundRobin::new();
        let candidates = targets(4);

        for round in 0..3 {
            let mut ids = Vec::new();
            for _ in 0..candidates.len() {
                ids.push(lb.select_target(&candidates).await.unwrap().id);
            }
            assert_eq!(ids, vec![1, 2, 3, 4], "round {round}");
        }
    }

    #[tokio::test]
    async fn resumes_valid_rotation_after_set_shrinks() {
        let lb = RoundRobin::new();
        let full = targets(5);

        // Advance the cursor near the end of the larger set.
        for _ in 0..4 {
            lb.select_target(&full).await.unwrap();
        }

        // A smaller set must still be indexed in bounds.
        let shrunk = full[..2].to_vec();
        for _ in 0..10 {
            let picked = lb.select_target(&shrunk).await.unwrap();
            assert!(shrunk.iter().any(|t| t.id == picked.id));
        }
    }

    #[tokio::test]
    async fn concurrent_selection_spreads_evenly() {
        let lb = Arc::new(RoundRobin::new());
        let candidates = targets(4);

        let mut handles = Vec::new();
        for _ in 0..100 {
            let lb = lb.clone();
            let candidates = candidates.clone();
            handles.push(tokio::spawn(async move {
                lb.select_target(&candidates).await.unwrap().id
            }));
        }

        let mut counts = [0usize; 4];
        for handle in handles {
            counts[(handle.await.unwrap() - 1) as usize] += 1;
        }
        // 100 selections over 4 candidates: exactly 25 each, no duplicates
        // or lost increments under concurrency.
        assert_eq!(counts, [25, 25, 25, 25]);
    }

    proptest! {
        // Whatever sequence of candidate-set sizes the health checker
        // produces, selection stays in bounds and resumes a valid rotation.
        #[test]
        fn never_indexes_out_of_bounds(sizes in proptest::collection::vec(0usize..8, 1..40)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                let lb = RoundRobin::new();
                let pool = targets(8);
                for size in sizes {
                    let candidates = pool[..size].to_vec();
                    match lb.select_target(&candidates).await {
                        Some(t) => assert!(candidates.iter().any(|c| c.id == t.id)),
                        None => assert!(candidates.is_empty()),
                    }
                }
            });
        }
    }
}
