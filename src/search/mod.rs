//! The search-index seam: one trait, one production client, and the
//! settling logic that makes a freshly created index safe to write to.
//!
//! ## Why a trait?
//!
//! The engines take `&dyn SearchIndex` instead of a concrete client so every
//! component is independently testable against a fake — the integration
//! suite drives the whole ingest path against an in-memory index that
//! simulates the propagation window and scores k-NN queries by cosine
//! distance, with zero network.
//!
//! ## Settling
//!
//! Managed search indexes propagate their access/data policies
//! asynchronously after creation; writes issued too early fail or are
//! silently dropped. [`wait_until_writable`] prefers polling the engine's
//! readiness signal (bounded by the configured settling interval) and falls
//! back to a single fixed sleep when the engine exposes none.

pub mod opensearch;

pub use opensearch::OpenSearchIndex;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::store::IndexedDocument;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// What the engine reports about a just-provisioned index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The index accepts reads and writes.
    Ready,
    /// The index exists but its policies have not finished propagating.
    Pending,
    /// The engine exposes no readiness signal (or the probe failed);
    /// callers must fall back to the fixed settling delay.
    Unknown,
}

/// A writable, queryable search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Probe whether the index accepts writes yet.
    async fn readiness(&self) -> Readiness;

    /// Submit one document. No batching, no client-side id: the engine
    /// assigns ids, so re-ingesting the same store appends duplicates.
    async fn put_document(&self, doc: &IndexedDocument) -> Result<(), PipelineError>;

    /// Run a raw search request and return the engine's JSON response.
    async fn query(&self, body: &serde_json::Value) -> Result<serde_json::Value, PipelineError>;
}

/// Wait until the index is plausibly writable.
///
/// Polls [`SearchIndex::readiness`] with exponential backoff (starting at
/// `readiness_poll_secs`, doubling per probe) for at most `settle_secs`
/// total. If the very first probe reports [`Readiness::Unknown`] the engine
/// has no usable signal, so this sleeps the full fixed interval once
/// instead. Returning does not guarantee writability — a probe can lie
/// during propagation — which is why the Indexing Engine still re-waits and
/// retries once if the first write bounces.
pub async fn wait_until_writable(index: &dyn SearchIndex, config: &PipelineConfig) {
    if config.settle_secs == 0 {
        return;
    }

    let budget = Duration::from_secs(config.settle_secs);
    let mut poll = Duration::from_secs(config.readiness_poll_secs);
    let start = Instant::now();

    match index.readiness().await {
        Readiness::Ready => {
            debug!("Index ready on first probe");
            return;
        }
        Readiness::Unknown => {
            info!(
                "No readiness signal from the index; sleeping the fixed {}s settling interval",
                config.settle_secs
            );
            sleep(budget).await;
            return;
        }
        Readiness::Pending => {}
    }

    while start.elapsed() < budget {
        let remaining = budget.saturating_sub(start.elapsed());
        sleep(poll.min(remaining)).await;
        match index.readiness().await {
            Readiness::Ready => {
                info!("Index became ready after {:?}", start.elapsed());
                return;
            }
            // A probe that degrades to Unknown mid-settle is treated as
            // still-pending: the budget bounds the total wait either way.
            Readiness::Pending | Readiness::Unknown => {}
        }
        poll = poll.saturating_mul(2);
    }

    warn!(
        "Index still not ready after {}s settling budget; proceeding (first write gets one retry)",
        config.settle_secs
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe-counting index: `Pending` for the first `ready_after` probes.
    struct ProbedIndex {
        probes: AtomicUsize,
        ready_after: usize,
        signal: Readiness,
    }

    #[async_trait]
    impl SearchIndex for ProbedIndex {
        async fn readiness(&self) -> Readiness {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            if self.signal == Readiness::Unknown {
                Readiness::Unknown
            } else if n >= self.ready_after {
                Readiness::Ready
            } else {
                Readiness::Pending
            }
        }

        async fn put_document(&self, _doc: &IndexedDocument) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn query(
            &self,
            _body: &serde_json::Value,
        ) -> Result<serde_json::Value, PipelineError> {
            Ok(serde_json::json!({}))
        }
    }

    fn config(settle: u64, poll: u64) -> PipelineConfig {
        PipelineConfig::builder()
            .settle_secs(settle)
            .readiness_poll_secs(poll)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn returns_early_once_ready() {
        // Pending for two probes, Ready on the third.
        let index = ProbedIndex {
            probes: AtomicUsize::new(0),
            ready_after: 2,
            signal: Readiness::Pending,
        };
        let start = Instant::now();
        wait_until_writable(&index, &config(45, 5)).await;
        // Ready on the third probe → sleeps of 5s then 10s, under the budget.
        assert_eq!(start.elapsed().as_secs(), 15);
        assert_eq!(index.probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_signal_falls_back_to_fixed_sleep() {
        let index = ProbedIndex {
            probes: AtomicUsize::new(0),
            ready_after: 0,
            signal: Readiness::Unknown,
        };
        let start = Instant::now();
        wait_until_writable(&index, &config(45, 5)).await;
        assert_eq!(start.elapsed().as_secs(), 45);
        // One probe only: no point polling a signal that does not exist.
        assert_eq!(index.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_budget() {
        let index = ProbedIndex {
            probes: AtomicUsize::new(0),
            ready_after: usize::MAX,
            signal: Readiness::Pending,
        };
        let start = Instant::now();
        wait_until_writable(&index, &config(20, 5)).await;
        assert_eq!(start.elapsed().as_secs(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_settle_skips_waiting() {
        let index = ProbedIndex {
            probes: AtomicUsize::new(0),
            ready_after: usize::MAX,
            signal: Readiness::Pending,
        };
        wait_until_writable(&index, &config(0, 1)).await;
        assert_eq!(index.probes.load(Ordering::SeqCst), 0);
    }
}
