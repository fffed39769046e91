use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    process_api::{ProcessProvider, Snapshot},
    resolver::SoftwareIndex,
    utils::clock::Clock,
};

use super::storage::{
    entities::TrackedProcessEntity, ledger::UsageLedger, ledger_storage::LedgerStorage,
};

/// Poll loop pacing. Defaults follow the tracker's observed behaviour:
/// sample every 5 seconds, wait 10 after a failed cycle.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(10),
        }
    }
}

pub struct UsageSampler {
    provider: Box<dyn ProcessProvider>,
    index: SoftwareIndex,
    ledger: Arc<RwLock<UsageLedger>>,
    storage: LedgerStorage,
    previous: Snapshot,
    shutdown: CancellationToken,
    config: SamplerConfig,
    clock: Arc<dyn Clock>,
}

impl UsageSampler {
    pub fn new(
        provider: Box<dyn ProcessProvider>,
        index: SoftwareIndex,
        ledger: Arc<RwLock<UsageLedger>>,
        storage: LedgerStorage,
        shutdown: CancellationToken,
        config: SamplerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            index,
            ledger,
            storage,
            previous: Snapshot::new(),
            shutdown,
            config,
            clock,
        }
    }

    /// Executes the sampling event loop. Failed cycles are logged and retried
    /// after a backoff; only cancellation ends the loop.
    pub async fn run(mut self) -> Result<()> {
        // Seed the baseline. Should this fail, the first successful cycle
        // seeds it instead.
        match self.provider.snapshot() {
            Ok(initial) => self.previous = initial,
            Err(e) => warn!("Failed to take the initial snapshot {e:?}"),
        }

        loop {
            let next_sleep = match self.poll_cycle().await {
                Ok(()) => self.config.poll_interval,
                Err(e) => {
                    error!("Encountered an error during poll cycle {e:?}");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                // Cancelation means we stop the event loop after flushing
                // whatever the last cycle accumulated.
                _ = self.shutdown.cancelled() => {
                    return self.flush().await;
                }
                _ = self.clock.sleep(next_sleep) => ()
            }
        }
    }

    async fn poll_cycle(&mut self) -> Result<()> {
        let current = self.provider.snapshot()?;
        let now = self.clock.time();
        let today = now.date_naive();

        {
            let mut ledger = self.ledger.write().await;
            for (identity, sample) in &current {
                let Some(previous) = self.previous.get(identity) else {
                    // Newly seen instance. Its baseline is recorded now and
                    // diffed on the next cycle.
                    continue;
                };

                let delta = sample.cpu_total_seconds() - previous.cpu_total_seconds();
                // Counter resets produce negative deltas. Discarded, never subtracted.
                if delta > 0. {
                    let app_name = self.index.resolve(&sample.name);
                    debug!("Crediting {delta:.3}s to {app_name}");
                    ledger.apply_increment(&app_name, delta, today, now);
                }
            }
        }

        // Identities absent from `current` exited. CPU they consumed since the
        // previous poll was never observed and is lost, which under-counts
        // short-lived processes.
        self.previous = current;

        self.persist().await;
        Ok(())
    }

    /// Persistence failures are recoverable: the in-memory ledger stays
    /// authoritative and the next cycle retries the flush.
    async fn persist(&self) {
        {
            let ledger = self.ledger.read().await;
            if let Err(e) = self.storage.save(&ledger).await {
                warn!("Failed to persist ledger {e:?}");
            }
        }

        let tracked = self
            .previous
            .values()
            .map(TrackedProcessEntity::from)
            .collect::<Vec<_>>();
        if let Err(e) = self.storage.save_tracked(&tracked).await {
            warn!("Failed to persist tracked process snapshot {e:?}");
        }
    }

    async fn flush(&self) -> Result<()> {
        info!("Sampler shutting down, flushing the ledger");
        let ledger = self.ledger.read().await;
        self.storage.save(&ledger).await
    }
}
