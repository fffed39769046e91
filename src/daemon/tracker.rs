use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{process_api::ProcessProvider, resolver::SoftwareIndex, utils::clock::Clock};

use super::{
    sampler::{SamplerConfig, UsageSampler},
    storage::{
        ledger::UsageLedger,
        ledger_storage::LedgerStorage,
        query::{self, AppUsage, RecentUsage},
    },
};

/// Owns everything the tracking subsystem needs: the software index, the
/// shared ledger and the background sampling task. Constructed explicitly and
/// passed by reference to consumers; there is no ambient global tracker.
pub struct UsageTracker {
    ledger: Arc<RwLock<UsageLedger>>,
    shutdown: CancellationToken,
    sampler_task: JoinHandle<Result<()>>,
    clock: Arc<dyn Clock>,
}

impl UsageTracker {
    /// Builds the software index, loads the ledger and spawns the sampling
    /// loop. Only an unusable data directory aborts startup.
    pub async fn start(
        data_dir: PathBuf,
        provider: Box<dyn ProcessProvider>,
        clock: Arc<dyn Clock>,
        config: SamplerConfig,
    ) -> Result<Self> {
        let storage = LedgerStorage::new(data_dir)?;

        let index = SoftwareIndex::build();
        info!("Software index resolved {} executables", index.len());

        let ledger = match storage.load().await {
            Ok(v) => v,
            Err(e) => {
                // Saving over a file that was never read would destroy it.
                // Move it out of the way first; if even that fails, refuse to
                // start.
                let backup = storage.sideline_ledger().await?;
                warn!("Ledger is unreadable, sidelined to {backup:?}, starting empty {e:?}");
                UsageLedger::new()
            }
        };
        let ledger = Arc::new(RwLock::new(ledger));

        let shutdown = CancellationToken::new();
        let sampler = UsageSampler::new(
            provider,
            index,
            ledger.clone(),
            storage,
            shutdown.clone(),
            config,
            clock.clone(),
        );
        let sampler_task = tokio::spawn(sampler.run());

        Ok(Self {
            ledger,
            shutdown,
            sampler_task,
            clock,
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Aggregated usage over the trailing `days`. Takes a read lock, so it is
    /// safe to call while a sampling cycle runs.
    pub async fn recent_usage(&self, days: u32) -> RecentUsage {
        let today = self.today();
        query::recent_usage(&*self.ledger.read().await, days, today)
    }

    pub async fn top_apps(&self, limit: Option<usize>, days: u32) -> Vec<(String, AppUsage)> {
        let today = self.today();
        query::top_apps(&*self.ledger.read().await, limit, days, today)
    }

    fn today(&self) -> NaiveDate {
        self.clock.time().date_naive()
    }

    /// Stops the sampling loop and waits for its final flush.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        self.sampler_task.await?
    }
}
