use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use tracing::error;

use crate::{process_api::GenericProcessProvider, utils::clock::DefaultClock};

pub mod args;
pub mod sampler;
pub mod shutdown;
pub mod storage;
pub mod tracker;

use sampler::SamplerConfig;
use tracker::UsageTracker;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config: SamplerConfig) -> Result<()> {
    let provider = GenericProcessProvider::new()?;
    let tracker =
        UsageTracker::start(dir, Box::new(provider), Arc::new(DefaultClock), config).await?;

    shutdown::detect_shutdown(tracker.shutdown_token()).await;

    tracker
        .stop()
        .await
        .inspect_err(|e| error!("Sampler module got an error {:?}", e))
}
