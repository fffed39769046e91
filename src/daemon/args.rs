use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::sampler::SamplerConfig;


#[derive(Parser)]
pub struct DaemonArgs {
  #[arg(long)]
  pub force: bool,
  #[arg(long)]
  pub dir: Option<PathBuf>,
  /// This option is for debugging purposes only.
  #[arg(long = "log-console")]
  pub log_console : bool,
  #[arg(long = "log-filter")]
  pub log: Option<LevelFilter>,
  #[arg(long = "poll-interval", help = "Seconds between process samples")]
  pub poll_interval: Option<u64>,
}

impl DaemonArgs {
    pub fn sampler_config(&self) -> SamplerConfig {
        let mut config = SamplerConfig::default();
        if let Some(seconds) = self.poll_interval {
            config.poll_interval = Duration::from_secs(seconds);
        }
        config
    }
}
