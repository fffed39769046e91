use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{debug, warn};

use crate::fs::operations::replace_file_atomically;

use super::{entities::TrackedProcessEntity, ledger::UsageLedger};

pub const LEDGER_FILE: &str = "usage_data.json";
pub const TRACKED_FILE: &str = "current_process_data.json";

/// Owns the on-disk layout of the tracker data directory.
pub struct LedgerStorage {
    data_dir: PathBuf,
}

impl LedgerStorage {
    /// Failing to create the data directory is the one unrecoverable startup
    /// error of the tracker.
    pub fn new(data_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&data_dir)?;

        Ok(Self { data_dir })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    fn tracked_path(&self) -> PathBuf {
        self.data_dir.join(TRACKED_FILE)
    }

    /// Loads the ledger. A missing file means a first run. An unparseable file
    /// is logged and superseded by an empty ledger on the next save; neither
    /// case stops the daemon.
    pub async fn load(&self) -> Result<UsageLedger> {
        let path = self.ledger_path();
        let contents = match read_locked(&path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No ledger at {path:?} yet, starting empty");
                return Ok(UsageLedger::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("Ledger file {path:?} is corrupted, starting empty: {e}");
                Ok(UsageLedger::new())
            }
        }
    }

    /// Renames an unreadable ledger file to a `.bak` sibling, so a later save
    /// can never replace data that was never loaded.
    pub async fn sideline_ledger(&self) -> Result<PathBuf> {
        let path = self.ledger_path();
        let backup = path.with_extension("json.bak");
        tokio::fs::rename(&path, &backup).await?;
        Ok(backup)
    }

    /// Flushes the ledger through atomic replacement, so a concurrent or
    /// interrupted load never observes a half-written file.
    pub async fn save(&self, ledger: &UsageLedger) -> Result<()> {
        let contents = serde_json::to_vec_pretty(ledger)?;
        replace_file_atomically(&self.ledger_path(), &contents).await?;
        Ok(())
    }

    /// Overwrites the diagnostic snapshot of currently tracked processes.
    pub async fn save_tracked(&self, tracked: &[TrackedProcessEntity]) -> Result<()> {
        let contents = serde_json::to_vec_pretty(tracked)?;
        replace_file_atomically(&self.tracked_path(), &contents).await?;
        Ok(())
    }
}

async fn read_locked(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path).await?;
    file.lock_shared()?;
    let mut contents = String::new();
    let result = file.read_to_string(&mut contents).await;
    file.unlock_async().await?;
    result?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, Utc};
    use tempfile::tempdir;

    use crate::daemon::storage::{
        entities::TrackedProcessEntity,
        ledger::UsageLedger,
        ledger_storage::{LedgerStorage, LEDGER_FILE, TRACKED_FILE},
    };

    fn sample_ledger() -> UsageLedger {
        let mut ledger = UsageLedger::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        ledger.apply_increment("Firefox", 120.5, date, Utc::now());
        ledger.apply_increment("Visual Studio Code", 64.25, date, Utc::now());
        ledger
    }

    #[tokio::test]
    async fn test_save_load_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorage::new(dir.path().to_owned())?;

        let ledger = sample_ledger();
        storage.save(&ledger).await?;
        let loaded = storage.load().await?;

        assert_eq!(loaded, ledger);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_without_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorage::new(dir.path().to_owned())?;

        assert!(storage.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_load_corrupted_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorage::new(dir.path().to_owned())?;
        std::fs::write(dir.path().join(LEDGER_FILE), b"{\"Firefox\": {\"total_")?;

        assert!(storage.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_replaces_previous_version() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorage::new(dir.path().to_owned())?;

        storage.save(&sample_ledger()).await?;
        let mut updated = sample_ledger();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        updated.apply_increment("Firefox", 10., date, Utc::now());
        storage.save(&updated).await?;

        assert_eq!(storage.load().await?, updated);
        Ok(())
    }

    #[tokio::test]
    async fn test_sideline_moves_ledger_aside() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorage::new(dir.path().to_owned())?;
        std::fs::write(dir.path().join(LEDGER_FILE), b"precious history")?;

        let backup = storage.sideline_ledger().await?;

        assert_eq!(std::fs::read(&backup)?, b"precious history");
        assert!(!dir.path().join(LEDGER_FILE).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_tracked_writes_diagnostic_file() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorage::new(dir.path().to_owned())?;

        let tracked = vec![TrackedProcessEntity {
            pid: 4242,
            start_time: 1_772_000_000,
            name: "firefox.exe".into(),
            cpu_user_seconds: 12.5,
            cpu_system_seconds: 3.25,
        }];
        storage.save_tracked(&tracked).await?;

        let contents = std::fs::read_to_string(dir.path().join(TRACKED_FILE))?;
        let loaded = serde_json::from_str::<Vec<TrackedProcessEntity>>(&contents)?;
        assert_eq!(loaded, tracked);
        Ok(())
    }
}
