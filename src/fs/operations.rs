use std::path::{Path, PathBuf};

use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, io::AsyncWriteExt};

/// Writes `contents` into `path` without ever leaving a half-written file behind.
/// Data goes into a sibling temp file first and is renamed over the target, so a
/// reader either sees the previous version or the new one.
pub async fn replace_file_atomically(
    path: &Path,
    contents: &[u8],
) -> Result<(), std::io::Error> {
    let temp_path = temp_sibling(path);

    let mut file = File::create(&temp_path).await?;
    file.lock_exclusive()?;
    let write_result = write_and_sync(&mut file, contents).await;
    file.unlock_async().await?;
    drop(file);

    if let Err(e) = write_result {
        // Leave the target untouched, drop the partial temp file.
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&temp_path, path).await
}

async fn write_and_sync(file: &mut File, contents: &[u8]) -> Result<(), std::io::Error> {
    file.write_all(contents).await?;
    file.sync_all().await
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::fs::operations::replace_file_atomically;

    #[tokio::test]
    async fn test_replace_creates_file() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("data.json");

        replace_file_atomically(&target, b"first").await?;

        assert_eq!(tokio::fs::read(&target).await?, b"first");
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_overwrites_whole_file() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("data.json");

        replace_file_atomically(&target, b"a much longer first version").await?;
        replace_file_atomically(&target, b"second").await?;

        assert_eq!(tokio::fs::read(&target).await?, b"second");
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_leaves_no_temp_file() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("data.json");

        replace_file_atomically(&target, b"contents").await?;

        let names = std::fs::read_dir(dir.path())?
            .map(|v| v.unwrap().file_name())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["data.json"]);
        Ok(())
    }
}
