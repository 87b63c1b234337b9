//! Snapshot files
//!
//! Every snapshot is written twice: once under its RFC 3339 capture time and
//! once as `snapshot.jpg`, which always holds the latest capture. Both go
//! through a temporary file and a rename so readers never see a partial JPEG.

use crate::CvResult;
use chrono::{DateTime, Local, SecondsFormat};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Name of the file holding the latest snapshot
pub const LATEST_SNAPSHOT: &str = "snapshot.jpg";

/// Paths written by one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub timestamped: PathBuf,
    pub latest: PathBuf,
}

/// Writes snapshot JPEGs into a directory
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `jpeg` stamped with the current local time
    pub async fn write(&self, jpeg: &[u8]) -> CvResult<SnapshotPaths> {
        self.write_at(jpeg, Local::now()).await
    }

    pub async fn write_at(&self, jpeg: &[u8], taken: DateTime<Local>) -> CvResult<SnapshotPaths> {
        fs::create_dir_all(&self.dir).await?;

        let name = format!("{}.jpg", taken.to_rfc3339_opts(SecondsFormat::Secs, true));
        let paths = SnapshotPaths {
            timestamped: self.dir.join(name),
            latest: self.dir.join(LATEST_SNAPSHOT),
        };

        write_atomic(&paths.timestamped, jpeg).await?;
        write_atomic(&paths.latest, jpeg).await?;

        info!("Saved snapshot {}", paths.timestamped.display());
        Ok(paths)
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> CvResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_writes_timestamped_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("img/snapshots"));
        let taken = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();

        let paths = writer.write_at(b"jpeg-bytes", taken).await.unwrap();

        let name = paths.timestamped.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("2024-05-01T12:30:05"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(fs::read(&paths.timestamped).await.unwrap(), b"jpeg-bytes");
        assert_eq!(fs::read(&paths.latest).await.unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_latest_is_replaced_and_no_temp_files_remain() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());

        writer
            .write_at(b"first", Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
            .await
            .unwrap();
        writer
            .write_at(b"second", Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).unwrap())
            .await
            .unwrap();

        let latest = fs::read(dir.path().join(LATEST_SNAPSHOT)).await.unwrap();
        assert_eq!(latest, b"second");

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|name| !name.ends_with(".tmp")));
    }
}
