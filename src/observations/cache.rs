use crate::observations::error::FetchError;
use crate::types::observation::RawObservation;
use crate::types::period::DateSpan;
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::{NaiveDate, Utc};
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// On-disk store of fetched partitions, one bincode file per
/// station and partition.
///
/// Only partitions that ended before `today` are stored: the provider keeps
/// appending to recent periods, so anything newer is always fetched again.
#[derive(Debug, Clone)]
pub struct PartitionCache {
    dir: PathBuf,
    today: NaiveDate,
}

impl PartitionCache {
    /// A cache in `dir` that treats the current UTC date as today.
    ///
    /// The directory must exist; see
    /// [`ensure_cache_dir_exists`](crate::ensure_cache_dir_exists).
    pub fn new(dir: &Path) -> Self {
        Self::with_today(dir, Utc::now().date_naive())
    }

    pub(crate) fn with_today(dir: &Path, today: NaiveDate) -> Self {
        PartitionCache {
            dir: dir.to_path_buf(),
            today,
        }
    }

    pub fn is_cacheable(&self, partition: &DateSpan) -> bool {
        partition.end < self.today
    }

    fn file_path(&self, station: &str, partition: &DateSpan) -> PathBuf {
        let station: String = station
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!(
            "{}_{}_{}.bin",
            station,
            partition.start.format("%Y%m%d"),
            partition.end.format("%Y%m%d")
        ))
    }

    /// Cached observations for `partition`, `None` on a cache miss.
    pub async fn load(
        &self,
        station: &str,
        partition: &DateSpan,
    ) -> Result<Option<Vec<RawObservation>>, FetchError> {
        if !self.is_cacheable(partition) {
            return Ok(None);
        }
        let path = self.file_path(station, partition);
        if tokio::fs::metadata(&path).await.is_err() {
            return Ok(None);
        }
        let observations = tokio::task::spawn_blocking(move || {
            let bytes =
                std::fs::read(&path).map_err(|e| FetchError::CacheRead(path.clone(), e))?;
            let (decoded, _) = bincode::serde::decode_from_slice::<Vec<RawObservation>, _>(
                &bytes,
                BINCODE_CONFIG,
            )
            .map_err(|e| FetchError::CacheDecode(path.clone(), Box::new(e)))?;
            Ok::<_, FetchError>(decoded)
        })
        .await??;
        info!(
            "Cache hit for station {} partition {} ({} readings)",
            station,
            partition,
            observations.len()
        );
        Ok(Some(observations))
    }

    /// Stores `observations` for `partition`. A no-op for partitions that are
    /// not cacheable.
    pub async fn store(
        &self,
        station: &str,
        partition: &DateSpan,
        observations: &[RawObservation],
    ) -> Result<(), FetchError> {
        if !self.is_cacheable(partition) {
            return Ok(());
        }
        let path = self.file_path(station, partition);
        let dir = self.dir.clone();
        let observations = observations.to_vec();
        tokio::task::spawn_blocking(move || {
            let bytes = bincode::serde::encode_to_vec(&observations, BINCODE_CONFIG)
                .map_err(|e| FetchError::CacheEncode(Box::new(e)))?;
            // Written next to the target and renamed so readers never see a partial file.
            let mut temp_file =
                NamedTempFile::new_in(&dir).map_err(|e| FetchError::CacheWrite(path.clone(), e))?;
            temp_file
                .write_all(&bytes)
                .map_err(|e| FetchError::CacheWrite(path.clone(), e))?;
            temp_file
                .persist(&path)
                .map_err(|e| FetchError::CacheWrite(path.clone(), e.error))?;
            Ok::<(), FetchError>(())
        })
        .await??;
        Ok(())
    }
}
