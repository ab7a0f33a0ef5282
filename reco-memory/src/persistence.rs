//! JSON snapshots of short-term and long-term state.
//!
//! A snapshot directory holds two files: [`SHORT_TERM_FILE`] with windows and
//! update counters, and [`LONG_TERM_FILE`] with the ordered reflection logs.
//! Vector indexes are never written; they are rebuilt by re-embedding the logs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reco_primitives::EntityId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::record::InteractionRecord;
use crate::{MemoryError, MemoryResult};

/// File name of the short-term component.
pub const SHORT_TERM_FILE: &str = "short_term_mem.json";
/// File name of the long-term component.
pub const LONG_TERM_FILE: &str = "long_term_mem.json";

/// Serializable short-term state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortTermSnapshot {
    /// Window contents per entity, oldest first.
    pub entries: BTreeMap<EntityId, Vec<InteractionRecord>>,
    /// Monotonic update counter per entity.
    pub update_counts: BTreeMap<EntityId, u64>,
}

/// Serializable long-term state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermSnapshot {
    /// Reflection log per entity, in insertion order.
    pub log: BTreeMap<EntityId, Vec<String>>,
}

/// Writes both snapshot files into `dir`, creating it when needed.
///
/// Each file is written to a temporary sibling first and renamed into place.
///
/// # Errors
///
/// Returns [`MemoryError::Persist`] naming the directory or file whose write
/// failed. The
/// short-term file may already be in place when the long-term write fails.
pub async fn write_snapshots(
    dir: &Path,
    short_term: &ShortTermSnapshot,
    long_term: &LongTermSnapshot,
) -> MemoryResult<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|err| MemoryError::persist(dir, err))?;
    write_json(&dir.join(SHORT_TERM_FILE), short_term).await?;
    write_json(&dir.join(LONG_TERM_FILE), long_term).await?;
    debug!(
        dir = %dir.display(),
        entities = short_term.update_counts.len(),
        "memory snapshot written"
    );
    Ok(())
}

/// Reads both snapshot files from `dir`.
///
/// # Errors
///
/// Returns [`MemoryError::MissingState`] when either file is absent, checking
/// both before reading anything, and [`MemoryError::Persist`] naming the file
/// that could not be read or parsed.
pub async fn read_snapshots(dir: &Path) -> MemoryResult<(ShortTermSnapshot, LongTermSnapshot)> {
    let short_path = dir.join(SHORT_TERM_FILE);
    let long_path = dir.join(LONG_TERM_FILE);
    for path in [&short_path, &long_path] {
        if !fs::try_exists(path).await? {
            return Err(MemoryError::MissingState { path: path.clone() });
        }
    }
    let short_term = read_json(&short_path).await?;
    let long_term = read_json(&long_path).await?;
    Ok((short_term, long_term))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> MemoryResult<()> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|err| MemoryError::persist(path, err))?;
    let tmp = temp_sibling(path);
    fs::write(&tmp, &bytes)
        .await
        .map_err(|err| MemoryError::persist(path, err))?;
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(MemoryError::persist(path, err));
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> MemoryResult<T> {
    let bytes = fs::read(path)
        .await
        .map_err(|err| MemoryError::persist(path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| MemoryError::persist(path, err))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entity, record};

    #[tokio::test]
    async fn writes_both_files_and_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut short = ShortTermSnapshot::default();
        short.entries.insert(entity("u1"), vec![record("m1", 4)]);
        short.update_counts.insert(entity("u1"), 5);
        let mut long = LongTermSnapshot::default();
        long.log
            .insert(entity("u1"), vec!["likes thrillers".to_owned()]);

        let target = dir.path().join("nested");
        write_snapshots(&target, &short, &long).await.unwrap();
        assert!(target.join(SHORT_TERM_FILE).exists());
        assert!(target.join(LONG_TERM_FILE).exists());

        let (short_back, long_back) = read_snapshots(&target).await.unwrap();
        assert_eq!(short_back, short);
        assert_eq!(long_back, long);
    }

    #[tokio::test]
    async fn missing_component_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        write_json(&dir.path().join(SHORT_TERM_FILE), &ShortTermSnapshot::default())
            .await
            .unwrap();

        let err = read_snapshots(dir.path()).await.expect_err("long-term missing");
        match err {
            MemoryError::MissingState { path } => {
                assert_eq!(path, dir.path().join(LONG_TERM_FILE));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparsable_component_names_its_file() {
        let dir = tempfile::tempdir().unwrap();
        write_json(&dir.path().join(SHORT_TERM_FILE), &ShortTermSnapshot::default())
            .await
            .unwrap();
        fs::write(dir.path().join(LONG_TERM_FILE), b"{ not json")
            .await
            .unwrap();

        let err = read_snapshots(dir.path()).await.expect_err("corrupt long-term");
        match err {
            MemoryError::Persist { path, source } => {
                assert_eq!(path, dir.path().join(LONG_TERM_FILE));
                assert!(matches!(*source, MemoryError::Serialization { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_json_uses_entity_keys() {
        let mut short = ShortTermSnapshot::default();
        short.update_counts.insert(entity("42"), 1);
        short.entries.insert(entity("42"), vec![record("m9", 2)]);
        let json = serde_json::to_value(&short).unwrap();
        assert_eq!(json["update_counts"]["42"], 1);
        assert_eq!(json["entries"]["42"][0]["item_id"], "m9");
    }
}
