// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Day-partitioned ledger of already-sent notification tasks.
//!
//! Each calendar day gets its own `sent_tasks_YYYYMMDD.json` file holding the
//! task keys committed on that day. Loading unions the newest three partitions
//! into one in-memory set, so a restart never re-sends anything from the last
//! few days; older partitions are pruned from disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, warn};

use bookline_core::BooklineError;
use bookline_core::dates::COMPACT_DATE_FORMAT;

const PARTITION_PREFIX: &str = "sent_tasks_";
const PARTITION_SUFFIX: &str = ".json";

/// How many day partitions survive on disk. Everything older is deleted.
pub const KEPT_PARTITIONS: usize = 3;

fn partition_name(day: NaiveDate) -> String {
    format!(
        "{PARTITION_PREFIX}{}{PARTITION_SUFFIX}",
        day.format(COMPACT_DATE_FORMAT)
    )
}

/// In-memory view of the sent ledger plus its backing directory.
///
/// `contains` answers from the union of all loaded partitions; `commit`
/// writes only the current day's partition. Keys committed on earlier days
/// stay queryable until the process restarts after their partition is pruned.
pub struct SentLedger {
    dir: PathBuf,
    sent: HashSet<String>,
    today_keys: HashSet<String>,
    today: NaiveDate,
}

impl SentLedger {
    /// Load the ledger from `dir`, creating the directory if needed.
    ///
    /// Unions the newest [`KEPT_PARTITIONS`] partition files and deletes the
    /// rest. Unreadable partitions are skipped with a warning.
    pub async fn load(dir: impl Into<PathBuf>, today: NaiveDate) -> Result<Self, BooklineError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut partitions = Self::list_partitions(&dir).await?;
        let stale = partitions.split_off(KEPT_PARTITIONS.min(partitions.len()));
        for name in &stale {
            if let Err(e) = tokio::fs::remove_file(dir.join(name)).await {
                warn!(partition = %name, error = %e, "failed to prune sent-ledger partition");
            }
        }

        let mut sent = HashSet::new();
        let mut today_keys = HashSet::new();
        let today_file = partition_name(today);
        for name in &partitions {
            let keys = Self::read_partition(&dir.join(name)).await;
            if *name == today_file {
                today_keys.extend(keys.iter().cloned());
            }
            sent.extend(keys);
        }
        debug!(
            partitions = partitions.len(),
            keys = sent.len(),
            "sent ledger loaded"
        );

        Ok(Self {
            dir,
            sent,
            today_keys,
            today,
        })
    }

    /// Whether `key` was already sent on any loaded day.
    pub fn contains(&self, key: &str) -> bool {
        self.sent.contains(key)
    }

    /// Number of keys known to the in-memory ledger.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    /// Record `key` as sent on `today` and persist immediately.
    ///
    /// Crossing a day boundary rolls the ledger over to a fresh partition;
    /// the previous day's file is left intact until pruning removes it.
    pub async fn commit(&mut self, key: &str, today: NaiveDate) -> Result<(), BooklineError> {
        if today != self.today {
            self.today_keys.clear();
            self.today = today;
        }
        self.sent.insert(key.to_string());
        self.today_keys.insert(key.to_string());

        self.persist_today().await?;
        self.prune().await;
        Ok(())
    }

    async fn persist_today(&self) -> Result<(), BooklineError> {
        let mut keys: Vec<&String> = self.today_keys.iter().collect();
        keys.sort_unstable();
        let data = serde_json::to_vec_pretty(&keys).map_err(|e| BooklineError::Storage {
            source: Box::new(e),
        })?;
        tokio::fs::write(self.dir.join(partition_name(self.today)), data).await?;
        Ok(())
    }

    async fn prune(&self) {
        match Self::list_partitions(&self.dir).await {
            Ok(partitions) => {
                for name in partitions.iter().skip(KEPT_PARTITIONS) {
                    if let Err(e) = tokio::fs::remove_file(self.dir.join(name)).await {
                        warn!(partition = %name, error = %e, "failed to prune sent-ledger partition");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to list sent-ledger partitions"),
        }
    }

    /// Partition file names under `dir`, newest first.
    async fn list_partitions(dir: &Path) -> Result<Vec<String>, BooklineError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(PARTITION_PREFIX) && name.ends_with(PARTITION_SUFFIX) {
                names.push(name);
            }
        }
        // YYYYMMDD in the name makes lexicographic order chronological.
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    async fn read_partition(path: &Path) -> Vec<String> {
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(keys) => keys,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable sent-ledger partition");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable sent-ledger partition");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn write_partition(dir: &Path, date: NaiveDate, keys: &[&str]) {
        let data = serde_json::to_vec(&keys).unwrap();
        tokio::fs::write(dir.join(partition_name(date)), data)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn commit_survives_reload() {
        let dir = tempdir().unwrap();
        let today = day(2026, 8, 20);

        let mut ledger = SentLedger::load(dir.path(), today).await.unwrap();
        assert!(!ledger.contains("123_before"));
        ledger.commit("123_before", today).await.unwrap();
        assert!(ledger.contains("123_before"));
        drop(ledger);

        let reloaded = SentLedger::load(dir.path(), today).await.unwrap();
        assert!(reloaded.contains("123_before"));
        assert!(dir.path().join("sent_tasks_20260820.json").exists());
    }

    #[tokio::test]
    async fn load_unions_newest_three_and_prunes_older() {
        let dir = tempdir().unwrap();
        let today = day(2026, 8, 20);
        for (offset, key) in [(0i64, "k0"), (1, "k1"), (2, "k2"), (3, "k3"), (4, "k4")] {
            let date = today - chrono::Duration::days(offset);
            write_partition(dir.path(), date, &[key]).await;
        }

        let ledger = SentLedger::load(dir.path(), today).await.unwrap();
        assert!(ledger.contains("k0"));
        assert!(ledger.contains("k1"));
        assert!(ledger.contains("k2"));
        assert!(!ledger.contains("k3"));
        assert!(!ledger.contains("k4"));

        assert!(dir.path().join(partition_name(today)).exists());
        assert!(!dir.path().join(partition_name(day(2026, 8, 17))).exists());
        assert!(!dir.path().join(partition_name(day(2026, 8, 16))).exists());
    }

    #[tokio::test]
    async fn rollover_writes_fresh_partition_per_day() {
        let dir = tempdir().unwrap();
        let monday = day(2026, 8, 17);
        let tuesday = day(2026, 8, 18);

        let mut ledger = SentLedger::load(dir.path(), monday).await.unwrap();
        ledger.commit("a_before", monday).await.unwrap();
        ledger.commit("b_after", tuesday).await.unwrap();

        // Both keys remain queryable in memory.
        assert!(ledger.contains("a_before"));
        assert!(ledger.contains("b_after"));

        // On disk each day holds only its own commits.
        let monday_keys = SentLedger::read_partition(&dir.path().join(partition_name(monday))).await;
        let tuesday_keys =
            SentLedger::read_partition(&dir.path().join(partition_name(tuesday))).await;
        assert_eq!(monday_keys, vec!["a_before".to_string()]);
        assert_eq!(tuesday_keys, vec!["b_after".to_string()]);
    }

    #[tokio::test]
    async fn commit_prunes_beyond_kept_partitions() {
        let dir = tempdir().unwrap();
        let start = day(2026, 8, 17);

        let mut ledger = SentLedger::load(dir.path(), start).await.unwrap();
        for offset in 0..4i64 {
            let date = start + chrono::Duration::days(offset);
            ledger.commit(&format!("k{offset}_before"), date).await.unwrap();
        }

        let partitions = SentLedger::list_partitions(dir.path()).await.unwrap();
        assert_eq!(partitions.len(), KEPT_PARTITIONS);
        assert!(!dir.path().join(partition_name(start)).exists());
    }

    #[tokio::test]
    async fn corrupt_partition_is_skipped() {
        let dir = tempdir().unwrap();
        let today = day(2026, 8, 20);
        tokio::fs::write(dir.path().join(partition_name(today)), b"{not json")
            .await
            .unwrap();

        let ledger = SentLedger::load(dir.path(), today).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn duplicate_commit_is_idempotent() {
        let dir = tempdir().unwrap();
        let today = day(2026, 8, 20);

        let mut ledger = SentLedger::load(dir.path(), today).await.unwrap();
        ledger.commit("x_after", today).await.unwrap();
        ledger.commit("x_after", today).await.unwrap();
        assert_eq!(ledger.len(), 1);

        let keys = SentLedger::read_partition(&dir.path().join(partition_name(today))).await;
        assert_eq!(keys, vec!["x_after".to_string()]);
    }
}
