//! Durable, crash-safe storage of the daily position record.
//!
//! One JSON file per underlying and trading day:
//! `<root>/<UNDERLYING>/<YYYY-MM-DD>.json`. Every write goes to a temporary
//! file in the same directory, is synced, and then renamed over the target,
//! so a reader sees either the previous record or the new one in full.
//!
//! [`StateStore::commit`] is a compare-and-swap on the record status: it
//! holds a per-day lock file, re-reads the status on disk, and refuses to
//! write if another invocation moved the record first.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use theta_core::StrategyConfig;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::types::{PositionRecord, PositionStatus};

/// A lock file older than this is assumed to belong to a crashed writer.
const STALE_LOCK_AFTER: Duration = Duration::from_secs(60);

/// What lands on disk: the record plus the strategy parameters in force
/// when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub record: PositionRecord,
    pub config: StrategyConfig,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, underlying: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(underlying.to_uppercase())
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// The record for `date`, or a fresh `NOT_ENTERED` one if none exists.
    ///
    /// A file that cannot be parsed, or that parses into an inconsistent
    /// record, is an error and is left untouched on disk.
    pub fn load(&self, underlying: &str, date: NaiveDate) -> Result<PositionRecord, StoreError> {
        Ok(self
            .load_persisted(underlying, date)?
            .map_or_else(|| PositionRecord::new(underlying, date), |p| p.record))
    }

    pub fn load_persisted(
        &self,
        underlying: &str,
        date: NaiveDate,
    ) -> Result<Option<PersistedRecord>, StoreError> {
        read_record(&self.path_for(underlying, date), date)
    }

    /// Writes `record` if the status on disk is still `expected`.
    ///
    /// A missing file counts as `NOT_ENTERED`. Returns
    /// [`StoreError::Conflict`] without writing when the status differs.
    pub fn commit(
        &self,
        record: &PositionRecord,
        config: &StrategyConfig,
        expected: PositionStatus,
    ) -> Result<PersistedRecord, StoreError> {
        let path = self.path_for(&record.underlying, record.date);
        if let Err(reason) = record.validate() {
            return Err(StoreError::Invariant { path, reason });
        }

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let _lock = CommitLock::acquire(&path, record.date, expected)?;

        let found = read_record(&path, record.date)?
            .map_or(PositionStatus::NotEntered, |p| p.record.status);
        if found != expected {
            return Err(StoreError::Conflict {
                date: record.date,
                expected,
                found,
            });
        }

        let persisted = PersistedRecord {
            record: record.clone(),
            config: config.clone(),
            saved_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        write_atomic(&path, &bytes).map_err(|e| StoreError::io(&path, e))?;

        debug!(
            path = %path.display(),
            from = %expected,
            to = %record.status,
            "Committed position record"
        );
        Ok(persisted)
    }

    /// Every stored day for `underlying`, oldest first.
    pub fn history(&self, underlying: &str) -> Result<Vec<PersistedRecord>, StoreError> {
        let mut records = Vec::new();
        for (date, path) in self.stored_days(underlying)? {
            if let Some(persisted) = read_record(&path, date)? {
                records.push(persisted);
            }
        }
        Ok(records)
    }

    /// The most recent stored day strictly before `date`, if any.
    pub fn latest_before(
        &self,
        underlying: &str,
        date: NaiveDate,
    ) -> Result<Option<PersistedRecord>, StoreError> {
        let previous = self
            .stored_days(underlying)?
            .into_iter()
            .rev()
            .find(|(day, _)| *day < date);
        match previous {
            Some((day, path)) => read_record(&path, day),
            None => Ok(None),
        }
    }

    /// Dated record files for `underlying`, oldest first.
    fn stored_days(&self, underlying: &str) -> Result<Vec<(NaiveDate, PathBuf)>, StoreError> {
        let dir = self.root.join(underlying.to_uppercase());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut days = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let date = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok());
            match date {
                Some(date) => days.push((date, path)),
                None => warn!(path = %path.display(), "Ignoring unrecognized file in state directory"),
            }
        }

        days.sort_by_key(|(date, _)| *date);
        Ok(days)
    }
}

fn read_record(path: &Path, date: NaiveDate) -> Result<Option<PersistedRecord>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let persisted: PersistedRecord =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if persisted.record.date != date {
        return Err(StoreError::Invariant {
            path: path.to_path_buf(),
            reason: format!("file is for {date} but record says {}", persisted.record.date),
        });
    }
    persisted
        .record
        .validate()
        .map_err(|reason| StoreError::Invariant {
            path: path.to_path_buf(),
            reason,
        })?;

    Ok(Some(persisted))
}

/// Write-to-temp, fsync, rename. The temp file lives next to `path` so the
/// rename never crosses a filesystem.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
        return result;
    }

    // Make the rename itself durable.
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Exclusive per-day lock held for the read-compare-write of a commit.
///
/// The file holds a token naming its owner; only the owner removes it.
struct CommitLock {
    path: PathBuf,
    token: String,
}

impl CommitLock {
    fn acquire(
        record_path: &Path,
        date: NaiveDate,
        expected: PositionStatus,
    ) -> Result<Self, StoreError> {
        let mut lock_path = record_path.as_os_str().to_owned();
        lock_path.push(".lock");
        let path = PathBuf::from(lock_path);
        let token = unique_suffix();

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(token.as_bytes()) {
                        let _ = fs::remove_file(&path);
                        return Err(StoreError::io(&path, e));
                    }
                    return Ok(Self { path, token });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if !is_stale(&path) {
                        break;
                    }
                    if !break_stale_lock(&path).map_err(|e| StoreError::io(&path, e))? {
                        break;
                    }
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }

        // Someone else is mid-commit on this day.
        let found = read_record(record_path, date)?
            .map_or(PositionStatus::NotEntered, |p| p.record.status);
        Err(StoreError::Conflict {
            date,
            expected,
            found,
        })
    }
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        if fs::read(&self.path).is_ok_and(|owner| owner == self.token.as_bytes()) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Moves a stale lock out of the way. Returns false when the file at `path`
/// turned out to be a live lock, which is put back.
///
/// The rename takes whichever file is at `path` right now, so two writers
/// that both saw the same stale lock cannot both delete a fresh one.
fn break_stale_lock(path: &Path) -> io::Result<bool> {
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(".{}.stale", unique_suffix()));
    let aside = PathBuf::from(aside);

    match fs::rename(path, &aside) {
        Ok(()) => {}
        // Already cleared by another writer.
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    }

    if is_stale(&aside) {
        warn!(path = %path.display(), "Removed stale commit lock");
        fs::remove_file(&aside)?;
        return Ok(true);
    }

    // A fresh lock replaced the stale one before our rename.
    match fs::hard_link(&aside, path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }
    fs::remove_file(&aside)?;
    Ok(false)
}

fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    format!("{}-{nanos}", std::process::id())
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::spread_pnl;
    use crate::types::{ExitReason, SpreadEntry, SpreadExit};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    fn config() -> StrategyConfig {
        StrategyConfig::default()
    }

    fn make_entry() -> SpreadEntry {
        SpreadEntry {
            short_strike: dec!(19800),
            long_strike: dec!(19750),
            entry_credit: dec!(8),
            credit_ratio: dec!(0.16),
            entry_spot: dec!(20000),
            entry_time: Utc.with_ymd_and_hms(2026, 10, 20, 6, 0, 0).unwrap(),
            quantity: 150,
        }
    }

    fn open_record() -> PositionRecord {
        let mut record = PositionRecord::new("NIFTY", date());
        record.enter(make_entry()).unwrap();
        record
    }

    #[test]
    fn missing_file_loads_as_not_entered() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());

        let record = store.load("NIFTY", date()).unwrap();
        assert_eq!(record, PositionRecord::new("NIFTY", date()));
        assert!(store.load_persisted("NIFTY", date()).unwrap().is_none());
    }

    #[test]
    fn commit_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let record = open_record();

        store.commit(&record, &config(), PositionStatus::NotEntered).unwrap();

        let path = dir.path().join("NIFTY").join("2026-10-20.json");
        assert!(path.exists());
        assert_eq!(store.load("NIFTY", date()).unwrap(), record);
        let persisted = store.load_persisted("nifty", date()).unwrap().unwrap();
        assert_eq!(persisted.config, config());
    }

    #[test]
    fn commit_rejects_stale_expectation() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());

        // Two invocations both read NOT_ENTERED and both decide to enter.
        let first = open_record();
        let mut second = PositionRecord::new("NIFTY", date());
        second
            .enter(SpreadEntry {
                entry_credit: dec!(9),
                ..make_entry()
            })
            .unwrap();

        store.commit(&first, &config(), PositionStatus::NotEntered).unwrap();
        let err = store
            .commit(&second, &config(), PositionStatus::NotEntered)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: PositionStatus::NotEntered,
                found: PositionStatus::Open,
                ..
            }
        ));

        // The first entry survives untouched.
        assert_eq!(store.load("NIFTY", date()).unwrap(), first);
    }

    #[test]
    fn held_lock_reports_conflict() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let path = store.path_for("NIFTY", date());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(dir.path().join("NIFTY").join("2026-10-20.json.lock"), b"").unwrap();

        let err = store
            .commit(&open_record(), &config(), PositionStatus::NotEntered)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(!path.exists());
    }

    fn backdate(path: &Path, by: Duration) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let path = store.path_for("NIFTY", date());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let lock = dir.path().join("NIFTY").join("2026-10-20.json.lock");
        fs::write(&lock, b"crashed").unwrap();
        backdate(&lock, Duration::from_secs(120));

        store.commit(&open_record(), &config(), PositionStatus::NotEntered).unwrap();
        assert_eq!(store.load("NIFTY", date()).unwrap().status, PositionStatus::Open);
        assert!(!lock.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("NIFTY"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "{leftovers:?}");
    }

    #[test]
    fn breaking_a_lock_that_was_just_renewed_puts_it_back() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("2026-10-20.json.lock");

        // A writer saw a stale lock, but another writer replaced it with a
        // fresh one before this rename.
        fs::write(&lock, b"live-owner").unwrap();
        assert!(!break_stale_lock(&lock).unwrap());
        assert_eq!(fs::read(&lock).unwrap(), b"live-owner");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        backdate(&lock, Duration::from_secs(120));
        assert!(break_stale_lock(&lock).unwrap());
        assert!(!lock.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn dropping_a_lock_leaves_another_owners_file() {
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join("2026-10-20.json");
        let lock = dir.path().join("2026-10-20.json.lock");

        let held = CommitLock::acquire(&record_path, date(), PositionStatus::NotEntered).unwrap();
        assert!(lock.exists());
        fs::write(&lock, b"someone-else").unwrap();
        drop(held);
        assert_eq!(fs::read(&lock).unwrap(), b"someone-else");

        fs::remove_file(&lock).unwrap();
        let held = CommitLock::acquire(&record_path, date(), PositionStatus::NotEntered).unwrap();
        drop(held);
        assert!(!lock.exists());
    }

    #[test]
    fn commit_refuses_invalid_record() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let mut record = PositionRecord::new("NIFTY", date());
        record.status = PositionStatus::Open;

        let err = store
            .commit(&record, &config(), PositionStatus::NotEntered)
            .unwrap_err();
        assert!(matches!(err, StoreError::Invariant { .. }));
        assert!(!store.path_for("NIFTY", date()).exists());
    }

    #[test]
    fn corrupt_file_is_an_error_and_left_in_place() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let path = store.path_for("NIFTY", date());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{\"record\": {\"status\": \"OP").unwrap();

        let err = store.load("NIFTY", date()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"{\"record\": {\"status\": \"OP");
    }

    #[test]
    fn inconsistent_file_is_an_invariant_error() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        store
            .commit(&open_record(), &config(), PositionStatus::NotEntered)
            .unwrap();

        // Hand-edit the file into an OPEN record with no entry.
        let path = store.path_for("NIFTY", date());
        let mut json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        json["record"]["entry"] = serde_json::Value::Null;
        fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = store.load("NIFTY", date()).unwrap_err();
        assert!(matches!(err, StoreError::Invariant { .. }));
    }

    #[test]
    fn interrupted_write_leaves_previous_record_whole() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let before = PositionRecord::new("NIFTY", date());

        // Establish a NOT_ENTERED file, then simulate a crash half way
        // through writing the OPEN record: only the temp file has bytes.
        fs::create_dir_all(dir.path().join("NIFTY")).unwrap();
        let path = store.path_for("NIFTY", date());
        let bytes = serde_json::to_vec_pretty(&PersistedRecord {
            record: before.clone(),
            config: config(),
            saved_at: Utc::now(),
        })
        .unwrap();
        write_atomic(&path, &bytes).unwrap();

        let open = serde_json::to_vec_pretty(&PersistedRecord {
            record: open_record(),
            config: config(),
            saved_at: Utc::now(),
        })
        .unwrap();
        let torn = dir.path().join("NIFTY").join(".2026-10-20.json.999.tmp");
        fs::write(&torn, &open[..open.len() / 2]).unwrap();

        // Restart: the record is fully NOT_ENTERED, not a mix.
        let loaded = store.load("NIFTY", date()).unwrap();
        assert_eq!(loaded, before);
        assert!(loaded.entry.is_none());
        assert_eq!(store.history("NIFTY").unwrap().len(), 1);

        // The next commit goes through and is read back in full.
        store.commit(&open_record(), &config(), PositionStatus::NotEntered).unwrap();
        let loaded = store.load("NIFTY", date()).unwrap();
        assert_eq!(loaded.status, PositionStatus::Open);
        assert_eq!(loaded.entry, Some(make_entry()));
    }

    #[test]
    fn history_is_sorted_and_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let later = NaiveDate::from_ymd_opt(2026, 10, 27).unwrap();

        let mut closed = PositionRecord::new("NIFTY", later);
        let entry = SpreadEntry {
            entry_time: Utc.with_ymd_and_hms(2026, 10, 27, 6, 0, 0).unwrap(),
            ..make_entry()
        };
        closed.enter(entry).unwrap();
        closed
            .close(SpreadExit {
                exit_credit: dec!(3),
                exit_spot: None,
                exit_time: Utc.with_ymd_and_hms(2026, 10, 27, 9, 55, 0).unwrap(),
                reason: ExitReason::EndOfDay,
                realized_pnl: spread_pnl(dec!(8), dec!(3), 150, dec!(50)),
            })
            .unwrap();
        store.commit(&closed, &config(), PositionStatus::Open).unwrap_err();
        store.commit(&closed, &config(), PositionStatus::NotEntered).unwrap();
        store.commit(&open_record(), &config(), PositionStatus::NotEntered).unwrap();
        fs::write(dir.path().join("NIFTY").join("notes.txt"), b"hello").unwrap();

        let history = store.history("NIFTY").unwrap();
        let dates: Vec<_> = history.iter().map(|p| p.record.date).collect();
        assert_eq!(dates, vec![date(), later]);
        assert_eq!(history[1].record.realized_pnl(), Some(dec!(750)));
        assert!(store.history("BANKNIFTY").unwrap().is_empty());
    }

    #[test]
    fn latest_before_finds_the_previous_stored_day() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let next_week = NaiveDate::from_ymd_opt(2026, 10, 27).unwrap();

        assert!(store.latest_before("NIFTY", next_week).unwrap().is_none());

        store.commit(&open_record(), &config(), PositionStatus::NotEntered).unwrap();
        let mut later = PositionRecord::new("NIFTY", next_week);
        later.skip(Utc::now(), "quiet day").unwrap();
        store.commit(&later, &config(), PositionStatus::NotEntered).unwrap();

        let previous = store.latest_before("NIFTY", next_week).unwrap().unwrap();
        assert_eq!(previous.record.date, date());
        assert_eq!(previous.record.status, PositionStatus::Open);
        let after = NaiveDate::from_ymd_opt(2026, 11, 3).unwrap();
        assert_eq!(store.latest_before("NIFTY", after).unwrap().unwrap().record.date, next_week);
        assert!(store.latest_before("NIFTY", date()).unwrap().is_none());
    }
}
