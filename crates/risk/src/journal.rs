//! Day-partitioned trade journal.
//!
//! Layout under the data directory:
//!
//! - `trades_YYYYMMDD.jsonl`: one JSON [`TradeRecord`] per line, append-only
//! - `stats_YYYYMMDD.json`: the day's [`DailyState`], rewritten via temp file + rename
//! - `journal.lock`: held for the lifetime of a [`TradeJournal`]
//!
//! Days are exchange-local. Missing files read as empty; corrupt snapshots
//! and corrupt journal lines are logged and skipped.

use chrono::{Duration, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use tradegate_core::{TradeRecord, TradingCalendar};

use crate::error::JournalError;
use crate::state::DailyState;

const LOCK_FILE: &str = "journal.lock";

/// Lockfile held while a journal is open; removed on drop.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(path: PathBuf) -> Result<Self, JournalError> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(JournalError::Locked { path }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove journal lock");
        }
    }
}

/// Single-writer handle on a journal directory.
#[derive(Debug)]
pub struct TradeJournal {
    dir: PathBuf,
    _lock: LockGuard,
}

impl TradeJournal {
    /// Opens (creating if needed) the journal directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Locked`] if another journal holds the directory,
    /// or an IO error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, JournalError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let lock = LockGuard::acquire(dir.join(LOCK_FILE))?;
        info!(dir = %dir.display(), "Trade journal opened");
        Ok(Self { dir, _lock: lock })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn trades_path(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("trades_{}.jsonl", day.format("%Y%m%d")))
    }

    #[must_use]
    pub fn stats_path(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("stats_{}.json", day.format("%Y%m%d")))
    }

    /// Appends a record to its day's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn append(&self, record: &TradeRecord) -> Result<(), JournalError> {
        let day = TradingCalendar::trading_day(record.timestamp);
        let path = self.trades_path(day);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        debug!(path = %path.display(), code = %record.stock_code, "Trade appended");
        Ok(())
    }

    /// Reads one day's records. A missing file yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load_day(&self, day: NaiveDate) -> Result<Vec<TradeRecord>, JournalError> {
        let path = self.trades_path(day);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TradeRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping corrupt journal line"
                ),
            }
        }
        Ok(records)
    }

    /// Reads `days` days ending at `last_day` (inclusive), oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if any existing day file cannot be read.
    pub fn load_range(&self, last_day: NaiveDate, days: i64) -> Result<Vec<TradeRecord>, JournalError> {
        let mut records = Vec::new();
        for offset in (0..days.max(1)).rev() {
            records.extend(self.load_day(last_day - Duration::days(offset))?);
        }
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    /// Atomically rewrites the day snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed.
    pub fn save_snapshot(&self, state: &DailyState) -> Result<(), JournalError> {
        let path = self.stats_path(state.date);
        let tmp = path.with_extension("json.tmp");

        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, state)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(
            path = %path.display(),
            trades = state.daily_trade_count,
            breaker = state.circuit_breaker_active,
            "Saved daily snapshot"
        );
        Ok(())
    }

    /// Loads the snapshot for `day`, or `None` if it is missing, corrupt or
    /// belongs to another day.
    #[must_use]
    pub fn load_snapshot(&self, day: NaiveDate) -> Option<DailyState> {
        let path = self.stats_path(day);
        if !path.exists() {
            return None;
        }

        let parsed = File::open(&path)
            .map_err(JournalError::from)
            .and_then(|f| serde_json::from_reader::<_, DailyState>(BufReader::new(f)).map_err(JournalError::from));

        match parsed {
            Ok(state) if state.date == day => {
                info!(
                    date = %day,
                    trades = state.daily_trade_count,
                    buys = state.daily_buy_count,
                    profit_loss = %state.daily_profit_loss,
                    "Loaded daily snapshot"
                );
                Some(state)
            }
            Ok(state) => {
                warn!(path = %path.display(), found = %state.date, "Snapshot date mismatch, ignoring");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load daily snapshot, starting fresh");
                None
            }
        }
    }
}
