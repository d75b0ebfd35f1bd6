//! 绑定诊断
//!
//! 按错误代码计数，记录无符号溢出事件，并保留最近若干条记录，
//! 可以连同缓存统计一起快照并持久化到文件。

pub mod file;

use crate::bindings::PropertyIdentity;
use crate::cache::CacheStats;
use crate::core::deferred::DeferredFailure;
use crate::core::error::{BindingError, BridgeResult};
use crate::core::utils::current_timestamp_ms;
use file::{CreateIfNonExistent, IsCachedHandle, OpenFor, OverwriteExistingFile};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_RECENT: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub code: String,
    pub identity: Option<PropertyIdentity>,
    pub message: String,
    /// Unix milliseconds.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub taken_at: u64,
    pub error_counts: BTreeMap<String, u64>,
    pub overflow_events: u64,
    pub frame_failures: u64,
    pub recent: Vec<DiagnosticRecord>,
    pub cache: CacheStats,
}

pub struct BindingDiagnostics {
    max_recent: usize,
    error_counts: RefCell<BTreeMap<&'static str, u64>>,
    overflow_events: Cell<u64>,
    frame_failures: Cell<u64>,
    recent: RefCell<VecDeque<DiagnosticRecord>>,
}

impl Default for BindingDiagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECENT)
    }
}

impl BindingDiagnostics {
    pub fn new(max_recent: usize) -> Self {
        Self {
            max_recent: max_recent.max(1),
            error_counts: RefCell::new(BTreeMap::new()),
            overflow_events: Cell::new(0),
            frame_failures: Cell::new(0),
            recent: RefCell::new(VecDeque::new()),
        }
    }

    fn push(&self, record: DiagnosticRecord) {
        let mut recent = self.recent.borrow_mut();
        while recent.len() >= self.max_recent {
            recent.pop_front();
        }
        recent.push_back(record);
    }

    fn bump(&self, code: &'static str) {
        *self.error_counts.borrow_mut().entry(code).or_insert(0) += 1;
    }

    pub fn record_error(&self, err: &BindingError) {
        self.bump(err.code());
        self.push(DiagnosticRecord {
            code: err.code().to_string(),
            identity: err.identity(),
            message: err.to_string(),
            timestamp: current_timestamp_ms(),
        });
    }

    /// A 64-bit unsigned value did not fit a script integer.
    pub fn record_overflow(&self, identity: PropertyIdentity, value: i128) {
        self.overflow_events.set(self.overflow_events.get() + 1);
        tracing::debug!(target: "bindings", %identity, value = %value, "Unsigned value exceeds script integer range");
        self.push(DiagnosticRecord {
            code: "UnsignedOverflow".to_string(),
            identity: Some(identity),
            message: format!("{value} exceeds the script integer range"),
            timestamp: current_timestamp_ms(),
        });
    }

    pub fn record_frame_failure(&self, failure: &DeferredFailure) {
        self.frame_failures.set(self.frame_failures.get() + 1);
        let identity = failure.error.binding_error().and_then(BindingError::identity);
        self.push(DiagnosticRecord {
            code: "FrameFailure".to_string(),
            identity,
            message: failure.to_string(),
            timestamp: current_timestamp_ms(),
        });
    }

    pub fn error_count(&self, code: &str) -> u64 {
        self.error_counts.borrow().get(code).copied().unwrap_or(0)
    }

    pub fn overflow_events(&self) -> u64 {
        self.overflow_events.get()
    }

    pub fn frame_failures(&self) -> u64 {
        self.frame_failures.get()
    }

    pub fn recent(&self) -> Vec<DiagnosticRecord> {
        self.recent.borrow().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.error_counts.borrow_mut().clear();
        self.overflow_events.set(0);
        self.frame_failures.set(0);
        self.recent.borrow_mut().clear();
    }

    pub fn snapshot(&self, cache: CacheStats) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            taken_at: current_timestamp_ms(),
            error_counts: self
                .error_counts
                .borrow()
                .iter()
                .map(|(code, count)| (code.to_string(), *count))
                .collect(),
            overflow_events: self.overflow_events.get(),
            frame_failures: self.frame_failures.get(),
            recent: self.recent(),
            cache,
        }
    }
}

/// File mode used when persisting snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOptions {
    pub open_for: OpenFor,
    pub overwrite: OverwriteExistingFile,
    pub create: CreateIfNonExistent,
    pub cached: IsCachedHandle,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            open_for: OpenFor::Writing,
            overwrite: OverwriteExistingFile::Yes,
            create: CreateIfNonExistent::Yes,
            cached: IsCachedHandle::No,
        }
    }
}

impl PersistOptions {
    /// One JSON line per snapshot, keeping the file open between writes.
    pub fn append_log() -> Self {
        Self {
            open_for: OpenFor::Appending,
            overwrite: OverwriteExistingFile::No,
            create: CreateIfNonExistent::Yes,
            cached: IsCachedHandle::Yes,
        }
    }
}

/// Writes snapshots to a file.
///
/// `Writing` replaces the file with one pretty JSON document; `Appending`
/// adds one compact JSON line per snapshot.
pub struct DiagnosticsSink {
    path: PathBuf,
    options: PersistOptions,
    handle: RefCell<Option<File>>,
}

impl DiagnosticsSink {
    pub fn new(path: impl AsRef<Path>, options: PersistOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
            handle: RefCell::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn persist(&self, snapshot: &DiagnosticsSnapshot) -> BridgeResult<()> {
        let payload = match self.options.open_for {
            OpenFor::Reading => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "diagnostics cannot be persisted through a read-only handle",
                )
                .into())
            }
            OpenFor::Writing => serde_json::to_vec_pretty(snapshot)?,
            OpenFor::Appending => {
                let mut line = serde_json::to_vec(snapshot)?;
                line.push(b'\n');
                line
            }
        };

        let mut cached = self.handle.borrow_mut();
        let mut file = match cached.take() {
            Some(file) => file,
            None => file::open(
                &self.path,
                self.options.open_for,
                self.options.overwrite,
                self.options.create,
            )?,
        };
        if self.options.open_for == OpenFor::Writing {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
        }
        file.write_all(&payload)?;
        file.flush()?;
        tracing::debug!(target: "diagnostics", path = %self.path.display(), bytes = payload.len(), "Persisted diagnostics");

        if self.options.cached == IsCachedHandle::Yes {
            *cached = Some(file);
        }
        Ok(())
    }
}
