//! Bounded log of recent store requests
//!
//! Once `max` entries are held, further requests are dropped from the buffer
//! (oldest entries are not evicted), while the running count and total time
//! keep accumulating. Draining never resets the counters.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One recorded request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    /// `METHOD url`
    pub query: String,
    /// Query parameters or JSON body sent with the request
    pub params: String,
    /// Wall-clock milliseconds spent in the transport
    pub took_ms: u64,
    /// Composed error description, empty on success
    pub error: String,
    /// When the request completed
    pub at: DateTime<Utc>,
}

/// Snapshot returned by [`QueryLog::drain`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogReport {
    /// Buffered entries
    pub entries: Vec<QueryLogEntry>,
    /// Requests recorded since creation
    pub count: u64,
    /// Total milliseconds across all recorded requests
    pub total_time_ms: u64,
}

#[derive(Debug, Default)]
struct LogState {
    max: usize,
    entries: Vec<QueryLogEntry>,
    count: u64,
    total_time_ms: u64,
}

/// Thread-safe bounded query log
#[derive(Debug)]
pub struct QueryLog {
    state: Mutex<LogState>,
}

impl QueryLog {
    /// Log holding at most `max` entries
    pub fn new(max: usize) -> Self {
        Self {
            state: Mutex::new(LogState {
                max,
                ..LogState::default()
            }),
        }
    }

    /// Entry bound
    pub fn max(&self) -> usize {
        self.state.lock().max
    }

    /// Change the entry bound. Entries already held beyond a smaller bound
    /// are kept; new ones are dropped until the buffer is drained below it.
    pub fn set_max(&self, max: usize) {
        self.state.lock().max = max;
    }

    /// Record one request.
    pub fn record(&self, method: &str, url: &str, params: &str, took_ms: u64, error: &str) {
        let mut state = self.state.lock();
        state.count += 1;
        state.total_time_ms += took_ms;
        if state.entries.len() >= state.max {
            return;
        }
        state.entries.push(QueryLogEntry {
            query: format!("{} {}", method, url),
            params: params.to_string(),
            took_ms,
            error: error.to_string(),
            at: Utc::now(),
        });
    }

    /// Read the log, optionally sorted slowest-first, optionally clearing the
    /// buffered entries.
    pub fn drain(&self, sorted: bool, clear: bool) -> QueryLogReport {
        let mut state = self.state.lock();
        let mut entries = if clear {
            std::mem::take(&mut state.entries)
        } else {
            state.entries.clone()
        };
        if sorted {
            entries.sort_by(|a, b| b.took_ms.cmp(&a.took_ms));
        }
        QueryLogReport {
            entries,
            count: state.count,
            total_time_ms: state.total_time_ms,
        }
    }

    /// Number of buffered entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True if no entries are buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
