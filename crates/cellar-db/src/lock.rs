//! # Store Locks
//!
//! One writer at a time, many readers, and a stop-the-world mode for
//! snapshot restore.
//!
//! ## Lock Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         StoreLocks                                      │
//! │                                                                         │
//! │   writer: Mutex<()>        gate: RwLock<()>                             │
//! │                                                                         │
//! │   read()       ─────────────────────►  gate (shared)                    │
//! │   write()      writer ──────────────►  gate (shared)                    │
//! │   exclusive()  writer ──────────────►  gate (exclusive)                 │
//! │                                                                         │
//! │   Lock order is always writer → gate.                                   │
//! │                                                                         │
//! │   • Two sales never interleave their read-decide-write sequence         │
//! │   • Reports run beside a sale                                           │
//! │   • A restore waits for every reader and blocks everyone                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guards only coordinate this process. SQLite's own locking still
//! protects the file against other processes.

use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store-wide coordination shared by every repository of one [`crate::Database`].
#[derive(Debug, Default)]
pub struct StoreLocks {
    writer: Mutex<()>,
    gate: RwLock<()>,
}

/// Held by readers.
#[derive(Debug)]
pub struct ReadGuard<'a> {
    _gate: RwLockReadGuard<'a, ()>,
}

/// Held by the single mutating operation.
#[derive(Debug)]
pub struct WriteGuard<'a> {
    // Field order is drop order: the gate goes before the writer.
    _gate: RwLockReadGuard<'a, ()>,
    _writer: MutexGuard<'a, ()>,
}

/// Held while the whole store is being replaced.
#[derive(Debug)]
pub struct ExclusiveGuard<'a> {
    _gate: RwLockWriteGuard<'a, ()>,
    _writer: MutexGuard<'a, ()>,
}

impl StoreLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access for queries.
    pub async fn read(&self) -> ReadGuard<'_> {
        ReadGuard {
            _gate: self.gate.read().await,
        }
    }

    /// The writer slot plus shared gate access.
    pub async fn write(&self) -> WriteGuard<'_> {
        let writer = self.writer.lock().await;
        let gate = self.gate.read().await;
        WriteGuard {
            _gate: gate,
            _writer: writer,
        }
    }

    /// The writer slot plus the gate exclusively.
    pub async fn exclusive(&self) -> ExclusiveGuard<'_> {
        let writer = self.writer.lock().await;
        let gate = self.gate.write().await;
        ExclusiveGuard {
            _gate: gate,
            _writer: writer,
        }
    }
}
