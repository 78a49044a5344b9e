//! A Page — fixed-capacity, append-only, durable container of Writes.
//!
//! A page starts WRITABLE and transitions once to SEALED, either by an
//! append that reaches capacity or by an explicit seal on shutdown. The
//! durability contract is append-side: a Write's serialized bytes reach
//! the backing file and survive a durable_sync BEFORE the Write becomes
//! visible in memory, so every Write a reader can observe is already on
//! persistent storage.
//!
//! The backing file is a flat log (see [`crate::format`]): opened once
//! for append, never truncated, deleted only after the page has been
//! fully transported.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::durability::durable_sync;
use crate::error::{LimboError, LimboResult};
use crate::format::{scan_log, serialize_write};
use crate::write::Write;

/// What an append call did to the page.
///
/// The capacity-seal transition is reported here rather than happening as
/// a hidden side effect, so the buffer can react (rotate, signal the
/// transport condition) in the same call with no race window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The Write was persisted and appended; the page stays writable.
    Appended,
    /// The Write was persisted and appended, and it filled the page:
    /// the page is now sealed.
    AppendedAndSealed,
    /// The page is sealed; nothing was written.
    Refused,
}

/// A fixed-capacity, append-only sequence of Writes backed by one file.
///
/// Appends are serialized by the owning buffer; reads are safe at any
/// time from any thread — a reader sees each Write fully or not at all.
pub struct Page {
    /// In-memory log, insertion order = version order
    writes: RwLock<Vec<Write>>,
    /// Backing file, opened once for append
    file: Mutex<File>,
    /// Path of the backing file (its name encodes creation order)
    path: PathBuf,
    /// Maximum number of Writes before the page seals itself
    capacity: usize,
    /// One-way WRITABLE -> SEALED flag
    sealed: AtomicBool,
}

impl Page {
    /// Create a fresh writable page backed by a new file at `path`.
    pub fn create(path: PathBuf, capacity: usize) -> LimboResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LimboError::io(&path, "failed to create page file", &e))?;

        Ok(Self {
            writes: RwLock::new(Vec::with_capacity(capacity)),
            file: Mutex::new(file),
            path,
            capacity,
            sealed: AtomicBool::new(false),
        })
    }

    /// Re-adopt an existing page file as a SEALED page.
    ///
    /// Used when a buffer reopens a directory that still holds pages from
    /// a previous process. The file is scanned front to back; a torn or
    /// corrupt trailing record ends the scan without failing the adoption,
    /// since that is exactly what a crash mid-append leaves behind.
    pub fn adopt(path: PathBuf) -> LimboResult<Self> {
        let mut data = Vec::new();
        File::open(&path)
            .map_err(|e| LimboError::io(&path, "failed to open page file", &e))?
            .read_to_end(&mut data)
            .map_err(|e| LimboError::io(&path, "failed to read page file", &e))?;

        let writes = scan_log(&data, &path);

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| LimboError::io(&path, "failed to reopen page file", &e))?;

        let capacity = writes.len();
        Ok(Self {
            writes: RwLock::new(writes),
            file: Mutex::new(file),
            path,
            capacity,
            sealed: AtomicBool::new(true),
        })
    }

    /// Append a Write with durability-before-acknowledgement.
    ///
    /// Serializes the Write, appends it to the backing file, durable_syncs,
    /// and only then makes it visible in memory. If this append reaches
    /// capacity the page seals as part of the same call.
    ///
    /// Durability failures propagate; the in-memory log is never updated
    /// for a Write that did not reach persistent storage.
    pub fn append(&self, write: &Write) -> LimboResult<AppendOutcome> {
        if self.sealed.load(Ordering::Acquire) {
            return Ok(AppendOutcome::Refused);
        }

        let bytes = serialize_write(write)?;
        {
            use std::io::Write as _;
            let mut file = self.file.lock();
            file.write_all(&bytes)
                .map_err(|e| LimboError::io(&self.path, "page append failed", &e))?;
            durable_sync(&file)
                .map_err(|e| LimboError::io(&self.path, "page durable_sync failed", &e))?;
        }

        let full = {
            let mut writes = self.writes.write();
            writes.push(write.clone());
            writes.len() >= self.capacity
        };

        if full {
            self.sealed.store(true, Ordering::Release);
            Ok(AppendOutcome::AppendedAndSealed)
        } else {
            Ok(AppendOutcome::Appended)
        }
    }

    /// Force the page into the SEALED state regardless of capacity.
    ///
    /// Idempotent. Syncs the backing file so a partially filled page is
    /// fully durable before the seal becomes visible.
    pub fn seal(&self) -> LimboResult<()> {
        if self.sealed.load(Ordering::Acquire) {
            return Ok(());
        }
        {
            let file = self.file.lock();
            durable_sync(&file)
                .map_err(|e| LimboError::io(&self.path, "page seal sync failed", &e))?;
        }
        self.sealed.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Snapshot of the page's Writes in insertion order.
    ///
    /// Safe concurrently with an in-flight append: the snapshot contains
    /// every Write whose append already returned, never a torn one.
    pub fn writes(&self) -> Vec<Write> {
        self.writes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.writes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.read().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the backing file. Called by the buffer after every Write in
    /// this page has been accepted by the permanent store.
    pub(crate) fn delete_backing_file(&self) -> LimboResult<()> {
        std::fs::remove_file(&self.path)
            .map_err(|e| LimboError::io(&self.path, "failed to delete page file", &e))
    }
}

/// File name for the page with the given creation sequence.
/// Hex-padded so lexicographic order equals creation order.
pub(crate) fn page_file_name(sequence: u64) -> String {
    format!("page-{:016x}.limbo", sequence)
}

/// Parse a page file name back into its creation sequence.
pub(crate) fn parse_page_sequence(name: &str) -> Option<u64> {
    let hex = name.strip_prefix("page-")?.strip_suffix(".limbo")?;
    u64::from_str_radix(hex, 16).ok()
}

/// List page files under `dir`, sorted by creation sequence.
pub(crate) fn list_page_files(dir: &Path) -> LimboResult<Vec<(u64, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| LimboError::io(dir, "failed to read page directory", &e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LimboError::io(dir, "failed to read directory entry", &e))?;
        if let Some(name) = entry.file_name().to_str() {
            if let Some(sequence) = parse_page_sequence(name) {
                files.push((sequence, entry.path()));
            }
        }
    }
    files.sort_by_key(|(sequence, _)| *sequence);
    Ok(files)
}
