//! The Buffer — the durable staging store.
//!
//! A Buffer is an ordered chain of Pages, oldest first. At most one page
//! is writable and it is always the newest; every other page is sealed
//! and waits, in strict order, to be transported into the permanent
//! store.
//!
//! **Write path**: `insert` appends to the active page (durably, before
//! acknowledging); an append that fills the page rotates in a fresh one
//! and signals the transport condition.
//! **Read path**: `select` and `iter` take a snapshot of the page chain
//! and read each page independently, so they never block writers and
//! never observe a torn or half-rotated state.
//! **Drain path**: one background thread loops
//! `wait_until_transportable` / `transport`, moving the oldest sealed
//! page's Writes into the destination one at a time.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::error::{LimboError, LimboResult};
use crate::limbo::{Limbo, Writes};
use crate::page::{page_file_name, list_page_files, AppendOutcome, Page};
use crate::permanent::PermanentStore;
use crate::throttle::TransportThrottle;
use crate::write::{Value, Write};

/// Durable staging buffer for Writes on their way to the permanent store.
///
/// All public methods take `&self`; the Buffer is meant to be shared
/// (typically in an `Arc`) between writer threads, reader threads, and
/// exactly one transport thread.
pub struct Buffer {
    /// Page chain, oldest first; the last element is the active page.
    /// The lock is held only for queue surgery and snapshots, never
    /// across file or destination I/O.
    pages: Mutex<VecDeque<Arc<Page>>>,
    /// Signaled on every page seal and on stop
    transportable: Condvar,
    /// Serializes writers (and stop) across the full append, so insertion
    /// order equals version order and rotation stays atomic
    write_gate: Mutex<()>,
    /// Forbids two concurrent transports; a second caller blocks
    transport_gate: Mutex<()>,
    /// Pacing gate consulted by can_transport
    throttle: TransportThrottle,
    stopped: AtomicBool,
    /// Backing-storage directory holding one file per page
    dir: PathBuf,
    /// Creation sequence for the next page file
    next_sequence: AtomicU64,
    page_capacity: usize,
}

impl Buffer {
    /// Open a Buffer over `dir`, creating the directory if needed.
    ///
    /// Page files left behind by a previous process are re-adopted as
    /// sealed pages, oldest first, so in-flight Writes from before a
    /// crash or shutdown are transported rather than orphaned; file
    /// numbering resumes past them. Empty leftover files (created but
    /// never written) are removed.
    pub fn open<P: AsRef<Path>>(dir: P, config: Config) -> LimboResult<Self> {
        config
            .validate()
            .map_err(|message| LimboError::InvalidConfig { message })?;

        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| LimboError::io(&dir, "failed to create page directory", &e))?;

        let mut pages = VecDeque::new();
        let mut max_sequence = 0u64;
        for (sequence, path) in list_page_files(&dir)? {
            max_sequence = max_sequence.max(sequence);
            let page = Page::adopt(path)?;
            if page.is_empty() {
                tracing::warn!(
                    path = %page.path().display(),
                    "removing empty leftover page file"
                );
                page.delete_backing_file()?;
                continue;
            }
            pages.push_back(Arc::new(page));
        }
        if !pages.is_empty() {
            tracing::info!(
                pages = pages.len(),
                dir = %dir.display(),
                "re-adopted sealed pages from a previous run"
            );
        }

        let next_sequence = AtomicU64::new(max_sequence + 1);
        let sequence = next_sequence.fetch_add(1, Ordering::Relaxed);
        let active = Page::create(dir.join(page_file_name(sequence)), config.page_capacity)?;
        pages.push_back(Arc::new(active));

        Ok(Self {
            pages: Mutex::new(pages),
            transportable: Condvar::new(),
            write_gate: Mutex::new(()),
            transport_gate: Mutex::new(()),
            throttle: TransportThrottle::new(
                config.transport_pause,
                config.transport_rate_multiplier,
            ),
            stopped: AtomicBool::new(false),
            dir,
            next_sequence,
            page_capacity: config.page_capacity,
        })
    }

    /// Stage one Write.
    ///
    /// Never blocks on transport or on readers; only other writers (and
    /// `stop`) are serialized with this call. When callers construct
    /// Writes themselves they must do so under their own serialization if
    /// they need version order to equal arrival order across threads —
    /// or use [`Buffer::add`] / [`Buffer::remove`], which construct under
    /// the write gate.
    pub fn insert(&self, write: Write) -> LimboResult<()> {
        let _gate = self.write_gate.lock();
        self.stage(write)
    }

    /// Construct and stage an Add write in one gated step.
    pub fn add(&self, key: &str, value: Value, record: u64) -> LimboResult<()> {
        let _gate = self.write_gate.lock();
        self.stage(Write::add(key, value, record))
    }

    /// Construct and stage a Remove write in one gated step.
    pub fn remove(&self, key: &str, value: Value, record: u64) -> LimboResult<()> {
        let _gate = self.write_gate.lock();
        self.stage(Write::remove(key, value, record))
    }

    /// Append under the write gate, rotating if the append sealed the page.
    fn stage(&self, write: Write) -> LimboResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(LimboError::BufferStopped);
        }

        let active = match self.pages.lock().back() {
            Some(page) => Arc::clone(page),
            None => return Err(LimboError::BufferStopped),
        };

        match active.append(&write)? {
            AppendOutcome::Appended => Ok(()),
            AppendOutcome::AppendedAndSealed => self.rotate(),
            // Unreachable while the write gate serializes stage() and
            // stop(), but refusal must never be silent.
            AppendOutcome::Refused => Err(LimboError::PageSealed {
                path: active.path().to_path_buf(),
            }),
        }
    }

    /// Allocate a fresh active page and signal the transport condition,
    /// since a sealed page now sits behind it.
    fn rotate(&self) -> LimboResult<()> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let page = Page::create(self.dir.join(page_file_name(sequence)), self.page_capacity)?;
        {
            let mut pages = self.pages.lock();
            pages.push_back(Arc::new(page));
        }
        self.transportable.notify_all();
        tracing::debug!(sequence, "sealed active page, rotated in a new one");
        Ok(())
    }

    /// Net value set for `(key, record)`: ADDs and REMOVEs folded in
    /// version order across sealed pages (oldest first) then the active
    /// page. Empty buffer yields an empty set.
    pub fn select(&self, key: &str, record: u64) -> HashSet<Value> {
        let mut values = HashSet::new();
        for page in self.snapshot() {
            for write in page.writes() {
                if write.key() == key && write.record() == record {
                    if write.is_add() {
                        values.insert(write.value().clone());
                    } else {
                        values.remove(write.value());
                    }
                }
            }
        }
        values
    }

    /// Lazy one-shot iterator over all staged Writes in version order.
    ///
    /// The page chain is snapshotted here; inserts, rotations and
    /// transports that happen afterwards cannot disturb the iteration.
    pub fn iter(&self) -> Writes {
        Writes::over(self.snapshot())
    }

    /// True iff a sealed page exists behind the active one and the
    /// throttle admits another transport. The active page is never a
    /// transport candidate, so a single-page buffer is never
    /// transportable.
    pub fn can_transport(&self) -> bool {
        let has_sealed = self.pages.lock().len() > 1;
        has_sealed && self.throttle.permits()
    }

    /// Drain the oldest sealed page into `destination`.
    ///
    /// Precondition: [`Buffer::can_transport`] — calling without it is a
    /// `TransportNotReady` error, never a silent no-op. Writes are
    /// delivered one at a time in insertion order. The page is removed
    /// from the chain and its backing file deleted only after every
    /// Write has been accepted; if the destination fails partway the
    /// page is retained in full for retry and the error surfaces here.
    ///
    /// A second transport while one is in flight blocks on the internal
    /// transport gate; the queue pop below relies on that exclusivity.
    pub fn transport(&self, destination: &dyn PermanentStore) -> LimboResult<usize> {
        let _gate = self.transport_gate.lock();

        if !self.can_transport() {
            return Err(LimboError::TransportNotReady);
        }
        let page = {
            let pages = self.pages.lock();
            match pages.front() {
                Some(page) if pages.len() > 1 => Arc::clone(page),
                _ => return Err(LimboError::TransportNotReady),
            }
        };

        // No lock held across accept: the destination may block at will
        let writes = page.writes();
        for write in &writes {
            destination.accept(write)?;
        }

        {
            let mut pages = self.pages.lock();
            let popped = pages.pop_front();
            debug_assert!(matches!(&popped, Some(p) if Arc::ptr_eq(p, &page)));
        }
        self.throttle.record_transport();
        page.delete_backing_file()?;

        tracing::debug!(
            count = writes.len(),
            page = %page.path().display(),
            "transported page into the permanent store"
        );
        Ok(writes.len())
    }

    /// Block until `can_transport` would return true, or until `stop`.
    ///
    /// Wakes on every page-seal event and on stop; while only the
    /// throttle is closed the wait is bounded by the gate's remaining
    /// pause, so expiry needs no signal. Callers must re-check
    /// `can_transport` — wakeups may be spurious.
    pub fn wait_until_transportable(&self) {
        let mut pages = self.pages.lock();
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return;
            }
            if pages.len() > 1 {
                match self.throttle.until_ready() {
                    None => return,
                    Some(remaining) => {
                        let _ = self.transportable.wait_for(&mut pages, remaining);
                    }
                }
            } else {
                self.transportable.wait(&mut pages);
            }
        }
    }

    /// Seal the active page — durably flushing any partial content — and
    /// refuse all further inserts. Wakes any thread blocked in
    /// `wait_until_transportable`. Idempotent. Already-sealed pages
    /// remain transportable after stop.
    pub fn stop(&self) -> LimboResult<()> {
        let _gate = self.write_gate.lock();
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let active = self.pages.lock().back().cloned();
        if let Some(page) = active {
            page.seal()?;
        }
        self.transportable.notify_all();
        tracing::debug!(dir = %self.dir.display(), "buffer stopped, active page sealed");
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Total number of staged Writes across all pages.
    pub fn len(&self) -> usize {
        self.snapshot().iter().map(|page| page.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pages in the chain, including the active one.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    /// Backing-storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot(&self) -> Vec<Arc<Page>> {
        self.pages.lock().iter().cloned().collect()
    }
}

impl Limbo for Buffer {
    fn insert(&self, write: Write) -> LimboResult<()> {
        Buffer::insert(self, write)
    }

    fn select(&self, key: &str, record: u64) -> HashSet<Value> {
        Buffer::select(self, key, record)
    }

    fn iter(&self) -> Writes {
        Buffer::iter(self)
    }

    fn can_transport(&self) -> bool {
        Buffer::can_transport(self)
    }

    fn transport(&self, destination: &dyn PermanentStore) -> LimboResult<usize> {
        Buffer::transport(self, destination)
    }

    fn wait_until_transportable(&self) {
        Buffer::wait_until_transportable(self)
    }

    fn stop(&self) -> LimboResult<()> {
        Buffer::stop(self)
    }
}

impl<'a> IntoIterator for &'a Buffer {
    type Item = Write;
    type IntoIter = Writes;

    fn into_iter(self) -> Writes {
        self.iter()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(%err, "failed to seal active page while dropping buffer");
        }
    }
}
