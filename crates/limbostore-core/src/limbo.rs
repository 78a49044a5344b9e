//! The Limbo contract — the staging-store capability.
//!
//! Limbo is where Writes wait between acknowledgement and their ordered
//! migration into the permanent store. The contract is deliberately
//! narrow: absorb writes, answer reads over what is still staged, and
//! drain oldest-first when asked.

use std::sync::Arc;

use hashbrown::HashSet;

use crate::error::LimboResult;
use crate::page::Page;
use crate::permanent::PermanentStore;
use crate::write::{Value, Write};

/// The staging-store contract implemented by [`crate::Buffer`].
pub trait Limbo {
    /// Stage one Write. Fails with `BufferStopped` after `stop`.
    fn insert(&self, write: Write) -> LimboResult<()>;

    /// Net value set for `(key, record)` as of now: every staged ADD and
    /// REMOVE for those coordinates folded in version order. Empty when
    /// nothing is staged.
    fn select(&self, key: &str, record: u64) -> HashSet<Value>;

    /// Lazy one-shot iterator over all staged Writes, oldest page first,
    /// in version order. The sequence is a snapshot: inserts, rotations
    /// and transports that happen after this call never disturb it.
    fn iter(&self) -> Writes;

    /// True iff a sealed page exists behind the active one and the
    /// throttle admits another transport.
    fn can_transport(&self) -> bool;

    /// Drain the single oldest sealed page into `destination`, one Write
    /// at a time in insertion order, then discard the page. Returns the
    /// number of Writes delivered.
    fn transport(&self, destination: &dyn PermanentStore) -> LimboResult<usize>;

    /// Block until `can_transport` would return true, or until `stop`.
    /// Callers must re-check `can_transport`; wakeups may be spurious.
    fn wait_until_transportable(&self);

    /// Seal the active page (durably flushing any partial content) and
    /// refuse all further inserts. Idempotent.
    fn stop(&self) -> LimboResult<()>;
}

/// Iterator over a snapshot of staged Writes.
///
/// Holds the snapshot's pages alive, so a page transported (and its file
/// deleted) mid-iteration still yields its Writes from memory. Contents
/// of each page are materialized lazily when the iterator reaches it.
pub struct Writes {
    pages: std::vec::IntoIter<Arc<Page>>,
    current: std::vec::IntoIter<Write>,
}

impl Writes {
    pub(crate) fn over(pages: Vec<Arc<Page>>) -> Self {
        Self {
            pages: pages.into_iter(),
            current: Vec::new().into_iter(),
        }
    }
}

impl Iterator for Writes {
    type Item = Write;

    fn next(&mut self) -> Option<Write> {
        loop {
            if let Some(write) = self.current.next() {
                return Some(write);
            }
            match self.pages.next() {
                Some(page) => self.current = page.writes().into_iter(),
                None => return None,
            }
        }
    }
}
