//! The permanent store seam.
//!
//! `accept` is the only call the staging buffer makes outward. It is an
//! explicit capability boundary: the buffer knows nothing about the
//! destination's indexing, compaction, or sync behavior, only that a
//! Write handed to a successful `accept` has been durably merged.

use crate::error::LimboResult;
use crate::write::Write;

/// The compacted, indexed destination that Writes migrate into.
///
/// # At-least-once contract
///
/// The buffer retries a page only after an observed failure, never
/// speculatively, so implementations must tolerate seeing the same Write
/// again after reporting an error for it (or for a later Write in the
/// same page). Versions make replayed Writes detectable.
///
/// `accept` may block arbitrarily long (internal maintenance after large
/// batches is expected); that blocks only the transport thread, never
/// writers or readers.
///
/// Test doubles are free to be no-op or in-memory stubs. Production
/// implementations must provide real durability before returning Ok.
pub trait PermanentStore: Send + Sync {
    /// Durably merge one Write.
    fn accept(&self, write: &Write) -> LimboResult<()>;
}
