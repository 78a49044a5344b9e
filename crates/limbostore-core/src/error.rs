//! Error types for limbostore operations.
//!
//! All failures are represented by the LimboError enum, which carries
//! enough context to debug a bad page file offset or a refused operation.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Limbostore error types with detailed context
#[derive(Debug, Clone)]
pub enum LimboError {
    /// I/O operation failed
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Insert attempted after the buffer was stopped
    BufferStopped,

    /// Append attempted against a sealed page
    PageSealed {
        /// Backing file of the sealed page
        path: PathBuf,
    },

    /// Transport called while its precondition does not hold
    /// (no sealed page behind the active one, or the throttle is closed)
    TransportNotReady,

    /// The permanent store refused a Write
    Rejected {
        /// Version of the refused Write
        version: u64,
        /// Destination-supplied reason
        reason: String,
    },

    /// Configuration failed validation
    InvalidConfig {
        message: String,
    },

    /// A Write component exceeds its serialization limit
    OversizedWrite {
        /// Which component is oversized ("key" or "value")
        component: &'static str,
        size: u64,
        limit: u64,
    },

    /// Magic bytes not found at a record boundary
    BadMagic {
        /// Byte offset where magic was expected
        offset: u64,
        /// Bytes actually found
        found: [u8; 4],
    },

    /// CRC32C verification failed for a record payload
    ChecksumMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// A record started but the file ends before it completes
    /// (the crash point of an unsealed page)
    TornWrite {
        offset: u64,
        /// Bytes the full record needs
        needed: u64,
        /// Bytes actually available
        available: u64,
    },

    /// A record is structurally invalid beyond checksum or truncation
    Corrupt {
        offset: u64,
        reason: String,
    },
}

impl fmt::Display for LimboError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimboError::Io { path, kind, message } => {
                if let Some(path) = path {
                    write!(f, "I/O error in {}: {} ({})", path.display(), message, kind)
                } else {
                    write!(f, "I/O error: {} ({})", message, kind)
                }
            }

            LimboError::BufferStopped => {
                write!(f, "buffer is stopped and no longer accepts writes")
            }

            LimboError::PageSealed { path } => {
                write!(f, "page {} is sealed and refuses appends", path.display())
            }

            LimboError::TransportNotReady => {
                write!(f, "transport precondition not met: no transportable page")
            }

            LimboError::Rejected { version, reason } => {
                write!(f, "permanent store rejected write v{}: {}", version, reason)
            }

            LimboError::InvalidConfig { message } => {
                write!(f, "invalid configuration: {}", message)
            }

            LimboError::OversizedWrite { component, size, limit } => {
                write!(f, "write {} too large: {} bytes exceeds limit of {} bytes",
                       component, size, limit)
            }

            LimboError::BadMagic { offset, found } => {
                write!(f, "magic bytes not found at offset {}: found {:02x}{:02x}{:02x}{:02x}",
                       offset, found[0], found[1], found[2], found[3])
            }

            LimboError::ChecksumMismatch { offset, expected, actual } => {
                write!(f, "checksum mismatch at offset {}: expected 0x{:08x}, got 0x{:08x}",
                       offset, expected, actual)
            }

            LimboError::TornWrite { offset, needed, available } => {
                write!(f, "torn write at offset {}: record needs {} bytes, only {} available",
                       offset, needed, available)
            }

            LimboError::Corrupt { offset, reason } => {
                write!(f, "corrupt record at offset {}: {}", offset, reason)
            }
        }
    }
}

impl Error for LimboError {}

impl LimboError {
    /// Build an I/O error carrying the affected path and a short context line.
    pub(crate) fn io(path: &std::path::Path, context: &str, err: &std::io::Error) -> Self {
        LimboError::Io {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", context, err),
        }
    }
}

/// Convert std::io::Error to LimboError::Io
impl From<std::io::Error> for LimboError {
    fn from(err: std::io::Error) -> Self {
        LimboError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for limbostore operations
pub type LimboResult<T> = Result<T, LimboError>;
