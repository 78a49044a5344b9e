//! The Write record — one immutable, versioned mutation.
//!
//! A Write states that a `value` was added to or removed from a `key` in a
//! `record`. Every Write carries a process-wide unique version assigned at
//! construction; versions are the total order in which mutations entered
//! the system and the order in which they must reach the permanent store.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide version counter. Starts at 1 so version 0 can never occur
/// in a well-formed log. Recovered Writes push this forward (see
/// [`Write::from_parts`]) so post-restart versions stay monotonic.
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// A typed cell value.
///
/// Closed set of variants so `Eq` and `Hash` stay sound (no floats), which
/// the net-effect value set in `select` depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Whether a Write asserts or retracts its (key, value, record) fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WriteType {
    Add = 1,
    Remove = 2,
}

/// One immutable, versioned mutation record.
///
/// Two Writes with equal (key, value, record) but opposite types are
/// "matching" — an Add later cancelled by a Remove — yet they are never
/// equal as entries: equality and hashing cover the full tuple including
/// the version, so both coexist in the log as distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Write {
    version: u64,
    write_type: WriteType,
    key: String,
    value: Value,
    record: u64,
}

impl Write {
    /// Create an Add write. Assigns the next global version.
    pub fn add(key: &str, value: Value, record: u64) -> Self {
        Self::new(WriteType::Add, key, value, record)
    }

    /// Create a Remove write. Assigns the next global version.
    pub fn remove(key: &str, value: Value, record: u64) -> Self {
        Self::new(WriteType::Remove, key, value, record)
    }

    fn new(write_type: WriteType, key: &str, value: Value, record: u64) -> Self {
        Self {
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
            write_type,
            key: key.to_string(),
            value,
            record,
        }
    }

    /// Rebuild a Write from stored fields (recovery and page adoption).
    ///
    /// Does NOT assign a fresh version; instead pushes the global counter
    /// past the stored one so Writes created after a restart never collide
    /// with or sort below recovered ones.
    pub(crate) fn from_parts(
        version: u64,
        write_type: WriteType,
        key: String,
        value: Value,
        record: u64,
    ) -> Self {
        NEXT_VERSION.fetch_max(version + 1, Ordering::Relaxed);
        Self {
            version,
            write_type,
            key,
            value,
            record,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn write_type(&self) -> WriteType {
        self.write_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn record(&self) -> u64 {
        self.record
    }

    pub fn is_add(&self) -> bool {
        self.write_type == WriteType::Add
    }

    /// True if `other` describes the same (key, value, record) fact,
    /// regardless of type or version.
    pub fn matches(&self, other: &Write) -> bool {
        self.key == other.key && self.value == other.value && self.record == other.record
    }
}
