//! Limbostore Core — durable staging buffer for an embedded storage engine
//!
//! An append-first write layer that absorbs mutations at low latency and
//! migrates them, in arrival order, into a slower permanent store once
//! enough have accumulated.
//!
//! # Architecture
//!
//! - **Write path**: append to the active page, durable_sync, acknowledge
//! - **Read path**: snapshot the page chain, read pages independently
//! - **Drain path**: one background thread transports sealed pages,
//!   oldest first, one Write at a time into the permanent store
//!
//! # Guarantees
//!
//! Every acknowledged Write is on persistent storage. Writes reach the
//! permanent store in strict version order. Readers never observe a torn
//! or partially migrated state, and writers never wait on transport.

pub mod buffer;
pub mod config;
pub mod durability;
pub mod error;
pub mod format;
pub mod limbo;
pub mod page;
pub mod permanent;
pub mod recovery;
pub mod throttle;
pub mod write;

// Re-export key types for convenience
pub use buffer::Buffer;
pub use config::Config;
pub use error::{LimboError, LimboResult};
pub use limbo::{Limbo, Writes};
pub use page::{AppendOutcome, Page};
pub use permanent::PermanentStore;
pub use recovery::RecoveryScanner;
pub use throttle::TransportThrottle;
pub use write::{Value, Write, WriteType};
