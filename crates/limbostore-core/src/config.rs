//! Configuration for the staging buffer.
//!
//! The surface is small on purpose: page capacity, the transport pacing
//! knobs, and nothing else affects core behavior. The backing-storage
//! directory is an argument to [`crate::Buffer::open`].

use std::time::Duration;

/// Buffer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Writes per page before it seals and rotates
    pub page_capacity: usize,
    /// Base pause between admitted transports
    pub transport_pause: Duration,
    /// Divides the base pause; higher drains faster, 0 disables pacing
    pub transport_rate_multiplier: u32,
}

impl Config {
    /// Balanced defaults for a long-running engine instance.
    pub fn standard() -> Self {
        Self {
            page_capacity: 8192,
            transport_pause: Duration::from_millis(250),
            transport_rate_multiplier: 1,
        }
    }

    /// Pacing disabled: every sealed page is immediately transportable.
    /// The configuration deterministic tests want.
    pub fn unthrottled() -> Self {
        Self {
            transport_rate_multiplier: 0,
            ..Self::standard()
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.page_capacity == 0 {
            return Err("page_capacity must be > 0".into());
        }
        if self.page_capacity > 1 << 24 {
            return Err("page_capacity must be <= 2^24".into());
        }
        if self.transport_rate_multiplier > 0 && self.transport_pause.is_zero() {
            return Err("transport_pause must be > 0 when pacing is enabled; \
                        set transport_rate_multiplier = 0 to disable pacing"
                .into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::standard()
    }
}
