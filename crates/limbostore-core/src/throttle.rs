//! Transport pacing.
//!
//! The permanent store may run expensive synchronous maintenance after
//! absorbing a batch, so sealed pages are not drained as fast as they
//! accumulate. The throttle enforces a minimum pause between admitted
//! transports; the rate multiplier divides that pause so operators can
//! tune eagerness per instance, and a multiplier of zero disables pacing
//! entirely for deterministic tests.
//!
//! This is policy, not correctness: every ordering and durability
//! guarantee holds at any multiplier, including unthrottled.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Rate gate between consecutive transports.
pub struct TransportThrottle {
    /// Base pause between admitted transports
    pause: Duration,
    /// Divides the base pause; 0 disables pacing
    multiplier: u32,
    /// When the last transport was admitted, None before the first
    last_transport: Mutex<Option<Instant>>,
}

impl TransportThrottle {
    pub fn new(pause: Duration, multiplier: u32) -> Self {
        Self {
            pause,
            multiplier,
            last_transport: Mutex::new(None),
        }
    }

    /// A throttle that always permits. Used in tests and by callers that
    /// want the buffer drained as fast as the destination accepts.
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    fn effective_pause(&self) -> Duration {
        if self.multiplier == 0 {
            Duration::ZERO
        } else {
            self.pause / self.multiplier
        }
    }

    /// True if a transport may be admitted right now.
    pub fn permits(&self) -> bool {
        self.until_ready().is_none()
    }

    /// Time remaining until the gate opens, or None if it is open.
    ///
    /// The buffer's transport wait uses this as a bounded sleep so gate
    /// expiry needs no external signal.
    pub fn until_ready(&self) -> Option<Duration> {
        let pause = self.effective_pause();
        if pause.is_zero() {
            return None;
        }
        let last = self.last_transport.lock();
        match *last {
            None => None,
            Some(at) => {
                let elapsed = at.elapsed();
                if elapsed >= pause {
                    None
                } else {
                    Some(pause - elapsed)
                }
            }
        }
    }

    /// Record that a transport was admitted; closes the gate for the
    /// effective pause.
    pub fn record_transport(&self) {
        let mut last = self.last_transport.lock();
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_before_first_transport() {
        let throttle = TransportThrottle::new(Duration::from_secs(60), 1);
        assert!(throttle.permits());
        assert!(throttle.until_ready().is_none());
    }

    #[test]
    fn test_closed_immediately_after_transport() {
        let throttle = TransportThrottle::new(Duration::from_secs(60), 1);
        throttle.record_transport();
        assert!(!throttle.permits());
        assert!(throttle.until_ready().unwrap() <= Duration::from_secs(60));
    }

    #[test]
    fn test_reopens_after_pause() {
        let throttle = TransportThrottle::new(Duration::from_millis(20), 1);
        throttle.record_transport();
        assert!(!throttle.permits());
        std::thread::sleep(Duration::from_millis(40));
        assert!(throttle.permits());
    }

    #[test]
    fn test_multiplier_divides_pause() {
        let throttle = TransportThrottle::new(Duration::from_secs(10), 1000);
        throttle.record_transport();
        std::thread::sleep(Duration::from_millis(20));
        // 10s / 1000 = 10ms, already elapsed
        assert!(throttle.permits());
    }

    #[test]
    fn test_unthrottled_always_permits() {
        let throttle = TransportThrottle::unthrottled();
        throttle.record_transport();
        assert!(throttle.permits());
        throttle.record_transport();
        assert!(throttle.permits());
    }

    #[test]
    fn test_zero_multiplier_disables_pacing() {
        let throttle = TransportThrottle::new(Duration::from_secs(3600), 0);
        throttle.record_transport();
        assert!(throttle.permits());
    }
}
