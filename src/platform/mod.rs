#[cfg(target_os = "espidf")]
pub mod esp;

use crate::hlw8012::{InitError, MonotonicClock};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Process-wide record of which GPIOs a driver instance holds.
#[derive(Debug, Default)]
pub struct PinRegistry {
    claimed: Mutex<u64>,
}

impl PinRegistry {
    pub const fn new() -> Self {
        Self {
            claimed: Mutex::new(0),
        }
    }

    /// Claim all of `pins` or none of them.
    pub fn claim<'a>(&'a self, pins: &[i32]) -> Result<PinClaim<'a>, InitError> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);

        let mut mask = 0u64;
        for &pin in pins {
            if !(0..64).contains(&pin) {
                return Err(InitError::InvalidPin(pin));
            }
            let bit = 1u64 << pin;
            if *claimed & bit != 0 || mask & bit != 0 {
                log::error!("HLW8012: GPIO{} is already claimed", pin);
                return Err(InitError::PinConflict(pin));
            }
            mask |= bit;
        }

        *claimed |= mask;
        Ok(PinClaim {
            registry: self,
            mask,
        })
    }

    pub fn is_claimed(&self, pin: i32) -> bool {
        let claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        (0..64).contains(&pin) && *claimed & (1u64 << pin) != 0
    }
}

/// Releases its pins when dropped
#[derive(Debug)]
pub struct PinClaim<'a> {
    registry: &'a PinRegistry,
    mask: u64,
}

impl Drop for PinClaim<'_> {
    fn drop(&mut self) {
        let mut claimed = self
            .registry
            .claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *claimed &= !self.mask;
    }
}

/// `std::time::Instant` based clock for host builds and tools.
#[derive(Debug, Clone)]
pub struct InstantClock {
    origin: Arc<Instant>,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Arc::new(Instant::now()),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for InstantClock {
    fn now_us(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }
}
