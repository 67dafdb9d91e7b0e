//! Rising-edge timestamps shared between the GPIO ISRs and the reading task.
//!
//! Each line is one `AtomicI64`, so the ISR side is a single store and the
//! task side a single load. No lock is ever taken from interrupt context.

use core::sync::atomic::{AtomicI64, Ordering};

/// Stored until the first edge arrives on a line
const NO_EDGE: i64 = i64::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// Power pulse train
    Cf,
    /// Current/voltage pulse train, switched by SEL
    Cf1,
}

#[derive(Debug)]
pub struct EdgeTimestamps {
    cf: AtomicI64,
    cf1: AtomicI64,
}

impl EdgeTimestamps {
    pub const fn new() -> Self {
        Self {
            cf: AtomicI64::new(NO_EDGE),
            cf1: AtomicI64::new(NO_EDGE),
        }
    }

    pub fn cell(&self, line: Line) -> &AtomicI64 {
        match line {
            Line::Cf => &self.cf,
            Line::Cf1 => &self.cf1,
        }
    }

    /// ISR entry point: remember when the latest rising edge happened.
    #[inline(always)]
    pub fn record(&self, line: Line, now_us: i64) {
        self.cell(line).store(now_us, Ordering::Release);
    }

    /// Timestamp of the most recent edge, `None` before the first one.
    pub fn last(&self, line: Line) -> Option<i64> {
        match self.cell(line).load(Ordering::Acquire) {
            NO_EDGE => None,
            ts => Some(ts),
        }
    }
}

impl Default for EdgeTimestamps {
    fn default() -> Self {
        Self::new()
    }
}
