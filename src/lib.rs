//! ESP32 Smart Plug Energy Metering Library
//!
//! Driver for the HLW8012 pulse-output power meter: edge-timestamping ISRs,
//! the SEL multiplexer, period-to-value calibration and energy integration.
//! The core is hardware-agnostic (embedded-hal pins and delays plus a
//! monotonic clock); the ESP-IDF wiring lives in [`platform::esp`].

pub mod hlw8012;
pub mod platform;

pub use hlw8012::{
    Channel, EdgeTimestamps, Hlw8012, InitError, Line, MonotonicClock, Readings, SensorConfig,
    SensorError, SensorResult, SensorStats, Stage,
};
