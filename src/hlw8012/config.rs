use super::error::InitError;
use serde::{Deserialize, Serialize};

/// SEL output on the reference smart plug board
pub const DEFAULT_SEL_GPIO: i32 = 12;
/// CF (active power pulse train)
pub const DEFAULT_CF_GPIO: i32 = 13;
/// CF1 (current or voltage, depending on SEL)
pub const DEFAULT_CF1_GPIO: i32 = 14;

/// Highest GPIO number on the ESP32
pub const MAX_GPIO: i32 = 39;
/// GPIO34..=39 are input-only, so SEL must sit below this
pub const FIRST_INPUT_ONLY_GPIO: i32 = 34;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Selector output driving the CF1 multiplexer
    pub sel_pin: i32,

    /// Power pulse input
    pub cf_pin: i32,

    /// Multiplexed current/voltage pulse input
    pub cf1_pin: i32,

    pub current_multiplier: f32,
    pub voltage_multiplier: f32,
    pub power_multiplier: f32,

    /// Analog settling time after switching SEL (ms)
    pub settle_ms: u32,

    /// SEL level that selects the current channel. The reference wiring
    /// reads current with SEL low; BL0937 clones are inverted.
    pub current_sel_high: bool,
}

impl SensorConfig {
    pub fn with_pins(mut self, sel_pin: i32, cf_pin: i32, cf1_pin: i32) -> Self {
        self.sel_pin = sel_pin;
        self.cf_pin = cf_pin;
        self.cf1_pin = cf1_pin;
        self
    }

    pub fn with_multipliers(mut self, current: f32, voltage: f32, power: f32) -> Self {
        self.current_multiplier = current;
        self.voltage_multiplier = voltage;
        self.power_multiplier = power;
        self
    }

    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    pub fn with_current_sel_high(mut self, current_sel_high: bool) -> Self {
        self.current_sel_high = current_sel_high;
        self
    }

    pub fn pins(&self) -> [i32; 3] {
        [self.sel_pin, self.cf_pin, self.cf1_pin]
    }

    /// Check pin numbers before anything touches the hardware.
    pub fn validate(&self) -> Result<(), InitError> {
        let pins = self.pins();
        for (i, &pin) in pins.iter().enumerate() {
            if !(0..=MAX_GPIO).contains(&pin) {
                return Err(InitError::InvalidPin(pin));
            }
            if pins[..i].contains(&pin) {
                return Err(InitError::PinConflict(pin));
            }
        }

        if self.sel_pin >= FIRST_INPUT_ONLY_GPIO {
            return Err(InitError::InvalidPin(self.sel_pin));
        }

        Ok(())
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sel_pin: DEFAULT_SEL_GPIO,
            cf_pin: DEFAULT_CF_GPIO,
            cf1_pin: DEFAULT_CF1_GPIO,
            // Adjust based on calibration
            current_multiplier: 0.001,
            voltage_multiplier: 0.4,
            power_multiplier: 0.2,
            settle_ms: 10,
            current_sel_high: false,
        }
    }
}
