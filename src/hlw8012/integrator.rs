/// Microseconds in one hour
pub const US_PER_HOUR: f64 = 3_600_000_000.0;

/// Integrates instantaneous power (W) into energy (kWh) over whatever
/// intervals the caller happens to sample at.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyIntegrator {
    last_sample_us: Option<i64>,
    energy_kwh: f64,
}

impl EnergyIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `power_w` held since the previous sample. The first call only sets
    /// the baseline. Returns the accumulated energy.
    pub fn accumulate(&mut self, now_us: i64, power_w: f32) -> f64 {
        if let Some(last) = self.last_sample_us {
            let elapsed_us = now_us.saturating_sub(last).max(0);
            let hours = elapsed_us as f64 / US_PER_HOUR;
            // Negative or NaN power never drains the counter
            let power = f64::from(power_w).max(0.0);
            self.energy_kwh += power * hours / 1000.0;
        }
        self.last_sample_us = Some(now_us);
        self.energy_kwh
    }

    pub fn energy_kwh(&self) -> f64 {
        self.energy_kwh
    }

    pub fn last_sample_us(&self) -> Option<i64> {
        self.last_sample_us
    }
}
