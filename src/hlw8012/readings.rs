use serde::Serialize;

/// One published snapshot. This is what the status/power HTTP handlers render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Readings {
    /// V
    pub voltage: f32,
    /// A
    pub current: f32,
    /// W
    pub power: f32,
    /// Cumulative kWh since the driver was created
    pub energy: f32,
}

impl Readings {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SensorStats {
    pub readings_taken: u32,
    pub failed_reads: u32,
    /// Channel values held over because no fresh period was available
    pub stale_holds: u32,
}
