#[cfg(target_os = "espidf")]
use esp32_smart_plug::platform::esp;
#[cfg(target_os = "espidf")]
use esp32_smart_plug::SensorConfig;
#[cfg(target_os = "espidf")]
use esp_idf_hal::delay::FreeRtos;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys;

/// Polling period; also the energy integration step when nobody else reads
#[cfg(target_os = "espidf")]
const SAMPLE_INTERVAL_MS: u32 = 2000;

/// Log a stats line every this many samples
#[cfg(target_os = "espidf")]
const STATS_EVERY: u32 = 30;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF system services
    sys::link_patches();

    // Initialize logging
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("ESP32 Smart Plug Energy Meter");
    log::info!("Initializing...");

    let config = SensorConfig::default();
    log::info!("Initializing HLW8012...");
    log::info!("  SEL pin: GPIO{} (output)", config.sel_pin);
    log::info!("  CF pin:  GPIO{} (input, rising edge)", config.cf_pin);
    log::info!("  CF1 pin: GPIO{} (input, rising edge)", config.cf1_pin);

    // Init failure halts bring-up
    let sensor = esp::init(config)?;

    log::info!("✅ HLW8012 initialized");
    log::info!("Entering sampling loop ({}ms)...", SAMPLE_INTERVAL_MS);

    let mut samples = 0u32;
    loop {
        match sensor.read() {
            Ok(readings) => match readings.to_json() {
                Ok(json) => log::info!("Readings: {}", json),
                Err(err) => log::warn!("Readings serialization failed: {}", err),
            },
            Err(err) => {
                // Previous readings stay published, try again next tick
                log::warn!("HLW8012 read failed: {}", err);
            }
        }

        samples = samples.wrapping_add(1);
        if samples % STATS_EVERY == 0 {
            let stats = sensor.stats();
            log::info!(
                "HLW8012 stats: {} readings, {} failed, {} stale holds, {:.6} kWh total",
                stats.readings_taken,
                stats.failed_reads,
                stats.stale_holds,
                sensor.energy_kwh()
            );
        }

        FreeRtos::delay_ms(SAMPLE_INTERVAL_MS);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("plug_app runs on ESP-IDF only; build it for an espidf target (e.g. xtensa-esp32-espidf)");
}
