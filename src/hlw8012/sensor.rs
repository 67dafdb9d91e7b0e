use super::clock::MonotonicClock;
use super::config::SensorConfig;
use super::converter;
use super::edge::{EdgeTimestamps, Line};
use super::error::{InitError, SensorError, SensorResult, Stage};
use super::integrator::EnergyIntegrator;
use super::readings::{Readings, SensorStats};
use super::selector::{Channel, ChannelSelector};
use core::sync::atomic::{AtomicU32, Ordering};
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// State that only a reading in progress may touch
struct Measurement<P, D> {
    selector: ChannelSelector<P, D>,
    integrator: EnergyIntegrator,
}

/// HLW8012 driver handle.
///
/// The edge ISRs write into the shared [`EdgeTimestamps`]; everything else is
/// owned here. A reading holds the measurement lock for its whole
/// select/settle/measure/integrate sequence, so concurrent callers queue up
/// instead of interleaving SEL toggles. The published snapshot sits behind its
/// own lock so status readers never wait out a 20ms reading.
pub struct Hlw8012<P, D, C> {
    config: SensorConfig,
    edges: Arc<EdgeTimestamps>,
    clock: C,
    measurement: Mutex<Measurement<P, D>>,
    published: Mutex<Readings>,
    readings_taken: AtomicU32,
    failed_reads: AtomicU32,
    stale_holds: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Guarded data is plain values; a panic elsewhere cannot leave it torn
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn enter(stage: Stage) {
    log::trace!("HLW8012: stage {:?}", stage);
}

impl<P, D, C> Hlw8012<P, D, C>
where
    P: OutputPin,
    D: DelayMs<u32>,
    C: MonotonicClock,
{
    /// Build the driver around an already-wired SEL pin, delay and clock.
    ///
    /// # Arguments
    ///
    /// * `config`: pins and calibration, validated here
    /// * `selector_pin`: SEL output
    /// * `delay`: blocking delay used for the settle time
    /// * `clock`: must be the same time base the edge ISRs stamp with
    /// * `edges`: timestamps written by the edge ISRs
    pub fn new(
        config: SensorConfig,
        selector_pin: P,
        delay: D,
        clock: C,
        edges: Arc<EdgeTimestamps>,
    ) -> SensorResult<Self> {
        config.validate()?;

        let mut selector = ChannelSelector::new(
            selector_pin,
            delay,
            config.settle_ms,
            config.current_sel_high,
        );
        selector
            .set_channel(Channel::Voltage)
            .map_err(|_| InitError::PinConfig(config.sel_pin))?;

        log::info!(
            "HLW8012: SEL=GPIO{} CF=GPIO{} CF1=GPIO{} settle={}ms",
            config.sel_pin,
            config.cf_pin,
            config.cf1_pin,
            config.settle_ms
        );
        log::info!(
            "HLW8012: Multipliers current={} voltage={} power={}",
            config.current_multiplier,
            config.voltage_multiplier,
            config.power_multiplier
        );

        Ok(Self {
            config,
            edges,
            clock,
            measurement: Mutex::new(Measurement {
                selector,
                integrator: EnergyIntegrator::new(),
            }),
            published: Mutex::new(Readings::default()),
            readings_taken: AtomicU32::new(0),
            failed_reads: AtomicU32::new(0),
            stale_holds: AtomicU32::new(0),
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Timestamps the edge ISRs write into
    pub fn edges(&self) -> &Arc<EdgeTimestamps> {
        &self.edges
    }

    /// Take a full reading and copy it into `out`.
    ///
    /// `None` is rejected with `InvalidArgument` before anything is touched.
    /// On a transient failure the previously published readings stay as they
    /// were.
    pub fn get_readings(&self, out: Option<&mut Readings>) -> SensorResult<()> {
        let out = out.ok_or(SensorError::InvalidArgument)?;

        let mut measurement = lock(&self.measurement);
        match self.measure(&mut measurement) {
            Ok(readings) => {
                self.readings_taken.fetch_add(1, Ordering::Relaxed);
                *out = readings;
                Ok(())
            }
            Err(err) => {
                self.failed_reads.fetch_add(1, Ordering::Relaxed);
                log::warn!("HLW8012: Reading aborted - {}", err);
                Err(err)
            }
        }
    }

    /// Take a full reading and return it.
    pub fn read(&self) -> SensorResult<Readings> {
        let mut readings = Readings::default();
        self.get_readings(Some(&mut readings))?;
        Ok(readings)
    }

    /// Most recently published readings, without measuring.
    pub fn last_readings(&self) -> Readings {
        *lock(&self.published)
    }

    pub fn energy_kwh(&self) -> f32 {
        self.last_readings().energy
    }

    pub fn stats(&self) -> SensorStats {
        SensorStats {
            readings_taken: self.readings_taken.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            stale_holds: self.stale_holds.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.readings_taken.store(0, Ordering::Relaxed);
        self.failed_reads.store(0, Ordering::Relaxed);
        self.stale_holds.store(0, Ordering::Relaxed);
        log::info!("HLW8012: Statistics reset");
    }

    fn measure(&self, measurement: &mut Measurement<P, D>) -> SensorResult<Readings> {
        let previous = self.last_readings();

        enter(Stage::SelectCurrent);
        measurement.selector.select(Channel::Current)?;
        enter(Stage::MeasureCurrent);
        let current = self.sample(Line::Cf1, self.config.current_multiplier, previous.current);

        enter(Stage::SelectVoltage);
        measurement.selector.select(Channel::Voltage)?;
        enter(Stage::MeasureVoltage);
        let voltage = self.sample(Line::Cf1, self.config.voltage_multiplier, previous.voltage);

        enter(Stage::MeasurePower);
        let power = self.sample(Line::Cf, self.config.power_multiplier, previous.power);

        enter(Stage::Integrate);
        let energy = measurement
            .integrator
            .accumulate(self.clock.now_us(), power);

        enter(Stage::Publish);
        let readings = Readings {
            voltage,
            current,
            power,
            energy: energy as f32,
        };
        *lock(&self.published) = readings;

        log::debug!(
            "HLW8012: {:.1}V {:.3}A {:.1}W {:.6}kWh",
            voltage,
            current,
            power,
            energy
        );
        enter(Stage::Idle);

        Ok(readings)
    }

    fn sample(&self, line: Line, multiplier: f32, previous: f32) -> f32 {
        let period = converter::period_us(self.clock.now_us(), self.edges.last(line));
        match converter::value_from_period(multiplier, period) {
            Some(value) => value,
            None => {
                self.stale_holds.fetch_add(1, Ordering::Relaxed);
                log::debug!("HLW8012: No usable {:?} period ({}us), holding {}", line, period, previous);
                previous
            }
        }
    }
}
