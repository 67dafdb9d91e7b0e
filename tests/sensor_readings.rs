use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
use esp32_smart_plug::{
    EdgeTimestamps, Hlw8012, InitError, Line, MonotonicClock, Readings, SensorConfig,
    SensorError, SensorStats, Stage,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

const START_US: i64 = 1_000_000;
const SETTLE_US: i64 = 10_000;

struct SimClock(AtomicI64);

impl SimClock {
    fn advance(&self, us: i64) {
        self.0.fetch_add(us, Ordering::SeqCst);
    }
}

impl MonotonicClock for SimClock {
    fn now_us(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct RecordingPin {
    levels: Arc<Mutex<Vec<bool>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingPin {
    fn write(&mut self, high: bool) -> Result<(), ()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(());
        }
        self.levels.lock().unwrap().push(high);
        Ok(())
    }
}

impl OutputPin for RecordingPin {
    type Error = ();

    fn set_low(&mut self) -> Result<(), ()> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), ()> {
        self.write(true)
    }
}

/// Edges to fire during one settle: `(line, microseconds before the settle ends)`
type SettleEdges = Vec<(Line, i64)>;

/// Advances the simulated clock by the settle time and fires scripted edges
/// as if the ISRs ran while the task slept.
struct SimDelay {
    clock: Arc<SimClock>,
    edges: Arc<EdgeTimestamps>,
    script: Arc<Mutex<VecDeque<SettleEdges>>>,
}

impl DelayMs<u32> for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance(i64::from(ms) * 1000);
        let end = self.clock.now_us();
        if let Some(fired) = self.script.lock().unwrap().pop_front() {
            for (line, before_end) in fired {
                self.edges.record(line, end - before_end);
            }
        }
        std::thread::yield_now();
    }
}

type SimSensor = Hlw8012<RecordingPin, SimDelay, Arc<SimClock>>;

struct Rig {
    sensor: SimSensor,
    clock: Arc<SimClock>,
    pin: RecordingPin,
    script: Arc<Mutex<VecDeque<SettleEdges>>>,
}

impl Rig {
    fn new(config: SensorConfig) -> Self {
        let clock = Arc::new(SimClock(AtomicI64::new(START_US)));
        let edges = Arc::new(EdgeTimestamps::new());
        let script = Arc::new(Mutex::new(VecDeque::new()));
        let pin = RecordingPin::default();
        let delay = SimDelay {
            clock: Arc::clone(&clock),
            edges: Arc::clone(&edges),
            script: Arc::clone(&script),
        };
        let sensor = Hlw8012::new(config, pin.clone(), delay, Arc::clone(&clock), edges).unwrap();
        Self {
            sensor,
            clock,
            pin,
            script,
        }
    }

    /// Queue edges for the next reading's current and voltage settles.
    fn during_next_reading(&self, current_settle: SettleEdges, voltage_settle: SettleEdges) {
        let mut script = self.script.lock().unwrap();
        script.push_back(current_settle);
        script.push_back(voltage_settle);
    }

    fn levels(&self) -> Vec<bool> {
        self.pin.levels.lock().unwrap().clone()
    }
}

fn close(actual: f32, expected: f32) -> bool {
    (actual - expected).abs() <= 1e-5 * expected.abs()
}

#[test]
fn current_scenario_from_2000us_period() {
    let rig = Rig::new(SensorConfig::default().with_multipliers(0.001, 0.4, 0.2));
    rig.during_next_reading(vec![(Line::Cf1, 2000)], vec![(Line::Cf1, 1000), (Line::Cf, 400)]);

    let readings = rig.sensor.read().unwrap();

    assert!(close(readings.current, 5e-7), "current {}", readings.current);
    assert!(close(readings.voltage, 0.4 / 1000.0));
    assert!(close(readings.power, 0.2 / 400.0));
    assert_eq!(readings.energy, 0.0);
}

#[test]
fn one_second_at_100_watts_adds_expected_energy() {
    // 200000 / 2000us = 100 W
    let rig = Rig::new(SensorConfig::default().with_multipliers(0.001, 0.4, 200_000.0));

    rig.during_next_reading(vec![], vec![(Line::Cf, 2000)]);
    let first = rig.sensor.read().unwrap();
    assert!(close(first.power, 100.0));
    assert_eq!(first.energy, 0.0);

    // Second integration point lands exactly 1s after the first
    rig.clock.advance(1_000_000 - 2 * SETTLE_US);
    rig.during_next_reading(vec![], vec![(Line::Cf, 2000)]);
    let second = rig.sensor.read().unwrap();

    let expected = 100.0 * (1.0 / 3600.0) / 1000.0;
    assert!(close(second.energy, expected), "energy {}", second.energy);
    assert!(close(second.energy, 2.7778e-5));
}

#[test]
fn first_reading_only_sets_energy_baseline() {
    let rig = Rig::new(SensorConfig::default());
    rig.clock.advance(3_600_000_000);
    rig.during_next_reading(vec![(Line::Cf1, 100)], vec![(Line::Cf1, 100), (Line::Cf, 1)]);

    let readings = rig.sensor.read().unwrap();
    assert!(readings.power > 0.0);
    assert_eq!(readings.energy, 0.0);
}

#[test]
fn missing_output_is_rejected_without_side_effects() {
    let rig = Rig::new(SensorConfig::default());
    rig.during_next_reading(vec![(Line::Cf1, 2000)], vec![(Line::Cf1, 1000), (Line::Cf, 400)]);
    let before = rig.sensor.read().unwrap();
    let levels = rig.levels();
    let now = rig.clock.now_us();
    let stats = rig.sensor.stats();

    assert_eq!(rig.sensor.get_readings(None), Err(SensorError::InvalidArgument));

    assert_eq!(rig.sensor.last_readings(), before);
    assert_eq!(rig.levels(), levels);
    assert_eq!(rig.clock.now_us(), now);
    assert_eq!(rig.sensor.stats(), stats);
}

#[test]
fn rejected_call_after_init_leaves_baseline_unset() {
    let rig = Rig::new(SensorConfig::default().with_multipliers(0.001, 0.4, 200_000.0));
    assert_eq!(rig.sensor.get_readings(None), Err(SensorError::InvalidArgument));

    rig.clock.advance(60_000_000);
    rig.during_next_reading(vec![], vec![(Line::Cf, 2000)]);
    assert_eq!(rig.sensor.read().unwrap().energy, 0.0);
}

#[test]
fn no_edges_hold_initial_zeroes() {
    let rig = Rig::new(SensorConfig::default());
    let readings = rig.sensor.read().unwrap();

    assert_eq!(readings, Readings::default());
    assert_eq!(rig.sensor.stats().stale_holds, 3);
}

#[test]
fn zero_period_holds_previous_values() {
    let rig = Rig::new(SensorConfig::default());
    rig.during_next_reading(vec![(Line::Cf1, 2000)], vec![(Line::Cf1, 1000), (Line::Cf, 400)]);
    let first = rig.sensor.read().unwrap();

    // Edges stamped exactly at the sample instant give a zero period
    rig.during_next_reading(vec![(Line::Cf1, 0)], vec![(Line::Cf1, 0), (Line::Cf, 0)]);
    let second = rig.sensor.read().unwrap();

    assert_eq!(second.current, first.current);
    assert_eq!(second.voltage, first.voltage);
    assert_eq!(second.power, first.power);
    assert!(second.current.is_finite() && second.voltage.is_finite() && second.power.is_finite());
    assert_eq!(rig.sensor.stats().stale_holds, 3);
}

#[test]
fn edge_fired_during_settle_is_used() {
    let rig = Rig::new(SensorConfig::default());
    rig.during_next_reading(vec![(Line::Cf1, 5000)], vec![]);
    let readings = rig.sensor.read().unwrap();
    assert!(close(readings.current, 0.001 / 5000.0));
    // Same edge, one settle later
    assert!(close(readings.voltage, 0.4 / (5000.0 + SETTLE_US as f32)));

    // An edge during the voltage settle shows up in that same reading
    rig.during_next_reading(vec![], vec![(Line::Cf1, 250)]);
    let readings = rig.sensor.read().unwrap();
    assert!(close(readings.voltage, 0.4 / 250.0));
}

#[test]
fn each_reading_toggles_sel_current_then_voltage() {
    let rig = Rig::new(SensorConfig::default());
    assert_eq!(rig.levels(), vec![true]);

    rig.sensor.read().unwrap();
    rig.sensor.read().unwrap();
    assert_eq!(rig.levels(), vec![true, false, true, false, true]);
    // Two 10ms settles per reading
    assert_eq!(rig.clock.now_us(), START_US + 4 * SETTLE_US);
}

#[test]
fn inverted_selector_wiring() {
    let rig = Rig::new(SensorConfig::default().with_current_sel_high(true));
    rig.sensor.read().unwrap();
    assert_eq!(rig.levels(), vec![false, true, false]);
}

#[test]
fn transient_failure_keeps_published_readings_and_energy() {
    let rig = Rig::new(SensorConfig::default().with_multipliers(0.001, 0.4, 200_000.0));
    rig.during_next_reading(vec![(Line::Cf1, 2000)], vec![(Line::Cf1, 1000), (Line::Cf, 2000)]);
    let good = rig.sensor.read().unwrap();

    rig.pin.fail.store(true, Ordering::SeqCst);
    rig.clock.advance(500_000);
    let mut out = Readings::default();
    assert_eq!(
        rig.sensor.get_readings(Some(&mut out)),
        Err(SensorError::TransientRead(Stage::SelectCurrent))
    );
    assert_eq!(out, Readings::default());
    assert_eq!(rig.sensor.last_readings(), good);

    // The failed call must not have moved the integration baseline
    rig.pin.fail.store(false, Ordering::SeqCst);
    rig.clock.advance(500_000 - 2 * SETTLE_US);
    rig.during_next_reading(vec![], vec![(Line::Cf, 2000)]);
    let after = rig.sensor.read().unwrap();
    assert!(close(after.energy, 100.0 / 3600.0 / 1000.0));

    assert_eq!(
        rig.sensor.stats(),
        SensorStats {
            readings_taken: 2,
            failed_reads: 1,
            stale_holds: 0,
        }
    );
    rig.sensor.reset_stats();
    assert_eq!(rig.sensor.stats(), SensorStats::default());
}

#[test]
fn energy_never_decreases_across_readings() {
    let rig = Rig::new(SensorConfig::default().with_multipliers(0.001, 0.4, 200_000.0));
    let mut previous = 0.0;
    for (gap_us, cf_before_end) in [(0, 2000), (250_000, 400), (3_000_000, 0), (10_000, 80_000), (700_000, 1)] {
        rig.clock.advance(gap_us);
        rig.during_next_reading(vec![], vec![(Line::Cf, cf_before_end)]);
        let readings = rig.sensor.read().unwrap();
        assert!(readings.energy >= previous);
        assert_eq!(rig.sensor.energy_kwh(), readings.energy);
        previous = readings.energy;
    }
    assert!(previous > 0.0);
}

#[test]
fn concurrent_readers_never_interleave_selector() {
    let rig = Rig::new(SensorConfig::default());
    let sensor = Arc::new(rig.sensor);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sensor = Arc::clone(&sensor);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    sensor.read().unwrap();
                    let _ = sensor.last_readings();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(sensor.stats().readings_taken, 20);
    let levels = rig.pin.levels.lock().unwrap().clone();
    assert_eq!(levels.len(), 1 + 2 * 20);
    for pair in levels[1..].chunks(2) {
        assert_eq!(pair, [false, true]);
    }
}

#[test]
fn init_rejects_conflicting_pins() {
    let clock = Arc::new(SimClock(AtomicI64::new(0)));
    let edges = Arc::new(EdgeTimestamps::new());
    let delay = SimDelay {
        clock: Arc::clone(&clock),
        edges: Arc::clone(&edges),
        script: Arc::default(),
    };
    let result = Hlw8012::new(
        SensorConfig::default().with_pins(12, 14, 14),
        RecordingPin::default(),
        delay,
        clock,
        edges,
    );
    assert!(matches!(
        result,
        Err(SensorError::Init(InitError::PinConflict(14)))
    ));
}

#[test]
fn init_reports_broken_selector() {
    let clock = Arc::new(SimClock(AtomicI64::new(0)));
    let edges = Arc::new(EdgeTimestamps::new());
    let delay = SimDelay {
        clock: Arc::clone(&clock),
        edges: Arc::clone(&edges),
        script: Arc::default(),
    };
    let pin = RecordingPin::default();
    pin.fail.store(true, Ordering::SeqCst);

    let result = Hlw8012::new(SensorConfig::default(), pin, delay, clock, edges);
    assert!(matches!(
        result,
        Err(SensorError::Init(InitError::PinConfig(12)))
    ));
}
