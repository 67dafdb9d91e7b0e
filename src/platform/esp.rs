//! ESP-IDF wiring: GPIO ISR service, CF/CF1 edge handlers, SEL PinDriver.

use super::{PinClaim, PinRegistry};
use crate::hlw8012::{
    EdgeTimestamps, Hlw8012, InitError, Line, MonotonicClock, SensorConfig, SensorResult,
};
use core::ffi::c_void;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_sys::{self as sys, esp};
use std::ops::Deref;
use std::sync::Arc;

pub type EspSensor = Hlw8012<PinDriver<'static, AnyOutputPin, Output>, FreeRtos, EspClock>;

static PIN_REGISTRY: PinRegistry = PinRegistry::new();

/// `esp_timer_get_time()`, safe to call from ISRs
#[derive(Debug, Clone, Copy, Default)]
pub struct EspClock;

impl MonotonicClock for EspClock {
    fn now_us(&self) -> i64 {
        unsafe { sys::esp_timer_get_time() }
    }
}

// ISR context: one timestamp read, one atomic store, nothing else.
unsafe extern "C" fn on_cf_edge(arg: *mut c_void) {
    let edges = &*(arg as *const EdgeTimestamps);
    edges.record(Line::Cf, sys::esp_timer_get_time());
}

unsafe extern "C" fn on_cf1_edge(arg: *mut c_void) {
    let edges = &*(arg as *const EdgeTimestamps);
    edges.record(Line::Cf1, sys::esp_timer_get_time());
}

/// Registered CF/CF1 handlers. Keeps the timestamps alive for as long as the
/// ISRs may write to them and unregisters the handlers on drop.
pub struct EdgeCapture {
    edges: Arc<EdgeTimestamps>,
    installed: Vec<i32>,
}

impl EdgeCapture {
    pub fn install(
        cf_pin: i32,
        cf1_pin: i32,
        edges: Arc<EdgeTimestamps>,
    ) -> Result<Self, InitError> {
        install_isr_service()?;

        let mut capture = Self {
            edges,
            installed: Vec::with_capacity(2),
        };
        // Any early return drops `capture`, which removes what was installed
        capture.add(cf_pin, on_cf_edge)?;
        capture.add(cf1_pin, on_cf1_edge)?;

        log::info!(
            "HLW8012: Edge interrupts armed on CF=GPIO{} CF1=GPIO{}",
            cf_pin,
            cf1_pin
        );
        Ok(capture)
    }

    fn add(
        &mut self,
        pin: i32,
        handler: unsafe extern "C" fn(*mut c_void),
    ) -> Result<(), InitError> {
        let io_conf = sys::gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: sys::gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: sys::gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: sys::gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: sys::gpio_int_type_t_GPIO_INTR_POSEDGE,
            ..Default::default()
        };
        esp!(unsafe { sys::gpio_config(&io_conf) }).map_err(|err| {
            log::error!("HLW8012: GPIO{} config failed: {}", pin, err);
            InitError::PinConfig(pin)
        })?;

        // Safety: the pointer targets `self.edges`, which outlives the
        // handler because Drop removes the handler first
        let arg = Arc::as_ptr(&self.edges) as *mut c_void;
        esp!(unsafe { sys::gpio_isr_handler_add(pin, Some(handler), arg) }).map_err(|err| {
            log::error!("HLW8012: GPIO{} handler install failed: {}", pin, err);
            InitError::HandlerInstall(pin)
        })?;

        self.installed.push(pin);
        Ok(())
    }
}

impl Drop for EdgeCapture {
    fn drop(&mut self) {
        for &pin in &self.installed {
            unsafe {
                sys::gpio_intr_disable(pin);
                sys::gpio_isr_handler_remove(pin);
            }
        }
        log::info!("HLW8012: Edge interrupts removed");
    }
}

fn install_isr_service() -> Result<(), InitError> {
    match esp!(unsafe { sys::gpio_install_isr_service(0) }) {
        Ok(()) => Ok(()),
        Err(err) if err.code() == sys::ESP_ERR_INVALID_STATE as sys::esp_err_t => {
            log::warn!("HLW8012: GPIO ISR service already installed, sharing it");
            Ok(())
        }
        Err(err) => {
            log::error!("HLW8012: GPIO ISR service install failed: {}", err);
            Err(InitError::IsrService)
        }
    }
}

/// Driver plus the hardware resources it depends on. Derefs to the sensor.
pub struct EspHlw8012 {
    sensor: EspSensor,
    _capture: EdgeCapture,
    _claim: PinClaim<'static>,
}

impl Deref for EspHlw8012 {
    type Target = EspSensor;

    fn deref(&self) -> &Self::Target {
        &self.sensor
    }
}

/// Claim the pins, arm the CF/CF1 interrupts and bring up SEL.
pub fn init(config: SensorConfig) -> SensorResult<EspHlw8012> {
    config.validate()?;
    let claim = PIN_REGISTRY.claim(&config.pins())?;

    let edges = Arc::new(EdgeTimestamps::new());
    let capture = EdgeCapture::install(config.cf_pin, config.cf1_pin, Arc::clone(&edges))?;

    // Safety: the pin number was validated and claimed above
    let sel_pin = unsafe { AnyOutputPin::new(config.sel_pin) };
    let sel = PinDriver::output(sel_pin).map_err(|err| {
        log::error!("HLW8012: SEL GPIO{} setup failed: {}", config.sel_pin, err);
        InitError::PinConfig(config.sel_pin)
    })?;

    let sensor = Hlw8012::new(config, sel, FreeRtos, EspClock, edges)?;

    Ok(EspHlw8012 {
        sensor,
        _capture: capture,
        _claim: claim,
    })
}
