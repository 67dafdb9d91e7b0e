use super::error::{SensorError, SensorResult, Stage};
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;

/// What the CF1 line currently represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Current,
    Voltage,
}

impl Channel {
    fn select_stage(self) -> Stage {
        match self {
            Channel::Current => Stage::SelectCurrent,
            Channel::Voltage => Stage::SelectVoltage,
        }
    }

    fn settle_stage(self) -> Stage {
        match self {
            Channel::Current => Stage::SettleCurrent,
            Channel::Voltage => Stage::SettleVoltage,
        }
    }
}

/// Owns the SEL pin and the blocking delay used to let CF1 settle.
/// Only one reading may drive it at a time; the sensor keeps it behind its
/// measurement mutex.
pub struct ChannelSelector<P, D> {
    pin: P,
    delay: D,
    settle_ms: u32,
    current_sel_high: bool,
    active: Option<Channel>,
}

impl<P, D> ChannelSelector<P, D>
where
    P: OutputPin,
    D: DelayMs<u32>,
{
    pub fn new(pin: P, delay: D, settle_ms: u32, current_sel_high: bool) -> Self {
        Self {
            pin,
            delay,
            settle_ms,
            current_sel_high,
            active: None,
        }
    }

    /// Drive SEL without waiting. Used at init to park the pin.
    pub fn set_channel(&mut self, channel: Channel) -> SensorResult<()> {
        let high = (channel == Channel::Current) == self.current_sel_high;
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };

        if result.is_err() {
            // The line is in an unknown state now
            self.active = None;
            log::warn!("HLW8012: SEL write failed while selecting {:?}", channel);
            return Err(SensorError::TransientRead(channel.select_stage()));
        }

        self.active = Some(channel);
        Ok(())
    }

    /// Switch CF1 to `channel` and block until its output is trustworthy.
    pub fn select(&mut self, channel: Channel) -> SensorResult<()> {
        self.set_channel(channel)?;
        log::trace!("HLW8012: {:?} -> settling {}ms", channel.settle_stage(), self.settle_ms);
        self.delay.delay_ms(self.settle_ms);
        Ok(())
    }

    pub fn active(&self) -> Option<Channel> {
        self.active
    }

    pub fn settle_ms(&self) -> u32 {
        self.settle_ms
    }
}
