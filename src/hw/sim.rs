// In-memory actuator board
//
// Used when hardware is disabled and as the fake board in tests. Clones share
// the same state, so a test can keep a handle while the registry owns another.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::link::CHANNELS_PER_BOARD;
use super::{HwError, MotorPins, PwmOutput};

/// One recorded hardware write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimWrite {
    Pulse { channel: u8, pulse: u16 },
    Duty { pin: u8, duty: u8 },
    Hold(Duration),
}

#[derive(Debug, Default)]
struct SimState {
    frequency_hz: Option<u16>,
    pulses: BTreeMap<u8, u16>,
    duties: BTreeMap<u8, u8>,
    outputs: BTreeSet<u8>,
    failing_channels: BTreeSet<u8>,
    failing_pins: BTreeSet<u8>,
    log: Vec<SimWrite>,
}

#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn frequency(&self) -> Option<u16> {
        self.state().frequency_hz
    }

    /// Last pulse written to a channel
    pub fn pulse(&self, channel: u8) -> Option<u16> {
        self.state().pulses.get(&channel).copied()
    }

    /// Last duty written to a pin
    pub fn duty(&self, pin: u8) -> Option<u8> {
        self.state().duties.get(&pin).copied()
    }

    pub fn is_output(&self, pin: u8) -> bool {
        self.state().outputs.contains(&pin)
    }

    /// Every write since creation (or the last `clear_log`), in order
    pub fn log(&self) -> Vec<SimWrite> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    /// Make every later write to a pulse channel time out
    pub fn fail_channel(&self, channel: u8) {
        self.state().failing_channels.insert(channel);
    }

    /// Make every later duty write to a pin time out
    pub fn fail_pin(&self, pin: u8) {
        self.state().failing_pins.insert(pin);
    }
}

impl PwmOutput for SimBackend {
    fn set_frequency(&mut self, hz: u16) -> Result<(), HwError> {
        self.state().frequency_hz = Some(hz);
        Ok(())
    }

    fn set_pulse(&mut self, channel: u8, pulse: u16) -> Result<(), HwError> {
        debug!("sim: channel {} <- pulse {}", channel, pulse);
        let mut state = self.state();
        if state.failing_channels.contains(&channel) {
            return Err(HwError::Timeout {
                addr: channel / CHANNELS_PER_BOARD,
            });
        }
        state.pulses.insert(channel, pulse);
        state.log.push(SimWrite::Pulse { channel, pulse });
        Ok(())
    }

    fn hold(&mut self, duration: Duration) {
        // Recorded, not slept
        self.state().log.push(SimWrite::Hold(duration));
    }
}

impl MotorPins for SimBackend {
    fn configure_output(&mut self, pin: u8) -> Result<(), HwError> {
        self.state().outputs.insert(pin);
        Ok(())
    }

    fn write_duty(&mut self, pin: u8, duty: u8) -> Result<(), HwError> {
        let mut state = self.state();
        if !state.outputs.contains(&pin) {
            return Err(HwError::PinNotConfigured(pin));
        }
        if state.failing_pins.contains(&pin) {
            return Err(HwError::Timeout { addr: 0 });
        }
        debug!("sim: pin {} <- duty {}", pin, duty);
        state.duties.insert(pin, duty);
        state.log.push(SimWrite::Duty { pin, duty });
        Ok(())
    }
}
