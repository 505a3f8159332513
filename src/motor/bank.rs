// Signed speed control for the drive motors
//
// Each motor is a forward/reverse pin pair. The sign of the speed picks the
// pin, the magnitude is its duty; the other pin is held at 0. The inactive
// pin is always written before the active one.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::{MOTOR_SPEED_MAX, MotorPinConfig};
use crate::error::{ControlError, Result};
use crate::hw::MotorPins;

/// One drive motor: its pin pair and last applied speed
#[derive(Debug, Clone, PartialEq)]
pub struct MotorChannel {
    pub name: String,
    pub forward_pin: u8,
    pub reverse_pin: u8,
    pub speed: i16,
}

/// Duties for (forward pin, reverse pin) at a signed speed
pub fn pin_duties(speed: i16) -> (u8, u8) {
    let speed = speed.clamp(-MOTOR_SPEED_MAX, MOTOR_SPEED_MAX);
    let magnitude = speed.unsigned_abs() as u8;
    match speed {
        s if s > 0 => (magnitude, 0),
        s if s < 0 => (0, magnitude),
        _ => (0, 0),
    }
}

pub struct MotorBank<M: MotorPins> {
    pins: M,
    channels: Vec<MotorChannel>,
}

impl<M: MotorPins> MotorBank<M> {
    /// Bind the pin pairs; nothing is written until `initialize`
    pub fn new(pins: M, motors: &[MotorPinConfig]) -> Self {
        let channels = motors
            .iter()
            .map(|m| MotorChannel {
                name: m.name.clone(),
                forward_pin: m.forward_pin,
                reverse_pin: m.reverse_pin,
                speed: 0,
            })
            .collect();
        Self { pins, channels }
    }

    /// Configure every pin as an output, then stop all motors
    pub fn initialize(&mut self) -> Result<()> {
        info!("Initializing {} drive motors", self.channels.len());
        for ch in &self.channels {
            self.pins.configure_output(ch.forward_pin)?;
            self.pins.configure_output(ch.reverse_pin)?;
        }
        self.stop_all()?;
        info!("Motors initialized (stopped)");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[MotorChannel] {
        &self.channels
    }

    /// Channel index of a named motor
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|ch| ch.name == name)
    }

    /// Validate a speed for a channel without applying it
    pub fn check_speed(&self, channel: usize, speed: i64) -> Result<i16> {
        let ch = self
            .channels
            .get(channel)
            .ok_or(ControlError::InvalidChannelId(channel as i64))?;
        if !(-(MOTOR_SPEED_MAX as i64)..=MOTOR_SPEED_MAX as i64).contains(&speed) {
            return Err(ControlError::InvalidMotorSpeed {
                motor: ch.name.clone(),
                speed,
            });
        }
        Ok(speed as i16)
    }

    /// Drive a motor at a signed speed in -255..=255
    pub fn set_speed(&mut self, channel: usize, speed: i64) -> Result<()> {
        let speed = self.check_speed(channel, speed)?;
        let (forward, reverse) = pin_duties(speed);

        let ch = &mut self.channels[channel];
        let (idle, (active, duty)) = if forward > 0 {
            (ch.reverse_pin, (ch.forward_pin, forward))
        } else {
            (ch.forward_pin, (ch.reverse_pin, reverse))
        };
        self.pins.write_duty(idle, 0)?;
        if let Err(e) = self.pins.write_duty(active, duty) {
            // The motor is no longer driven in its old direction
            ch.speed = 0;
            return Err(e.into());
        }

        debug!("{} speed set to {}", ch.name, speed);
        ch.speed = speed;
        Ok(())
    }

    /// Last applied speed; 0 for an unknown channel
    pub fn speed(&self, channel: usize) -> i16 {
        self.channels.get(channel).map_or(0, |ch| ch.speed)
    }

    /// Speed of every motor keyed by name
    pub fn speeds(&self) -> BTreeMap<String, i16> {
        self.channels
            .iter()
            .map(|ch| (ch.name.clone(), ch.speed))
            .collect()
    }

    /// Zero every motor.
    ///
    /// Every pin is written even if an earlier write fails; the stored speeds
    /// are zero afterwards either way and the first failure is returned.
    pub fn stop_all(&mut self) -> Result<()> {
        info!("Stopping all motors");
        let mut first_error = None;
        for ch in &mut self.channels {
            ch.speed = 0;
            for pin in [ch.forward_pin, ch.reverse_pin] {
                if let Err(e) = self.pins.write_duty(pin, 0) {
                    warn!("Failed to zero pin {} of {}: {}", pin, ch.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl<M: MotorPins> Drop for MotorBank<M> {
    fn drop(&mut self) {
        // Leave the motors stopped when the bank goes away
        if let Err(e) = self.stop_all() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
