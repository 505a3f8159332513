// Hardware seam for the actuator board
//
// Provides:
// - PwmOutput: pulse-width outputs (servo driver channels, camera axes)
// - MotorPins: forward/reverse motor pins driven with a duty cycle
// - PwmLink: serial link to the actuator board
// - SimBackend: in-memory board used for simulation and tests

pub mod link;
pub mod sim;

use std::time::Duration;

pub use link::PwmLink;
pub use sim::SimBackend;

/// Error types for talking to the actuator board
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from board {addr}: {reason}")]
    InvalidResponse { addr: u8, reason: String },

    #[error("Checksum mismatch for board {addr}")]
    ChecksumMismatch { addr: u8 },

    #[error("Board {addr} returned error status: 0x{status:02X}")]
    DeviceError { addr: u8, status: u8 },

    #[error("Timeout waiting for response from board {addr}")]
    Timeout { addr: u8 },

    #[error("Pin {0} is not configured as an output")]
    PinNotConfigured(u8),
}

/// Pulse-width outputs (4096-step duty counts at the configured frequency)
pub trait PwmOutput {
    /// Set the PWM frequency of every output
    fn set_frequency(&mut self, hz: u16) -> Result<(), HwError>;

    /// Write a pulse value to a channel
    fn set_pulse(&mut self, channel: u8, pulse: u16) -> Result<(), HwError>;

    /// Block the caller while an output holds its pulse
    fn hold(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Digital outputs driven with an 8-bit duty cycle
pub trait MotorPins {
    fn configure_output(&mut self, pin: u8) -> Result<(), HwError>;

    fn write_duty(&mut self, pin: u8, duty: u8) -> Result<(), HwError>;
}

impl<T: PwmOutput + ?Sized> PwmOutput for Box<T> {
    fn set_frequency(&mut self, hz: u16) -> Result<(), HwError> {
        (**self).set_frequency(hz)
    }

    fn set_pulse(&mut self, channel: u8, pulse: u16) -> Result<(), HwError> {
        (**self).set_pulse(channel, pulse)
    }

    fn hold(&mut self, duration: Duration) {
        (**self).hold(duration)
    }
}

impl<T: MotorPins + ?Sized> MotorPins for Box<T> {
    fn configure_output(&mut self, pin: u8) -> Result<(), HwError> {
        (**self).configure_output(pin)
    }

    fn write_duty(&mut self, pin: u8, duty: u8) -> Result<(), HwError> {
        (**self).write_duty(pin, duty)
    }
}
