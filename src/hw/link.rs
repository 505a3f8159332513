// Serial link to the actuator board
//
// Packet format: [0xFF, 0xFF, Addr, Length, Instruction, Params..., Checksum]
// Every packet sent to a board is answered with a status packet:
// [0xFF, 0xFF, Addr, Length, Error, Params..., Checksum]
//
// Board 0 carries the 16 servo channels, board 1 the next 16 (camera axes),
// GPIO motor pins live on board 0.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use super::{HwError, MotorPins, PwmOutput};

/// Default serial configuration for the actuator board
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Channels per PWM board
pub const CHANNELS_PER_BOARD: u8 = 16;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    SetFrequency = 0x10,
    SetPulse = 0x11,
    PinMode = 0x20,
    WriteDuty = 0x21,
}

pub type Result<T> = std::result::Result<T, HwError>;

/// Serial connection to the actuator board
pub struct PwmLink {
    port: Box<dyn SerialPort>,
}

impl PwmLink {
    /// Open a new connection to the board
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Second handle on the same port, so servos and motors can each own one
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            port: self.port.try_clone()?,
        })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(addr: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(addr);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        let checksum = Self::checksum(&packet[2..]);
        packet.push(checksum);

        packet
    }

    /// Split a global channel into (board address, local channel)
    fn route_channel(channel: u8) -> (u8, u8) {
        (channel / CHANNELS_PER_BOARD, channel % CHANNELS_PER_BOARD)
    }

    /// Send a packet and wait for the status reply
    fn transact(&mut self, addr: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let packet = Self::build_packet(addr, instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        self.read_response(addr)
    }

    /// Read a status packet
    fn read_response(&mut self, expected_addr: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                HwError::Timeout {
                    addr: expected_addr,
                }
            } else {
                HwError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(HwError::InvalidResponse {
                addr: expected_addr,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut addr_length = [0u8; 2];
        self.port.read_exact(&mut addr_length)?;
        let addr = addr_length[0];
        let length = addr_length[1] as usize;

        if addr != expected_addr {
            return Err(HwError::InvalidResponse {
                addr: expected_addr,
                reason: format!("Address mismatch: expected {}, got {}", expected_addr, addr),
            });
        }
        if length < 2 {
            return Err(HwError::InvalidResponse {
                addr,
                reason: format!("Length {} too short", length),
            });
        }

        // error + params + checksum
        let mut remaining = vec![0u8; length];
        self.port.read_exact(&mut remaining)?;

        let mut checksum_data = vec![addr, length as u8];
        checksum_data.extend_from_slice(&remaining[..length - 1]);
        if Self::checksum(&checksum_data) != remaining[length - 1] {
            return Err(HwError::ChecksumMismatch { addr });
        }

        let status = remaining[0];
        if status != 0 {
            return Err(HwError::DeviceError { addr, status });
        }

        Ok(remaining[1..length - 1].to_vec())
    }

    /// Ping a board to check it is connected
    pub fn ping(&mut self, addr: u8) -> Result<bool> {
        match self.transact(addr, Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(HwError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl PwmOutput for PwmLink {
    fn set_frequency(&mut self, hz: u16) -> Result<()> {
        // Both PWM boards run at the same frequency
        for addr in 0..2 {
            debug!("Set PWM frequency on board {}: {} Hz", addr, hz);
            self.transact(addr, Instruction::SetFrequency, &hz.to_le_bytes())?;
        }
        Ok(())
    }

    fn set_pulse(&mut self, channel: u8, pulse: u16) -> Result<()> {
        let (addr, local) = Self::route_channel(channel);
        let [lo, hi] = pulse.to_le_bytes();
        debug!("Set pulse on board {} channel {}: {}", addr, local, pulse);
        self.transact(addr, Instruction::SetPulse, &[local, lo, hi])?;
        Ok(())
    }
}

impl MotorPins for PwmLink {
    fn configure_output(&mut self, pin: u8) -> Result<()> {
        debug!("Configure pin {} as output", pin);
        self.transact(0, Instruction::PinMode, &[pin, 1])?;
        Ok(())
    }

    fn write_duty(&mut self, pin: u8, duty: u8) -> Result<()> {
        debug!("Write duty to pin {}: {}", pin, duty);
        self.transact(0, Instruction::WriteDuty, &[pin, duty])?;
        Ok(())
    }
}
