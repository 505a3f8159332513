// Drive motors for the wheeled base
//
// Provides:
// - MotorBank: signed speed state and forward/reverse pin patterns
// - Tank-drive mixing (throttle/steering -> per-side speeds)

mod bank;
pub mod kinematics;

pub use bank::{MotorBank, MotorChannel, pin_duties};
pub use kinematics::{SideSpeeds, sync_drive, tank_mix};
