pub mod actuator;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hw;
pub mod messages;
pub mod motor;
pub mod ota;
pub mod runtime;
