//! AC020: A command-protocol driver for the AC020 image sensor module
//!
//! This library negotiates video formats against the module's fixed mode
//! table and drives its START/STOP command protocol over a register-addressed
//! control bus. The bus is a trait, enabling both production use with an
//! `embedded-hal` I2C controller and testing with simulated buses.

pub mod command;
pub mod config;
pub mod crc;
pub mod device;
pub mod gateway;
pub mod i2c;
pub mod modes;
pub mod traits;
pub mod transport;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use command::{CommandFrame, CommandKind, FrameParams, HexBytes};
pub use config::{ConfigError, Facing, SensorConfig};
pub use device::{Ac020, StreamState, TestPattern};
pub use gateway::{AccessRequest, AccessResponse, ModuleInfo, RegisterGateway, RegisterRequest};
pub use i2c::I2cBus;
pub use modes::{Fraction, FrameSizeDescriptor, Mode, NegotiatedFormat, PixelEncoding};
pub use traits::{Bus, BusError, FormatWhich, Operation, SensorError, SensorSubdevice};
pub use transport::{CommandStatus, RegisterTransport, TransportError};
