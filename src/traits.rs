//! Core traits and types at the seams of the sensor driver.
//!
//! The driver consumes a [`Bus`] (the raw addressed transaction primitive) and
//! exposes [`SensorSubdevice`] to a host video pipeline.

use crate::command::CommandKind;
use crate::modes::{
    BusConfig, Fraction, FrameInterval, FrameSizeDescriptor, NegotiatedFormat, PixelEncoding,
};
use crate::transport::TransportError;

/// Pixel format representation (e.g., YUYV, UYVY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed, luma first).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// UYVY pixel format (4:2:2 packed, chroma first).
    pub const UYVY: Self = Self::new(b"UYVY");
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Failure reported by the bus primitive for a whole transaction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The addressed device did not acknowledge.
    #[error("no acknowledge")]
    NoAcknowledge,

    /// Another controller won bus arbitration.
    #[error("arbitration lost")]
    ArbitrationLoss,

    /// Bus-level protocol violation or timeout.
    #[error("bus error")]
    Bus,

    /// The controller could not keep up with the data rate.
    #[error("overrun")]
    Overrun,

    /// Any other controller failure.
    #[error("{0}")]
    Other(String),
}

/// One leg of a bus transaction.
#[derive(Debug)]
pub enum Operation<'a> {
    /// Send these bytes to the device.
    Write(&'a [u8]),
    /// Fill this buffer from the device.
    Read(&'a mut [u8]),
}

/// Transfer direction, carried in transport errors for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device.
    Write,
    /// Device to host.
    Read,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// Abstraction over the raw control-bus primitive.
///
/// Each call performs every operation as one atomic transaction relative to
/// other callers of the same bus. Implementations serialize internally, so
/// the driver can share a bus between the streaming state machine and raw
/// register access.
pub trait Bus: Send + Sync {
    /// Run `operations` against the device at 7-bit `address`.
    fn transfer(
        &self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> std::result::Result<(), BusError>;
}

/// Error type for sensor operations.
#[derive(thiserror::Error, Debug)]
pub enum SensorError {
    /// An enumeration or table index was out of range.
    #[error("index {0} out of range")]
    InvalidIndex(u32),

    /// A caller-supplied argument was rejected before any bus traffic.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The active format cannot change while streaming.
    #[error("device busy: stop streaming first")]
    Busy,

    /// A register transaction failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A command frame was sent but the transport reported failure.
    #[error("{command} command failed: {source}")]
    Device {
        /// Which command was being sent.
        command: CommandKind,
        /// The underlying transport failure.
        source: TransportError,
    },
}

/// Result type for sensor operations.
pub type Result<T> = std::result::Result<T, SensorError>;

/// Which copy of the pad format an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatWhich {
    /// The committed format that drives the device.
    Active,
    /// A scratch copy used to check compatibility.
    Trial,
}

/// Video-negotiation calls a host pipeline makes on the sensor.
pub trait SensorSubdevice {
    /// Pixel encoding of the mode table entry at `index`.
    fn enumerate_encodings(&self, index: u32) -> Result<PixelEncoding>;

    /// Frame size descriptor at `index`.
    fn enumerate_frame_sizes(&self, index: u32) -> Result<FrameSizeDescriptor>;

    /// Frame interval of the entry at `index`, which must use `encoding`.
    fn enumerate_frame_intervals(&self, index: u32, encoding: PixelEncoding)
        -> Result<FrameInterval>;

    /// Current active or trial format.
    fn format(&self, which: FormatWhich) -> NegotiatedFormat;

    /// Negotiate `requested` against the mode table. Returns the snapped format.
    fn set_format(&self, requested: &NegotiatedFormat, which: FormatWhich)
        -> Result<NegotiatedFormat>;

    /// Start or stop streaming.
    fn set_streaming(&self, on: bool) -> Result<()>;

    /// Frame interval of the active frame size.
    fn frame_interval(&self) -> Fraction;

    /// Physical bus kind and sync polarities for the configured mode.
    fn bus_config(&self) -> BusConfig;
}
