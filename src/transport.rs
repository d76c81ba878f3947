//! Register-addressed reads and writes over a [`Bus`].
//!
//! Register addresses are 16-bit and go out big-endian ahead of the payload.
//! Nothing here retries and nothing here polls for completion unless asked
//! to through [`RegisterTransport::wait_for_completion`].

use std::time::{Duration, Instant};

use crate::traits::{Bus, BusError, Direction, Operation};

/// Command buffer register that START/STOP frames are written to.
pub const COMMAND_BUFFER: u16 = 0x1D00;
/// Hold variant of the command buffer.
pub const COMMAND_BUFFER_HOLD: u16 = 0x9D00;
/// Addresses with this bit set do not report completion status.
pub const CHECK_ACCESS_BIT: u16 = 0x8000;
/// Status register polled for command completion.
pub const STATUS_REGISTER: u16 = 0x0200;

const BUSY_BIT: u8 = 0x01;
const RESET_BIT: u8 = 0x02;
const ERROR_MASK: u8 = 0xFC;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Error type for register transactions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The bus rejected the transaction.
    #[error("{direction} of {length} bytes at register {register:#06x} failed: {source}")]
    Bus {
        /// Register address of the transaction.
        register: u16,
        /// Transfer direction.
        direction: Direction,
        /// Payload length in bytes.
        length: usize,
        /// Bus failure.
        source: BusError,
    },

    /// The device stayed busy past the deadline.
    #[error("register {register:#06x} still busy after {waited:?}")]
    Timeout {
        /// Register whose completion was awaited.
        register: u16,
        /// Time spent polling.
        waited: Duration,
    },

    /// The device finished but reported a failure.
    #[error("device rejected command: {0}")]
    Rejected(CommandStatus),
}

/// Busy bit of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyState {
    /// Ready for a new command.
    Idle,
    /// Still processing.
    Busy,
}

/// Reset bit of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    /// Last reset succeeded.
    Pass,
    /// Last reset failed.
    Fail,
}

/// Error category reported in the upper six bits of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    /// Wrong command length.
    Length,
    /// Unknown command.
    UnknownCommand,
    /// Hardware fault.
    Hardware,
    /// Unknown subcommand.
    UnknownSubcommand,
    /// Bad parameter.
    Parameter,
    /// Code outside the documented set.
    Unrecognized(u8),
}

impl StatusError {
    const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x00 => None,
            0x04 => Some(Self::Length),
            0x08 => Some(Self::UnknownCommand),
            0x0C => Some(Self::Hardware),
            0x10 => Some(Self::UnknownSubcommand),
            0x14 => Some(Self::Parameter),
            other => Some(Self::Unrecognized(other)),
        }
    }

    const fn bits(self) -> u8 {
        match self {
            Self::Length => 0x04,
            Self::UnknownCommand => 0x08,
            Self::Hardware => 0x0C,
            Self::UnknownSubcommand => 0x10,
            Self::Parameter => 0x14,
            Self::Unrecognized(bits) => bits & ERROR_MASK,
        }
    }
}

/// Decoded status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// Busy bit.
    pub busy: BusyState,
    /// Reset bit.
    pub reset: ResetState,
    /// Error category, `None` on success.
    pub error: Option<StatusError>,
}

impl CommandStatus {
    /// Decode a raw status byte.
    pub const fn from_byte(byte: u8) -> Self {
        Self {
            busy: if byte & BUSY_BIT == 0 {
                BusyState::Idle
            } else {
                BusyState::Busy
            },
            reset: if byte & RESET_BIT == 0 {
                ResetState::Pass
            } else {
                ResetState::Fail
            },
            error: StatusError::from_bits(byte & ERROR_MASK),
        }
    }

    /// Encode back to the raw byte.
    pub const fn to_byte(self) -> u8 {
        let busy = match self.busy {
            BusyState::Idle => 0,
            BusyState::Busy => BUSY_BIT,
        };
        let reset = match self.reset {
            ResetState::Pass => 0,
            ResetState::Fail => RESET_BIT,
        };
        let error = match self.error {
            Some(error) => error.bits(),
            None => 0,
        };
        busy | reset | error
    }

    /// Whether the device finished the last command without error.
    pub const fn is_success(self) -> bool {
        matches!(
            (self.busy, self.reset, self.error),
            (BusyState::Idle, ResetState::Pass, None)
        )
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{:?}", self.busy, self.reset)?;
        if let Some(error) = self.error {
            write!(f, "/{error:?}")?;
        }
        Ok(())
    }
}

/// Addressed register access to one device on a shared bus.
pub struct RegisterTransport<B> {
    bus: B,
    address: u8,
}

impl<B: Bus> RegisterTransport<B> {
    /// Talk to the device at 7-bit `address` over `bus`.
    pub const fn new(bus: B, address: u8) -> Self {
        Self { bus, address }
    }

    /// Device address on the bus.
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// The underlying bus.
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Write `payload` starting at `register` in one transaction.
    pub fn write(&self, register: u16, payload: &[u8]) -> Result<(), TransportError> {
        let mut buffer = Vec::with_capacity(payload.len() + 2);
        buffer.extend_from_slice(&register.to_be_bytes());
        buffer.extend_from_slice(payload);
        tracing::debug!(register, length = payload.len(), "register write");
        self.bus
            .transfer(self.address, &mut [Operation::Write(&buffer)])
            .map_err(|source| TransportError::Bus {
                register,
                direction: Direction::Write,
                length: payload.len(),
                source,
            })
    }

    /// Fill `buffer` from `register` in one address-then-read transaction.
    pub fn read_into(&self, register: u16, buffer: &mut [u8]) -> Result<(), TransportError> {
        let length = buffer.len();
        let address = register.to_be_bytes();
        tracing::debug!(register, length, "register read");
        self.bus
            .transfer(
                self.address,
                &mut [Operation::Write(&address), Operation::Read(buffer)],
            )
            .map_err(|source| TransportError::Bus {
                register,
                direction: Direction::Read,
                length,
                source,
            })
    }

    /// Read `length` bytes from `register`.
    pub fn read(&self, register: u16, length: usize) -> Result<Vec<u8>, TransportError> {
        let mut buffer = vec![0u8; length];
        self.read_into(register, &mut buffer)?;
        Ok(buffer)
    }

    /// Read and decode the status register.
    pub fn read_status(&self) -> Result<CommandStatus, TransportError> {
        let mut byte = [0u8; 1];
        self.read_into(STATUS_REGISTER, &mut byte)?;
        let [status] = byte;
        Ok(CommandStatus::from_byte(status))
    }

    /// Poll the status register until the device is idle.
    ///
    /// Returns the final status on success, [`TransportError::Rejected`] if
    /// the device went idle with a failure, or [`TransportError::Timeout`].
    pub fn wait_for_completion(&self, timeout: Duration) -> Result<CommandStatus, TransportError> {
        let start = Instant::now();
        loop {
            let status = self.read_status()?;
            if status.busy == BusyState::Idle {
                if status.is_success() {
                    return Ok(status);
                }
                return Err(TransportError::Rejected(status));
            }
            let waited = start.elapsed();
            if waited >= timeout {
                tracing::warn!(?waited, %status, "command still busy");
                return Err(TransportError::Timeout {
                    register: STATUS_REGISTER,
                    waited,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// [`write`](Self::write), then wait for completion unless `register`
    /// has [`CHECK_ACCESS_BIT`] set.
    pub fn write_checked(
        &self,
        register: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.write(register, payload)?;
        if register & CHECK_ACCESS_BIT == 0 {
            self.wait_for_completion(timeout)?;
        }
        Ok(())
    }
}
