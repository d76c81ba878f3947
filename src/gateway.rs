//! Raw register access for external callers.
//!
//! Requests here go straight to the [`RegisterTransport`] and never take the
//! device's state lock, so they can patch registers while streaming. Callers
//! that touch the command buffer while the state machine is active must
//! serialize on their own.

use crate::config::SensorConfig;
use crate::device::SENSOR_NAME;
use crate::traits::{Bus, Result, SensorError};
use crate::transport::RegisterTransport;

/// Register access request, laid out like the vendor control structure.
///
/// Only `index` (register address) and `length` drive the transfer. The
/// remaining fields are carried for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterRequest {
    /// Request type byte.
    pub request_type: u8,
    /// Request byte.
    pub request: u8,
    /// Value word.
    pub value: u16,
    /// Register address.
    pub index: u16,
    /// Number of bytes to transfer.
    pub length: u16,
    /// Caller-side timeout in milliseconds.
    pub timeout_ms: u32,
}

impl RegisterRequest {
    /// Request covering `length` bytes at `register`.
    pub const fn new(register: u16, length: u16) -> Self {
        Self {
            request_type: 0,
            request: 0,
            value: 0,
            index: register,
            length,
            timeout_ms: 0,
        }
    }
}

/// Static identification strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Sensor driver name.
    pub sensor: String,
    /// Camera module name.
    pub module: String,
    /// Lens name.
    pub lens: String,
}

/// A call through the shared access entry point.
#[derive(Debug)]
pub enum AccessRequest<'a> {
    /// Query identification strings.
    ModuleInfo,
    /// Read `request.length` bytes into `buffer`.
    Get {
        /// Address and length.
        request: RegisterRequest,
        /// Destination, at least `request.length` bytes.
        buffer: Option<&'a mut [u8]>,
    },
    /// Write the first `request.length` bytes of `data`.
    Set {
        /// Address and length.
        request: RegisterRequest,
        /// Source, at least `request.length` bytes.
        data: Option<&'a [u8]>,
    },
}

/// Result of an [`AccessRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessResponse {
    /// Identification strings.
    ModuleInfo(ModuleInfo),
    /// Number of bytes copied into the caller's buffer.
    Read(usize),
    /// Number of bytes written to the device.
    Written(usize),
}

/// Bulk register get/set bound to one device.
pub struct RegisterGateway<'a, B> {
    transport: &'a RegisterTransport<B>,
    config: &'a SensorConfig,
}

impl<'a, B: Bus> RegisterGateway<'a, B> {
    /// Gateway over `transport`, reporting identification from `config`.
    pub const fn new(transport: &'a RegisterTransport<B>, config: &'a SensorConfig) -> Self {
        Self { transport, config }
    }

    /// Read `length` bytes starting at `register`.
    pub fn get_registers(&self, register: u16, length: usize) -> Result<Vec<u8>> {
        if length == 0 {
            return Err(SensorError::InvalidArgument(
                "register read length must be non-zero".to_owned(),
            ));
        }
        Ok(self.transport.read(register, length)?)
    }

    /// Write `data` starting at `register`.
    pub fn set_registers(&self, register: u16, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(SensorError::InvalidArgument(
                "register write needs at least one byte".to_owned(),
            ));
        }
        Ok(self.transport.write(register, data)?)
    }

    /// Identification strings.
    pub fn module_info(&self) -> ModuleInfo {
        ModuleInfo {
            sensor: SENSOR_NAME.to_owned(),
            module: self.config.module_name.clone(),
            lens: self.config.lens_name.clone(),
        }
    }

    /// Dispatch one request from the shared entry point.
    pub fn access(&self, request: AccessRequest<'_>) -> Result<AccessResponse> {
        match request {
            AccessRequest::ModuleInfo => Ok(AccessResponse::ModuleInfo(self.module_info())),
            AccessRequest::Get { request, buffer } => {
                let length = usize::from(request.length);
                let destination = buffer
                    .and_then(|buffer| buffer.get_mut(..length))
                    .ok_or_else(|| bad_buffer(&request))?;
                tracing::debug!(register = request.index, length, "register get");
                let data = self.get_registers(request.index, length)?;
                destination.copy_from_slice(&data);
                Ok(AccessResponse::Read(length))
            }
            AccessRequest::Set { request, data } => {
                let length = usize::from(request.length);
                if length == 0 {
                    return Err(bad_buffer(&request));
                }
                let source = data
                    .and_then(|data| data.get(..length))
                    .ok_or_else(|| bad_buffer(&request))?;
                tracing::debug!(register = request.index, length, "register set");
                self.set_registers(request.index, source)?;
                Ok(AccessResponse::Written(length))
            }
        }
    }
}

fn bad_buffer(request: &RegisterRequest) -> SensorError {
    tracing::error!(
        register = request.index,
        length = request.length,
        "register access arguments rejected"
    );
    SensorError::InvalidArgument(format!(
        "missing or short buffer for {} bytes at register {:#06x}",
        request.length, request.index
    ))
}
