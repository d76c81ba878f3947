//! AC020 format negotiation and streaming state machine.
//!
//! One [`Ac020`] drives one module. Negotiation, start and stop all run under
//! the instance lock, bus transaction included, so a format change can never
//! interleave with a START/STOP write.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::command::{CommandFrame, CommandKind, FrameParams};
use crate::config::SensorConfig;
use crate::gateway::{AccessRequest, AccessResponse, RegisterGateway};
use crate::modes::{
    self, BusConfig, Fraction, FrameInterval, FrameSizeDescriptor, Mode, NegotiatedFormat,
    PixelEncoding, Rect, SelectionTarget, VideoStandard,
};
use crate::traits::{Bus, FormatWhich, Result, SensorError, SensorSubdevice};
use crate::transport::{CommandStatus, RegisterTransport, COMMAND_BUFFER};

/// Driver name, also the suffix of subdevice names.
pub const SENSOR_NAME: &str = "ac020";
/// Pixel rate reported to the host, in pixels per second.
pub const PIXEL_RATE: u64 = 96_000_000;
/// Default deadline for [`Ac020::wait_for_completion`] callers.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Whether the module is currently emitting video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No START outstanding.
    Idle,
    /// START sent and acknowledged by the transport.
    Streaming,
}

/// Test pattern menu. The module has no pattern generator; selections are
/// accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPattern {
    /// Live video.
    #[default]
    Disabled,
    /// Vertical color bars.
    VerticalColorBars,
}

struct State {
    frame_size: Mode,
    format: NegotiatedFormat,
    trial: NegotiatedFormat,
    stream: StreamState,
}

/// AC020 module bound to a bus address.
pub struct Ac020<B> {
    transport: RegisterTransport<B>,
    config: SensorConfig,
    state: Mutex<State>,
}

impl<B: Bus> Ac020<B> {
    /// Bind to the module at `address` on `bus`.
    ///
    /// The active format starts at the configured mode's frame size.
    pub fn new(bus: B, address: u8, config: SensorConfig) -> Self {
        let format = NegotiatedFormat::from(config.mode.frame_size());
        tracing::info!(mode = %config.mode, address, "ac020 bound");
        Self {
            transport: RegisterTransport::new(bus, address),
            state: Mutex::new(State {
                frame_size: config.mode,
                format,
                trial: format,
                stream: StreamState::Idle,
            }),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Instance configuration.
    pub const fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Configured operating mode.
    pub const fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Register transport used for commands.
    pub const fn transport(&self) -> &RegisterTransport<B> {
        &self.transport
    }

    /// Current stream state.
    pub fn stream_state(&self) -> StreamState {
        self.state().stream
    }

    /// Table entry backing the active format.
    pub fn active_frame_size(&self) -> &'static FrameSizeDescriptor {
        self.state().frame_size.frame_size()
    }

    /// Snap `requested` to the closest table entry.
    ///
    /// A trial negotiation only updates the trial copy. An active one fails
    /// with [`SensorError::Busy`] while streaming and otherwise commits.
    pub fn negotiate(
        &self,
        requested: &NegotiatedFormat,
        which: FormatWhich,
    ) -> Result<NegotiatedFormat> {
        let mut state = self.state();
        let (matched, descriptor) = modes::best_match(requested.width, requested.height);
        let format = NegotiatedFormat::from(descriptor);

        match which {
            FormatWhich::Trial => state.trial = format,
            FormatWhich::Active => {
                if state.stream == StreamState::Streaming {
                    tracing::warn!("format change rejected while streaming");
                    return Err(SensorError::Busy);
                }
                state.frame_size = matched;
                state.format = format;
            }
        }

        tracing::info!(
            width = format.width,
            height = format.height,
            ?which,
            "format negotiated"
        );
        Ok(format)
    }

    /// Send START unless already streaming or the mode needs no commands.
    pub fn start_streaming(&self) -> Result<()> {
        self.transition(CommandKind::Start, StreamState::Streaming)
    }

    /// Send STOP unless already idle or the mode needs no commands.
    pub fn stop_streaming(&self) -> Result<()> {
        self.transition(CommandKind::Stop, StreamState::Idle)
    }

    fn transition(&self, kind: CommandKind, target: StreamState) -> Result<()> {
        if self.config.mode.is_stream_exempt() {
            tracing::debug!(mode = %self.config.mode, %kind, "mode streams without commands");
            return Ok(());
        }

        let mut state = self.state();
        if state.stream == target {
            return Ok(());
        }

        let frame = CommandFrame::build(kind, &self.frame_params(&state));
        if let Err(source) = self.transport.write(COMMAND_BUFFER, frame.as_bytes()) {
            tracing::error!(%kind, error = %source, "failed to send command");
            return Err(SensorError::Device {
                command: kind,
                source,
            });
        }

        state.stream = target;
        tracing::info!(
            %kind,
            width = frame.width(),
            height = frame.height(),
            "command sent"
        );
        Ok(())
    }

    fn frame_params(&self, state: &State) -> FrameParams {
        let descriptor = state.frame_size.frame_size();
        FrameParams {
            mode: self.config.mode,
            width: descriptor.width,
            height: descriptor.height,
            frame_rate: self.config.frame_rate,
            pixel_type: self.config.pixel_type,
        }
    }

    /// The frame [`start_streaming`](Self::start_streaming) would send now.
    pub fn pending_frame(&self, kind: CommandKind) -> CommandFrame {
        let state = self.state();
        CommandFrame::build(kind, &self.frame_params(&state))
    }

    /// Analog standard of the configured mode.
    pub fn query_standard(&self) -> Option<VideoStandard> {
        let standard = self.config.mode.video_standard();
        tracing::info!(mode = %self.config.mode, ?standard, "standard queried");
        standard
    }

    /// Crop rectangle for `target`. Only the BT.1120 mode crops.
    pub fn crop(&self, target: SelectionTarget) -> Result<Rect> {
        match (target, self.config.mode.crop_bounds()) {
            (
                SelectionTarget::Crop | SelectionTarget::CropDefault | SelectionTarget::CropBounds,
                Some(rect),
            ) => Ok(rect),
            _ => Err(SensorError::InvalidArgument(format!(
                "no {target:?} selection in mode {}",
                self.config.mode
            ))),
        }
    }

    /// Pixel rate in pixels per second.
    #[allow(clippy::unused_self)]
    pub const fn pixel_rate(&self) -> u64 {
        PIXEL_RATE
    }

    /// Accept a test pattern selection. Nothing is sent to the module.
    pub fn set_test_pattern(&self, pattern: TestPattern) {
        tracing::debug!(module = self.config.module_index, ?pattern, "test pattern ignored");
    }

    /// Host-visible subdevice name, e.g. `m00_b_ac020`.
    pub fn subdevice_name(&self) -> String {
        format!(
            "m{:02}_{}_{SENSOR_NAME}",
            self.config.module_index,
            self.config.module_facing.tag()
        )
    }

    /// Raw register access bound to this module.
    pub const fn gateway(&self) -> RegisterGateway<'_, B> {
        RegisterGateway::new(&self.transport, &self.config)
    }

    /// Shared entry point for module info and raw register access.
    pub fn access(&self, request: AccessRequest<'_>) -> Result<AccessResponse> {
        self.gateway().access(request)
    }

    /// Poll the status register until the last command finishes.
    pub fn wait_for_completion(&self, timeout: Duration) -> Result<CommandStatus> {
        Ok(self.transport.wait_for_completion(timeout)?)
    }
}

impl<B: Bus> SensorSubdevice for Ac020<B> {
    fn enumerate_encodings(&self, index: u32) -> Result<PixelEncoding> {
        Ok(modes::frame_size(index)?.encoding)
    }

    fn enumerate_frame_sizes(&self, index: u32) -> Result<FrameSizeDescriptor> {
        modes::frame_size(index).copied()
    }

    fn enumerate_frame_intervals(
        &self,
        index: u32,
        encoding: PixelEncoding,
    ) -> Result<FrameInterval> {
        let descriptor = modes::frame_size(index)?;
        if descriptor.encoding != encoding {
            return Err(SensorError::InvalidArgument(format!(
                "entry {index} does not use {encoding:?}"
            )));
        }
        Ok(FrameInterval {
            width: descriptor.width,
            height: descriptor.height,
            encoding,
            interval: descriptor.max_frame_rate.reciprocal(),
        })
    }

    fn format(&self, which: FormatWhich) -> NegotiatedFormat {
        let state = self.state();
        match which {
            FormatWhich::Active => state.format,
            FormatWhich::Trial => state.trial,
        }
    }

    fn set_format(
        &self,
        requested: &NegotiatedFormat,
        which: FormatWhich,
    ) -> Result<NegotiatedFormat> {
        self.negotiate(requested, which)
    }

    fn set_streaming(&self, on: bool) -> Result<()> {
        if on {
            self.start_streaming()
        } else {
            self.stop_streaming()
        }
    }

    fn frame_interval(&self) -> Fraction {
        self.active_frame_size().max_frame_rate.reciprocal()
    }

    fn bus_config(&self) -> BusConfig {
        self.config.mode.bus_config()
    }
}
