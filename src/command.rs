//! START/STOP command frames.
//!
//! A frame is a fixed 28-byte buffer written to the command register. It
//! carries two checksums: an inner CRC over the 10-byte payload and an outer
//! CRC over the 16-byte header, which includes the inner CRC. Every build
//! starts from a fresh copy of the template and recomputes both.

use crate::crc::crc16;
use crate::modes::Mode;

/// Length of a command frame in bytes.
pub const FRAME_LEN: usize = 28;

/// Inner CRC field (little-endian).
pub const INNER_CRC_OFFSET: usize = 14;
/// Outer CRC field (little-endian).
pub const OUTER_CRC_OFFSET: usize = 16;
/// Start of the payload covered by the inner CRC.
pub const PAYLOAD_OFFSET: usize = 18;
/// Length of the payload covered by the inner CRC.
pub const PAYLOAD_LEN: usize = 10;
/// Length of the header covered by the outer CRC.
pub const HEADER_LEN: usize = 16;

/// Opcode byte inside the header.
pub const OPCODE_OFFSET: usize = 2;
/// Routing path byte.
pub const PATH_OFFSET: usize = 18;
/// Source / pixel-routing type byte.
pub const PIXEL_TYPE_OFFSET: usize = 19;
/// Destination byte.
pub const DST_OFFSET: usize = 20;
/// Frame rate byte.
pub const FRAME_RATE_OFFSET: usize = 21;
/// Width field (little-endian).
pub const WIDTH_OFFSET: usize = 22;
/// Height field (little-endian).
pub const HEIGHT_OFFSET: usize = 24;
/// Sync/field byte.
pub const SYNC_OFFSET: usize = 27;

const START_TEMPLATE: [u8; FRAME_LEN] = [
    0x01, 0x30, 0xC1, 0x00, // header
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x0A, 0x00, // payload length
    0x00, 0x00, // inner crc
    0x2F, 0x0D, // outer crc
    0x00, 0x80, 0x00, 0x32, // path, src, dst, fps
    0xD0, 0x02, 0x40, 0x02, // width, height
    0x00, 0x28, // reserved, sync
];

const STOP_TEMPLATE: [u8; FRAME_LEN] = [
    0x01, 0x30, 0xC2, 0x00, // header
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x0A, 0x00, // payload length
    0x00, 0x00, // inner crc
    0x2F, 0x0D, // outer crc
    0x01, 0x16, 0x00, 0x19, // path, src, dst, fps
    0xD0, 0x02, 0x40, 0x02, // width, height
    0x00, 0x19, // reserved, sync
];

/// Which command a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Start the video output.
    Start,
    /// Stop the video output.
    Stop,
}

impl CommandKind {
    /// Opcode byte identifying the command in the header.
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Start => 0xC1,
            Self::Stop => 0xC2,
        }
    }

    const fn template(self) -> [u8; FRAME_LEN] {
        match self {
            Self::Start => START_TEMPLATE,
            Self::Stop => STOP_TEMPLATE,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Inputs that vary between builds.
///
/// Width, height, frame rate and pixel type are written into both kinds, so
/// a STOP frame carries the negotiated values in place of its template bytes
/// (pixel type at byte 19, frame rate at byte 21). Only the sync byte is
/// START-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParams {
    /// Configured mode, selects the START sync byte.
    pub mode: Mode,
    /// Negotiated width.
    pub width: u16,
    /// Negotiated height.
    pub height: u16,
    /// Frame rate in frames per second.
    pub frame_rate: u8,
    /// Pixel/routing type.
    pub pixel_type: u8,
}

/// A ready-to-send command frame whose checksums match its contents.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Build a frame for `kind` from a fresh template.
    pub fn build(kind: CommandKind, params: &FrameParams) -> Self {
        let mut bytes = kind.template();
        bytes[WIDTH_OFFSET..WIDTH_OFFSET + 2].copy_from_slice(&params.width.to_le_bytes());
        bytes[HEIGHT_OFFSET..HEIGHT_OFFSET + 2].copy_from_slice(&params.height.to_le_bytes());
        bytes[FRAME_RATE_OFFSET] = params.frame_rate;
        bytes[PIXEL_TYPE_OFFSET] = params.pixel_type;
        if kind == CommandKind::Start {
            if let Some(sync) = params.mode.sync_byte() {
                bytes[SYNC_OFFSET] = sync;
            }
        }
        seal(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw bytes without checking them. See [`crate::validation`].
    pub const fn from_raw(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// The bytes to write to the command register.
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Command carried in the header, if the opcode is known.
    pub const fn kind(&self) -> Option<CommandKind> {
        match self.0[OPCODE_OFFSET] {
            0xC1 => Some(CommandKind::Start),
            0xC2 => Some(CommandKind::Stop),
            _ => None,
        }
    }

    /// Width field.
    pub const fn width(&self) -> u16 {
        u16::from_le_bytes([self.0[WIDTH_OFFSET], self.0[WIDTH_OFFSET + 1]])
    }

    /// Height field.
    pub const fn height(&self) -> u16 {
        u16::from_le_bytes([self.0[HEIGHT_OFFSET], self.0[HEIGHT_OFFSET + 1]])
    }

    /// Frame rate byte.
    pub const fn frame_rate(&self) -> u8 {
        self.0[FRAME_RATE_OFFSET]
    }

    /// Pixel/routing type byte.
    pub const fn pixel_type(&self) -> u8 {
        self.0[PIXEL_TYPE_OFFSET]
    }

    /// Sync/field byte.
    pub const fn sync_byte(&self) -> u8 {
        self.0[SYNC_OFFSET]
    }

    /// Inner CRC as stored in the frame.
    pub const fn inner_crc(&self) -> u16 {
        u16::from_le_bytes([self.0[INNER_CRC_OFFSET], self.0[INNER_CRC_OFFSET + 1]])
    }

    /// Outer CRC as stored in the frame.
    pub const fn outer_crc(&self) -> u16 {
        u16::from_le_bytes([self.0[OUTER_CRC_OFFSET], self.0[OUTER_CRC_OFFSET + 1]])
    }

    /// Inner CRC recomputed from the payload bytes.
    pub fn expected_inner_crc(&self) -> u16 {
        crc16(&self.0[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN])
    }

    /// Outer CRC recomputed from the header bytes.
    pub fn expected_outer_crc(&self) -> u16 {
        crc16(&self.0[..HEADER_LEN])
    }
}

/// Write both CRC fields. The inner one goes first because the outer CRC
/// covers it.
fn seal(bytes: &mut [u8; FRAME_LEN]) {
    let inner = crc16(&bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN]);
    bytes[INNER_CRC_OFFSET..INNER_CRC_OFFSET + 2].copy_from_slice(&inner.to_le_bytes());
    let outer = crc16(&bytes[..HEADER_LEN]);
    bytes[OUTER_CRC_OFFSET..OUTER_CRC_OFFSET + 2].copy_from_slice(&outer.to_le_bytes());
}

impl std::fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommandFrame({self})")
    }
}

impl std::fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&HexBytes(&self.0), f)
    }
}

/// Space-separated upper-case hex rendering of a byte slice.
#[derive(Debug, Clone, Copy)]
pub struct HexBytes<'a>(pub &'a [u8]);

impl std::fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (position, byte) in self.0.iter().enumerate() {
            if position > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
