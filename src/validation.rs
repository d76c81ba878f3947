//! Frame validation utilities for captured command traffic.
//!
//! Bus captures and register dumps arrive as raw bytes. These helpers check
//! that such bytes form a command frame the module would accept.

use crate::command::{CommandFrame, CommandKind, FRAME_LEN};
use crate::traits::{Result, SensorError};

/// Parse `bytes` as a command frame and verify it.
///
/// # Errors
///
/// Returns `InvalidArgument` if:
/// - `bytes` is not exactly one frame long
/// - the opcode is neither START nor STOP
/// - either checksum does not match the frame contents
pub fn validate_command_frame(bytes: &[u8]) -> Result<CommandFrame> {
    let raw: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| {
        SensorError::InvalidArgument(format!(
            "expected {FRAME_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    let frame = CommandFrame::from_raw(raw);

    if frame.kind().is_none() {
        return Err(SensorError::InvalidArgument(format!(
            "unknown opcode in frame {frame}"
        )));
    }

    let (stored, expected) = (frame.inner_crc(), frame.expected_inner_crc());
    if stored != expected {
        return Err(SensorError::InvalidArgument(format!(
            "inner crc {stored:#06x}, expected {expected:#06x}"
        )));
    }

    let (stored, expected) = (frame.outer_crc(), frame.expected_outer_crc());
    if stored != expected {
        return Err(SensorError::InvalidArgument(format!(
            "outer crc {stored:#06x}, expected {expected:#06x}"
        )));
    }

    Ok(frame)
}

/// Validates that `frames` alternate START, STOP, START, ...
///
/// Returns the number of frames checked.
///
/// # Errors
///
/// Returns `InvalidArgument` on the first frame that fails
/// [`validate_command_frame`] or breaks the alternation.
pub fn validate_command_sequence<'a, I>(frames: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut expected = CommandKind::Start;
    let mut count = 0;
    for bytes in frames {
        let frame = validate_command_frame(bytes)?;
        if frame.kind() != Some(expected) {
            return Err(SensorError::InvalidArgument(format!(
                "frame {count}: expected {expected}, got {frame}"
            )));
        }
        expected = match expected {
            CommandKind::Start => CommandKind::Stop,
            CommandKind::Stop => CommandKind::Start,
        };
        count += 1;
    }
    Ok(count)
}
