//! Notification frame decoding.
//!
//! The thermometer pushes variable-length frames on its notify
//! characteristic. Data frames look like:
//!
//! - Bytes 0-1: Marker `0x55 0x00`
//! - Bytes 2-13: Six probe slots, 2 bytes each (uint16_t big-endian),
//!   tenths of a degree Celsius, `0xFFFF` when the probe is unplugged
//! - Remaining bytes: ignored
//!
//! Frames with any other leading bytes are keepalive or status variants and
//! carry no readings.

use tracing::trace;

use crate::data::{ProbeReading, PROBE_COUNT};
use crate::error::{Error, Result};

/// Leading bytes of a frame that carries probe readings.
pub const DATA_MARKER: [u8; 2] = [0x55, 0x00];

/// Offset of the first probe slot.
const SLOTS_OFFSET: usize = DATA_MARKER.len();

/// Minimum length of a data frame.
pub const MIN_DATA_FRAME_LEN: usize = SLOTS_OFFSET + PROBE_COUNT * 2;

/// Check whether a frame starts with the data marker.
pub fn is_data_frame(data: &[u8]) -> bool {
    data.starts_with(&DATA_MARKER)
}

/// Decode a notification frame into per-probe readings.
///
/// Returns an empty list for frames that do not carry the data marker.
///
/// # Errors
///
/// Returns [`Error::MalformedFrame`] if the frame carries the data marker but
/// is too short to hold all six probe slots.
///
/// # Example
///
/// ```
/// use smoker_mqtt_bridge::protocol::decode_frame;
///
/// let frame = [
///     0x55, 0x00, 0x03, 0xE8, 0xFF, 0xFF, 0xFF, 0xFF,
///     0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
/// ];
/// let readings = decode_frame(&frame).unwrap();
/// assert_eq!(readings.len(), 6);
/// assert_eq!(readings[0].temperature_payload(), "212.0");
/// assert!(!readings[1].is_connected);
///
/// assert!(decode_frame(&[0x01, 0x02]).unwrap().is_empty());
/// ```
pub fn decode_frame(data: &[u8]) -> Result<Vec<ProbeReading>> {
    if !is_data_frame(data) {
        trace!("Ignoring non-data frame: {:02X?}", data);
        return Ok(Vec::new());
    }

    if data.len() < MIN_DATA_FRAME_LEN {
        return Err(Error::MalformedFrame { len: data.len() });
    }

    let readings = data[SLOTS_OFFSET..MIN_DATA_FRAME_LEN]
        .chunks_exact(2)
        .enumerate()
        .map(|(slot, bytes)| ProbeReading::from_raw(slot, u16::from_be_bytes([bytes[0], bytes[1]])))
        .collect();

    Ok(readings)
}
