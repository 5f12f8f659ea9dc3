//! Protocol module for parsing device messages.
//!
//! This module contains the decoder for the thermometer's notification
//! frames.

pub mod frame;

pub use frame::{decode_frame, is_data_frame, DATA_MARKER, MIN_DATA_FRAME_LEN};
