//! # HALYARD Protocol
//!
//! Frame header layout for the HALYARD messaging transport.
//!
//! This crate provides:
//! - Frame type tags and the fixed header layout
//! - Structural header validation
//! - Zero-copy typed views over DATA, SETUP and RTT measurement headers
//! - A frame builder for tests and tooling
//!
//! Only the fields needed to route a datagram to its handler are decoded
//! here. Everything past the header is the handler's business.
//!
//! ## Header layout
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +---------------------------------------------------------------+
//! |                         Frame Length                          |
//! +---------------+---------------+-------------------------------+
//! |    Version    |     Flags     |             Type              |
//! +---------------+---------------+-------------------------------+
//! |                 Type-specific fields ...                      |
//! ```
//!
//! All multi-byte fields are little-endian.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod error;
pub mod frame;

pub use error::FrameError;
pub use frame::{
    DataHeader, FrameBuilder, FrameHeader, FrameType, RttMeasurementHeader, SetupHeader,
    check_header, frame_type, is_valid_header,
};

/// Current protocol version carried in every header
pub const CURRENT_VERSION: u8 = 0;

/// Length of the common frame header in bytes
pub const HEADER_LENGTH: usize = 8;

/// Length of a DATA (and PAD) frame header in bytes
pub const DATA_HEADER_LENGTH: usize = 32;

/// Length of a SETUP frame header in bytes
pub const SETUP_HEADER_LENGTH: usize = 40;

/// Length of an RTT measurement frame header in bytes
pub const RTTM_HEADER_LENGTH: usize = 40;

/// Padding frame type tag
pub const HDR_TYPE_PAD: u16 = 0x00;
/// Data frame type tag
pub const HDR_TYPE_DATA: u16 = 0x01;
/// Negative acknowledgement type tag
pub const HDR_TYPE_NAK: u16 = 0x02;
/// Status message type tag
pub const HDR_TYPE_SM: u16 = 0x03;
/// Error frame type tag
pub const HDR_TYPE_ERR: u16 = 0x04;
/// Setup frame type tag
pub const HDR_TYPE_SETUP: u16 = 0x05;
/// RTT measurement type tag
pub const HDR_TYPE_RTTM: u16 = 0x06;
/// Resolution entry type tag
pub const HDR_TYPE_RES: u16 = 0x07;
/// Authenticated data type tag
pub const HDR_TYPE_ATS_DATA: u16 = 0x08;
/// Authenticated setup type tag
pub const HDR_TYPE_ATS_SETUP: u16 = 0x09;
/// Authenticated status message type tag
pub const HDR_TYPE_ATS_SM: u16 = 0x0A;
/// Response setup type tag
pub const HDR_TYPE_RSP_SETUP: u16 = 0x0B;
/// Extension type tag
pub const HDR_TYPE_EXT: u16 = 0xFFFF;
