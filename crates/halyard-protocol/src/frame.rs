//! Frame header classification and zero-copy header views.
//!
//! The views borrow the receive buffer and decode fields on access; nothing
//! is copied out of the datagram. Constructing a typed view checks that the
//! datagram is long enough for that header, so accessors never read out of
//! bounds.

use crate::error::FrameError;
use crate::{
    CURRENT_VERSION, DATA_HEADER_LENGTH, HDR_TYPE_ATS_DATA, HDR_TYPE_ATS_SETUP, HDR_TYPE_ATS_SM,
    HDR_TYPE_DATA, HDR_TYPE_ERR, HDR_TYPE_EXT, HDR_TYPE_NAK, HDR_TYPE_PAD, HDR_TYPE_RES,
    HDR_TYPE_RSP_SETUP, HDR_TYPE_RTTM, HDR_TYPE_SETUP, HDR_TYPE_SM, HEADER_LENGTH,
    RTTM_HEADER_LENGTH, SETUP_HEADER_LENGTH,
};

const FRAME_LENGTH_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const FLAGS_OFFSET: usize = 5;
const TYPE_OFFSET: usize = 6;

const DATA_TERM_OFFSET_OFFSET: usize = 8;
const DATA_SESSION_ID_OFFSET: usize = 12;
const DATA_STREAM_ID_OFFSET: usize = 16;
const DATA_TERM_ID_OFFSET: usize = 20;
const DATA_RESERVED_VALUE_OFFSET: usize = 24;

const SETUP_INITIAL_TERM_ID_OFFSET: usize = 20;
const SETUP_ACTIVE_TERM_ID_OFFSET: usize = 24;
const SETUP_TERM_LENGTH_OFFSET: usize = 28;
const SETUP_MTU_OFFSET: usize = 32;
const SETUP_TTL_OFFSET: usize = 36;

const RTTM_SESSION_ID_OFFSET: usize = 8;
const RTTM_STREAM_ID_OFFSET: usize = 12;
const RTTM_ECHO_TIMESTAMP_OFFSET: usize = 16;
const RTTM_RECEPTION_DELTA_OFFSET: usize = 24;
const RTTM_RECEIVER_ID_OFFSET: usize = 32;

/// Frame types carried in the header type field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrameType {
    /// Padding at the end of a term
    Pad = HDR_TYPE_PAD,
    /// Message data
    Data = HDR_TYPE_DATA,
    /// Negative acknowledgement
    Nak = HDR_TYPE_NAK,
    /// Receiver status message
    StatusMessage = HDR_TYPE_SM,
    /// Error report
    Error = HDR_TYPE_ERR,
    /// Stream setup
    Setup = HDR_TYPE_SETUP,
    /// Round-trip time measurement
    RttMeasurement = HDR_TYPE_RTTM,
    /// Name resolution entry
    Resolution = HDR_TYPE_RES,
    /// Authenticated data
    AtsData = HDR_TYPE_ATS_DATA,
    /// Authenticated setup
    AtsSetup = HDR_TYPE_ATS_SETUP,
    /// Authenticated status message
    AtsStatusMessage = HDR_TYPE_ATS_SM,
    /// Response channel setup
    ResponseSetup = HDR_TYPE_RSP_SETUP,
    /// Extension header
    Extension = HDR_TYPE_EXT,
}

impl TryFrom<u16> for FrameType {
    type Error = FrameError;

    fn try_from(value: u16) -> Result<Self, FrameError> {
        match value {
            HDR_TYPE_PAD => Ok(Self::Pad),
            HDR_TYPE_DATA => Ok(Self::Data),
            HDR_TYPE_NAK => Ok(Self::Nak),
            HDR_TYPE_SM => Ok(Self::StatusMessage),
            HDR_TYPE_ERR => Ok(Self::Error),
            HDR_TYPE_SETUP => Ok(Self::Setup),
            HDR_TYPE_RTTM => Ok(Self::RttMeasurement),
            HDR_TYPE_RES => Ok(Self::Resolution),
            HDR_TYPE_ATS_DATA => Ok(Self::AtsData),
            HDR_TYPE_ATS_SETUP => Ok(Self::AtsSetup),
            HDR_TYPE_ATS_SM => Ok(Self::AtsStatusMessage),
            HDR_TYPE_RSP_SETUP => Ok(Self::ResponseSetup),
            HDR_TYPE_EXT => Ok(Self::Extension),
            _ => Err(FrameError::UnknownFrameType(value)),
        }
    }
}

impl FrameType {
    /// Raw tag value as written on the wire
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Length of the header a frame of this type starts with
    pub fn header_length(self) -> usize {
        match self {
            Self::Data | Self::Pad => DATA_HEADER_LENGTH,
            Self::Setup => SETUP_HEADER_LENGTH,
            Self::RttMeasurement => RTTM_HEADER_LENGTH,
            _ => HEADER_LENGTH,
        }
    }
}

/// Read the type tag of the frame at the start of `buf`.
///
/// Returns `None` if the buffer cannot hold the type field.
#[inline]
pub fn frame_type(buf: &[u8]) -> Option<u16> {
    buf.get(TYPE_OFFSET..TYPE_OFFSET + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

/// Structural check of the common header.
///
/// # Errors
///
/// Returns [`FrameError::TooShort`] if `buf` is shorter than the common header
/// and [`FrameError::UnsupportedVersion`] on a version mismatch.
pub fn check_header(buf: &[u8]) -> Result<(), FrameError> {
    ensure_len(buf, HEADER_LENGTH)?;
    let version = buf[VERSION_OFFSET];
    if version != CURRENT_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Returns `true` if `buf` starts with a well-formed common header
#[inline]
pub fn is_valid_header(buf: &[u8]) -> bool {
    check_header(buf).is_ok()
}

fn ensure_len(buf: &[u8], expected: usize) -> Result<(), FrameError> {
    if buf.len() < expected {
        return Err(FrameError::TooShort {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

// Callers guarantee the range is in bounds (views check length on wrap).
#[inline]
fn read_i32(buf: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

#[inline]
fn read_i64(buf: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}

/// Zero-copy view of the common header
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader<'a> {
    buf: &'a [u8],
}

impl<'a> FrameHeader<'a> {
    /// Wrap a datagram that holds at least the common header
    pub fn wrap(buf: &'a [u8]) -> Result<Self, FrameError> {
        ensure_len(buf, HEADER_LENGTH)?;
        Ok(Self { buf })
    }

    /// Declared frame length (0 for heartbeats)
    pub fn frame_length(&self) -> i32 {
        read_i32(self.buf, FRAME_LENGTH_OFFSET)
    }

    /// Protocol version
    pub fn version(&self) -> u8 {
        self.buf[VERSION_OFFSET]
    }

    /// Frame flags
    pub fn flags(&self) -> u8 {
        self.buf[FLAGS_OFFSET]
    }

    /// Raw type tag
    pub fn type_tag(&self) -> u16 {
        u16::from_le_bytes([self.buf[TYPE_OFFSET], self.buf[TYPE_OFFSET + 1]])
    }

    /// Whole datagram this header starts
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }
}

/// Zero-copy view of a DATA or PAD frame header
#[derive(Debug, Clone, Copy)]
pub struct DataHeader<'a> {
    header: FrameHeader<'a>,
}

impl<'a> DataHeader<'a> {
    /// Begin-of-message flag
    pub const BEGIN_FLAG: u8 = 0x80;
    /// End-of-message flag
    pub const END_FLAG: u8 = 0x40;
    /// End-of-stream flag
    pub const EOS_FLAG: u8 = 0x20;

    /// Wrap a datagram that holds at least a data header
    pub fn wrap(buf: &'a [u8]) -> Result<Self, FrameError> {
        ensure_len(buf, DATA_HEADER_LENGTH)?;
        Ok(Self {
            header: FrameHeader { buf },
        })
    }

    /// Common header fields
    pub fn header(&self) -> FrameHeader<'a> {
        self.header
    }

    /// Offset of this frame within its term
    pub fn term_offset(&self) -> i32 {
        read_i32(self.header.buf, DATA_TERM_OFFSET_OFFSET)
    }

    /// Publisher session
    pub fn session_id(&self) -> i32 {
        read_i32(self.header.buf, DATA_SESSION_ID_OFFSET)
    }

    /// Stream within the channel
    pub fn stream_id(&self) -> i32 {
        read_i32(self.header.buf, DATA_STREAM_ID_OFFSET)
    }

    /// Term the frame belongs to
    pub fn term_id(&self) -> i32 {
        read_i32(self.header.buf, DATA_TERM_ID_OFFSET)
    }

    /// Application reserved value
    pub fn reserved_value(&self) -> i64 {
        read_i64(self.header.buf, DATA_RESERVED_VALUE_OFFSET)
    }

    /// A zero-length data frame keeps the stream alive
    pub fn is_heartbeat(&self) -> bool {
        self.header.frame_length() == 0
    }

    /// Bytes following the header
    pub fn payload(&self) -> &'a [u8] {
        &self.header.buf[DATA_HEADER_LENGTH..]
    }

    /// Whole datagram
    pub fn as_bytes(&self) -> &'a [u8] {
        self.header.buf
    }
}

/// Zero-copy view of a SETUP frame header
#[derive(Debug, Clone, Copy)]
pub struct SetupHeader<'a> {
    header: FrameHeader<'a>,
}

impl<'a> SetupHeader<'a> {
    /// Wrap a datagram that holds at least a setup header
    pub fn wrap(buf: &'a [u8]) -> Result<Self, FrameError> {
        ensure_len(buf, SETUP_HEADER_LENGTH)?;
        Ok(Self {
            header: FrameHeader { buf },
        })
    }

    /// Common header fields
    pub fn header(&self) -> FrameHeader<'a> {
        self.header
    }

    /// Current term offset of the publisher
    pub fn term_offset(&self) -> i32 {
        read_i32(self.header.buf, DATA_TERM_OFFSET_OFFSET)
    }

    /// Publisher session
    pub fn session_id(&self) -> i32 {
        read_i32(self.header.buf, DATA_SESSION_ID_OFFSET)
    }

    /// Stream within the channel
    pub fn stream_id(&self) -> i32 {
        read_i32(self.header.buf, DATA_STREAM_ID_OFFSET)
    }

    /// First term of the stream
    pub fn initial_term_id(&self) -> i32 {
        read_i32(self.header.buf, SETUP_INITIAL_TERM_ID_OFFSET)
    }

    /// Term the publisher is writing
    pub fn active_term_id(&self) -> i32 {
        read_i32(self.header.buf, SETUP_ACTIVE_TERM_ID_OFFSET)
    }

    /// Term buffer length
    pub fn term_length(&self) -> i32 {
        read_i32(self.header.buf, SETUP_TERM_LENGTH_OFFSET)
    }

    /// Publisher MTU
    pub fn mtu(&self) -> i32 {
        read_i32(self.header.buf, SETUP_MTU_OFFSET)
    }

    /// Multicast TTL
    pub fn ttl(&self) -> i32 {
        read_i32(self.header.buf, SETUP_TTL_OFFSET)
    }

    /// Whole datagram
    pub fn as_bytes(&self) -> &'a [u8] {
        self.header.buf
    }
}

/// Zero-copy view of an RTT measurement frame header
#[derive(Debug, Clone, Copy)]
pub struct RttMeasurementHeader<'a> {
    header: FrameHeader<'a>,
}

impl<'a> RttMeasurementHeader<'a> {
    /// Set on a measurement that answers a request
    pub const REPLY_FLAG: u8 = 0x80;

    /// Wrap a datagram that holds at least an RTT measurement header
    pub fn wrap(buf: &'a [u8]) -> Result<Self, FrameError> {
        ensure_len(buf, RTTM_HEADER_LENGTH)?;
        Ok(Self {
            header: FrameHeader { buf },
        })
    }

    /// Common header fields
    pub fn header(&self) -> FrameHeader<'a> {
        self.header
    }

    /// Publisher session
    pub fn session_id(&self) -> i32 {
        read_i32(self.header.buf, RTTM_SESSION_ID_OFFSET)
    }

    /// Stream within the channel
    pub fn stream_id(&self) -> i32 {
        read_i32(self.header.buf, RTTM_STREAM_ID_OFFSET)
    }

    /// Timestamp echoed back to the requester
    pub fn echo_timestamp(&self) -> i64 {
        read_i64(self.header.buf, RTTM_ECHO_TIMESTAMP_OFFSET)
    }

    /// Time between reception of the request and sending the reply
    pub fn reception_delta(&self) -> i64 {
        read_i64(self.header.buf, RTTM_RECEPTION_DELTA_OFFSET)
    }

    /// Receiver that issued the measurement
    pub fn receiver_id(&self) -> i64 {
        read_i64(self.header.buf, RTTM_RECEIVER_ID_OFFSET)
    }

    /// Whether this measurement is a reply
    pub fn is_reply(&self) -> bool {
        self.header.flags() & Self::REPLY_FLAG != 0
    }

    /// Whole datagram
    pub fn as_bytes(&self) -> &'a [u8] {
        self.header.buf
    }
}

/// Builder for constructing frames
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    type_tag: u16,
    version: u8,
    flags: u8,
    header_length: usize,
    header: [u8; SETUP_HEADER_LENGTH],
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// Create a builder for a frame of the given type
    pub fn new(frame_type: FrameType) -> Self {
        Self {
            type_tag: frame_type.as_u16(),
            version: CURRENT_VERSION,
            flags: 0,
            header_length: frame_type.header_length(),
            header: [0u8; SETUP_HEADER_LENGTH],
            payload: Vec::new(),
        }
    }

    /// Create a builder carrying an arbitrary type tag and a common header only
    pub fn with_type_tag(type_tag: u16) -> Self {
        let header_length = FrameType::try_from(type_tag)
            .map(FrameType::header_length)
            .unwrap_or(HEADER_LENGTH);
        Self {
            type_tag,
            version: CURRENT_VERSION,
            flags: 0,
            header_length,
            header: [0u8; SETUP_HEADER_LENGTH],
            payload: Vec::new(),
        }
    }

    /// Set the version byte
    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Set the flags byte
    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Set the session ID
    pub fn session_id(self, session_id: i32) -> Self {
        let offset = if self.type_tag == HDR_TYPE_RTTM {
            RTTM_SESSION_ID_OFFSET
        } else {
            DATA_SESSION_ID_OFFSET
        };
        self.put_i32(offset, session_id)
    }

    /// Set the stream ID
    pub fn stream_id(self, stream_id: i32) -> Self {
        let offset = if self.type_tag == HDR_TYPE_RTTM {
            RTTM_STREAM_ID_OFFSET
        } else {
            DATA_STREAM_ID_OFFSET
        };
        self.put_i32(offset, stream_id)
    }

    /// Set the term offset (data and setup frames)
    pub fn term_offset(self, term_offset: i32) -> Self {
        self.put_i32(DATA_TERM_OFFSET_OFFSET, term_offset)
    }

    /// Set the term ID (data frames) or initial term ID (setup frames)
    pub fn term_id(self, term_id: i32) -> Self {
        self.put_i32(DATA_TERM_ID_OFFSET, term_id)
    }

    /// Set the MTU (setup frames)
    pub fn mtu(self, mtu: i32) -> Self {
        self.put_i32(SETUP_MTU_OFFSET, mtu)
    }

    /// Set the echo timestamp (RTT measurement frames)
    pub fn echo_timestamp(self, timestamp: i64) -> Self {
        self.put_i64(RTTM_ECHO_TIMESTAMP_OFFSET, timestamp)
    }

    /// Set the payload
    pub fn payload(mut self, data: &[u8]) -> Self {
        self.payload = data.to_vec();
        self
    }

    /// Build the frame into a byte buffer
    pub fn build(self) -> Vec<u8> {
        let total = self.header_length + self.payload.len();
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&self.header[..self.header_length]);
        buf[FRAME_LENGTH_OFFSET..FRAME_LENGTH_OFFSET + 4]
            .copy_from_slice(&(total as i32).to_le_bytes());
        buf[VERSION_OFFSET] = self.version;
        buf[FLAGS_OFFSET] = self.flags;
        buf[TYPE_OFFSET..TYPE_OFFSET + 2].copy_from_slice(&self.type_tag.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    fn put_i32(mut self, offset: usize, value: i32) -> Self {
        if offset + 4 <= self.header_length {
            self.header[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    fn put_i64(mut self, offset: usize, value: i64) -> Self {
        if offset + 8 <= self.header_length {
            self.header[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }
        self
    }
}
