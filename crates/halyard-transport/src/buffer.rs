//! Cache-line aligned receive buffer.
//!
//! One [`FrameBuffer`] is owned by each poller and reused by every receive.
//! Its contents are only valid until the next receive, so callers copy out or
//! act on a frame before returning to the poll loop.

/// Cache line size the buffer is aligned to
pub const CACHE_LINE_LENGTH: usize = 64;

/// Largest UDP payload a datagram can carry over IPv4 and IPv6
pub const MAX_UDP_PAYLOAD_LENGTH: usize = 65504;

#[repr(C, align(64))]
struct AlignedPayload([u8; MAX_UDP_PAYLOAD_LENGTH]);

/// Reusable receive buffer sized for the largest UDP payload.
///
/// The cursor records how many bytes the most recent receive wrote.
pub struct FrameBuffer {
    bytes: Box<AlignedPayload>,
    len: usize,
}

impl FrameBuffer {
    /// Allocate a zeroed buffer
    pub fn new() -> Self {
        Self {
            bytes: Box::new(AlignedPayload([0u8; MAX_UDP_PAYLOAD_LENGTH])),
            len: 0,
        }
    }

    /// Total capacity in bytes
    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX_UDP_PAYLOAD_LENGTH
    }

    /// Bytes written by the most recent receive
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the most recent receive wrote nothing
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The frame written by the most recent receive
    #[inline]
    pub fn frame(&self) -> &[u8] {
        &self.bytes.0[..self.len]
    }

    /// Whole region for a transport to receive into.
    ///
    /// Resets the cursor; the transport reports the datagram length through
    /// [`FrameBuffer::set_len`].
    #[inline]
    pub fn receive_region(&mut self) -> &mut [u8] {
        self.len = 0;
        &mut self.bytes.0[..]
    }

    /// Record the length of the datagram just received.
    ///
    /// Lengths beyond capacity are clamped.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(MAX_UDP_PAYLOAD_LENGTH);
    }

    /// Forget the current frame
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Address of the first byte, for alignment checks
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.0.as_ptr()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}
