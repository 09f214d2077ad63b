//! Receive one datagram and route it by frame type.

use halyard_protocol::{
    DataHeader, FrameType, RttMeasurementHeader, SetupHeader, frame_type,
};
use std::net::SocketAddr;

use crate::buffer::FrameBuffer;
use crate::endpoint::ReceiveChannelEndpoint;
use crate::poller::PollerStats;
use crate::registry::Registration;

/// Attempt one receive on `registration` and dispatch what arrives.
///
/// Returns `None` if no datagram was pending, otherwise the bytes the
/// endpoint counted.
#[inline]
pub fn poll_registration(
    registration: &Registration,
    buffer: &mut FrameBuffer,
    stats: &mut PollerStats,
) -> Option<usize> {
    let src = registration.transport().receive(buffer)?;
    stats.datagrams_received += 1;

    let bytes = dispatch_frame(
        registration.endpoint().as_ref(),
        buffer.frame(),
        src,
        registration.transport_index(),
        stats,
    );
    buffer.clear();
    Some(bytes)
}

/// Validate `frame` and hand it to the matching endpoint callback.
///
/// Returns the bytes the endpoint counted. Only DATA and PAD frames count;
/// everything else, including dropped frames, returns zero.
pub fn dispatch_frame(
    endpoint: &dyn ReceiveChannelEndpoint,
    frame: &[u8],
    src: SocketAddr,
    transport_index: usize,
    stats: &mut PollerStats,
) -> usize {
    if !endpoint.is_valid_frame(frame) {
        stats.invalid_frames += 1;
        return 0;
    }

    endpoint.receive_hook(frame, src);

    let Some(tag) = frame_type(frame) else {
        stats.truncated_frames += 1;
        return 0;
    };

    match FrameType::try_from(tag) {
        Ok(FrameType::Data | FrameType::Pad) => match DataHeader::wrap(frame) {
            Ok(header) => {
                stats.data_frames += 1;
                let bytes = endpoint.on_data_packet(header, src, transport_index);
                stats.bytes_received += bytes as u64;
                bytes
            }
            Err(_) => {
                stats.truncated_frames += 1;
                0
            }
        },
        Ok(FrameType::Setup) => {
            match SetupHeader::wrap(frame) {
                Ok(header) => {
                    stats.setup_frames += 1;
                    endpoint.on_setup_message(header, src, transport_index);
                }
                Err(_) => stats.truncated_frames += 1,
            }
            0
        }
        Ok(FrameType::RttMeasurement) => {
            match RttMeasurementHeader::wrap(frame) {
                Ok(header) => {
                    stats.rtt_frames += 1;
                    endpoint.on_rtt_measurement(header, src, transport_index);
                }
                Err(_) => stats.truncated_frames += 1,
            }
            0
        }
        _ => {
            stats.unknown_frames += 1;
            0
        }
    }
}
