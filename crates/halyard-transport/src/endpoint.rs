//! Receive channel endpoint capability set.
//!
//! An endpoint owns one logical receive channel and the protocol handling
//! for frames arriving on any of its transports. The poller only classifies a
//! frame by its type tag and hands it over; validation beyond the header,
//! loss detection, setup and RTT semantics all live behind this trait.

use halyard_protocol::{DataHeader, RttMeasurementHeader, SetupHeader, is_valid_header};
use std::net::SocketAddr;
use std::time::Instant;

use crate::conductor::ConductorProxy;
use crate::error::EndpointError;
use crate::poller::TransportPoller;

/// Handler for frames received on one channel.
///
/// Callbacks run on the poller thread with the frame still in the shared
/// receive buffer. They must copy out anything they keep.
pub trait ReceiveChannelEndpoint: Send + Sync {
    /// Structural check run before any dispatch.
    ///
    /// Frames failing it are dropped silently. Defaults to the common header
    /// check (minimum length and protocol version).
    ///
    /// Accepting a frame does not guarantee a callback: DATA, PAD, SETUP and
    /// RTTM frames shorter than their typed header are still dropped after
    /// [`ReceiveChannelEndpoint::receive_hook`] has seen them.
    fn is_valid_frame(&self, frame: &[u8]) -> bool {
        is_valid_header(frame)
    }

    /// Observe every valid frame before it is dispatched
    fn receive_hook(&self, _frame: &[u8], _src: SocketAddr) {}

    /// Handle a DATA or PAD frame.
    ///
    /// Returns the number of bytes the endpoint counts as received.
    fn on_data_packet(
        &self,
        header: DataHeader<'_>,
        src: SocketAddr,
        transport_index: usize,
    ) -> usize;

    /// Handle a SETUP frame
    fn on_setup_message(&self, header: SetupHeader<'_>, src: SocketAddr, transport_index: usize);

    /// Handle an RTT measurement frame
    fn on_rtt_measurement(
        &self,
        header: RttMeasurementHeader<'_>,
        src: SocketAddr,
        transport_index: usize,
    );

    /// Release transports added for multi-destination reception.
    ///
    /// Called during poller shutdown with the poller itself so the endpoint
    /// can cancel the registrations of those transports.
    fn close_multi_rcv_destination(
        &self,
        _poller: &mut dyn TransportPoller,
    ) -> Result<(), EndpointError> {
        Ok(())
    }

    /// Close the endpoint
    fn close(&self) -> Result<(), EndpointError>;

    /// Decide whether the destination address needs re-resolving.
    ///
    /// Requests go to `conductor`; this runs on the poller thread and must
    /// not block.
    fn check_for_re_resolution(&self, _now: Instant, _conductor: &ConductorProxy) {}
}
