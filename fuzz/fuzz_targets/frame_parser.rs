//! Fuzz target for frame classification and dispatch
//!
//! Arbitrary datagrams must never panic the header views or the dispatcher,
//! and only DATA/PAD frames may contribute bytes.

#![no_main]

use halyard_protocol::{
    DataHeader, FrameHeader, FrameType, RttMeasurementHeader, SetupHeader, frame_type,
};
use halyard_transport::dispatch::dispatch_frame;
use halyard_transport::{EndpointError, PollerStats, ReceiveChannelEndpoint};
use libfuzzer_sys::fuzz_target;
use std::net::SocketAddr;

struct SinkEndpoint;

impl ReceiveChannelEndpoint for SinkEndpoint {
    fn on_data_packet(&self, header: DataHeader<'_>, _src: SocketAddr, _idx: usize) -> usize {
        let _ = (header.term_offset(), header.session_id(), header.is_heartbeat());
        header.as_bytes().len()
    }

    fn on_setup_message(&self, header: SetupHeader<'_>, _src: SocketAddr, _idx: usize) {
        let _ = (header.initial_term_id(), header.mtu(), header.ttl());
    }

    fn on_rtt_measurement(&self, header: RttMeasurementHeader<'_>, _src: SocketAddr, _idx: usize) {
        let _ = (header.echo_timestamp(), header.receiver_id(), header.is_reply());
    }

    fn close(&self) -> Result<(), EndpointError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = FrameHeader::wrap(data) {
        let _ = (header.frame_length(), header.flags());
    }

    let mut stats = PollerStats::default();
    let src = SocketAddr::from(([127, 0, 0, 1], 40456));
    let bytes = dispatch_frame(&SinkEndpoint, data, src, 0, &mut stats);

    let routed_as_data = matches!(
        frame_type(data).map(FrameType::try_from),
        Some(Ok(FrameType::Data | FrameType::Pad))
    );
    if !routed_as_data {
        assert_eq!(bytes, 0);
    }
});
