// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Structured logging hooks for the transport engine.
//!
//! The production crate this is derived from generates its event types and publisher
//! plumbing from a schema describing every observable transition in the stack. That
//! machinery is out of scope here; this module hand-writes just the handful of event
//! types the congestion controllers and MTU discovery actually emit, wired to `tracing`
//! so a host application can still subscribe to structured fields without linking a
//! code generator.

use crate::inet;

/// Converts an internal representation of some state into the shape published to
/// subscribers.
pub trait IntoEvent<T> {
    fn into_event(self) -> T;
}

impl<T> IntoEvent<T> for T {
    #[inline]
    fn into_event(self) -> T {
        self
    }
}

/// Types referenced by subscribers.
///
/// Addresses are copied out of the connection rather than borrowed, since the events
/// here are almost always logged after the packet that produced them has already been
/// released.
pub mod api {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum SocketAddress {
        IpV4 { ip: [u8; 4], port: u16 },
        IpV6 { ip: [u8; 16], port: u16 },
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub struct Path {
        pub local_addr: SocketAddress,
        pub remote_addr: SocketAddress,
        pub id: u64,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    #[non_exhaustive]
    pub enum CipherSuite {
        TlsAes128GcmSha256,
        TlsAes256GcmSha384,
        TlsChacha20Poly1305Sha256,
        #[default]
        Unknown,
    }
}

impl IntoEvent<api::SocketAddress> for &inet::SocketAddress {
    #[inline]
    fn into_event(self) -> api::SocketAddress {
        match self {
            inet::SocketAddress::IpV4(addr) => {
                let octets: [u8; 4] = addr.ip().as_bytes().try_into().expect("4 byte address");
                api::SocketAddress::IpV4 {
                    ip: octets,
                    port: addr.port(),
                }
            }
            inet::SocketAddress::IpV6(addr) => {
                let octets: [u8; 16] =
                    addr.ip().as_bytes().try_into().expect("16 byte address");
                api::SocketAddress::IpV6 {
                    ip: octets,
                    port: addr.port(),
                }
            }
        }
    }
}

/// Construction types for events, distinct from `api` so a field can be computed lazily
/// (e.g. converting a path id to its `u64` wire representation) without borrowing from
/// the publisher call site.
pub mod builder {
    use crate::recovery::bandwidth::RateSample;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum SlowStartExitCause {
        /// A packet was determined lost
        PacketLoss,
        /// An Explicit Congestion Notification: Congestion Experienced marking was received
        Ecn,
        /// The round trip time estimate was updated
        Rtt,
        /// Slow Start exited for a reason other than those above
        Other,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum MtuUpdatedCause {
        /// The MTU was initialized with the default value
        NewPath,
        /// An MTU probe was acknowledged by the peer
        ProbeAcknowledged,
        /// A blackhole was detected
        Blackhole,
        /// An early packet using the configured initial MTU was lost
        InitialMtuPacketLost,
        /// An early packet using the configured initial MTU was acknowledged by the peer
        InitialMtuPacketAcknowledged,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum BbrState {
        Startup,
        Drain,
        ProbeBwDown,
        ProbeBwCruise,
        ProbeBwRefill,
        ProbeBwUp,
        ProbeRtt,
    }

    #[derive(Clone, Copy, Debug)]
    #[non_exhaustive]
    pub struct MtuUpdated {
        pub path_id: u64,
        /// The maximum QUIC datagram size, not including UDP and IP headers
        pub mtu: u16,
        pub cause: MtuUpdatedCause,
        /// The search for the maximum MTU has completed for now
        pub search_complete: bool,
    }

    #[derive(Clone, Copy, Debug)]
    #[non_exhaustive]
    pub struct SlowStartExited {
        pub path_id: u64,
        pub cause: SlowStartExitCause,
        pub congestion_window: u32,
    }

    #[derive(Clone, Copy, Debug)]
    #[non_exhaustive]
    pub struct DeliveryRateSampled {
        pub path_id: u64,
        pub rate_sample: RateSample,
    }

    #[derive(Clone, Copy, Debug)]
    #[non_exhaustive]
    pub struct PacingRateUpdated {
        pub path_id: u64,
        pub bytes_per_second: u64,
        pub burst_size: u32,
        pub pacing_gain: f32,
    }

    #[derive(Clone, Copy, Debug)]
    #[non_exhaustive]
    pub struct BbrStateChanged {
        pub path_id: u64,
        pub state: BbrState,
    }

    /// A lightweight view of a frame written by the packet builder, used only for
    /// logging: the full frame body isn't worth copying into the event just to be
    /// dropped a moment later.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub struct Frame {
        pub tag: u8,
        pub ack_eliciting: bool,
    }

    pub use super::api::CipherSuite;
}

impl<T: crate::frame::FrameTrait> IntoEvent<builder::Frame> for &T {
    #[inline]
    fn into_event(self) -> builder::Frame {
        use crate::frame::ack_elicitation::AckElicitable;
        builder::Frame {
            tag: self.frame_tag(),
            ack_eliciting: self.ack_elicitation().is_ack_eliciting(),
        }
    }
}

/// Per-connection view a congestion controller or MTU discovery publishes events through.
pub trait ConnectionPublisher {
    fn on_mtu_updated(&mut self, event: builder::MtuUpdated);
    fn on_slow_start_exited(&mut self, event: builder::SlowStartExited);
    fn on_delivery_rate_sampled(&mut self, event: builder::DeliveryRateSampled);
    fn on_pacing_rate_updated(&mut self, event: builder::PacingRateUpdated);
    fn on_bbr_state_changed(&mut self, event: builder::BbrStateChanged);
}

/// Publishes events to the `tracing` crate, when enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tracing;

impl ConnectionPublisher for Tracing {
    #[inline]
    fn on_mtu_updated(&mut self, event: builder::MtuUpdated) {
        #[cfg(feature = "event-tracing")]
        tracing::debug!(
            path_id = event.path_id,
            mtu = event.mtu,
            cause = ?event.cause,
            search_complete = event.search_complete,
            "mtu_updated"
        );
        #[cfg(not(feature = "event-tracing"))]
        let _ = event;
    }

    #[inline]
    fn on_slow_start_exited(&mut self, event: builder::SlowStartExited) {
        #[cfg(feature = "event-tracing")]
        tracing::debug!(
            path_id = event.path_id,
            cause = ?event.cause,
            congestion_window = event.congestion_window,
            "slow_start_exited"
        );
        #[cfg(not(feature = "event-tracing"))]
        let _ = event;
    }

    #[inline]
    fn on_delivery_rate_sampled(&mut self, event: builder::DeliveryRateSampled) {
        #[cfg(feature = "event-tracing")]
        tracing::trace!(path_id = event.path_id, "delivery_rate_sampled");
        #[cfg(not(feature = "event-tracing"))]
        let _ = event;
    }

    #[inline]
    fn on_pacing_rate_updated(&mut self, event: builder::PacingRateUpdated) {
        #[cfg(feature = "event-tracing")]
        tracing::trace!(
            path_id = event.path_id,
            bytes_per_second = event.bytes_per_second,
            burst_size = event.burst_size,
            pacing_gain = event.pacing_gain,
            "pacing_rate_updated"
        );
        #[cfg(not(feature = "event-tracing"))]
        let _ = event;
    }

    #[inline]
    fn on_bbr_state_changed(&mut self, event: builder::BbrStateChanged) {
        #[cfg(feature = "event-tracing")]
        tracing::debug!(path_id = event.path_id, state = ?event.state, "bbr_state_changed");
        #[cfg(not(feature = "event-tracing"))]
        let _ = event;
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;

    /// No-op publisher for use in unit tests that only care about the congestion
    /// controller or MTU state, not the events it emits along the way.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Subscriber;

    impl Subscriber {
        pub fn snapshot() -> Self {
            Self
        }
    }

    impl ConnectionPublisher for Subscriber {
        #[inline]
        fn on_mtu_updated(&mut self, _event: builder::MtuUpdated) {}
        #[inline]
        fn on_slow_start_exited(&mut self, _event: builder::SlowStartExited) {}
        #[inline]
        fn on_delivery_rate_sampled(&mut self, _event: builder::DeliveryRateSampled) {}
        #[inline]
        fn on_pacing_rate_updated(&mut self, _event: builder::PacingRateUpdated) {}
        #[inline]
        fn on_bbr_state_changed(&mut self, _event: builder::BbrStateChanged) {}
    }

    pub use Subscriber as Publisher;
}
