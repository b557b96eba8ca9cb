// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The connection lifecycle state machine.
//!
//! Drives a single connection through `Initialized -> Handshake -> Connected
//! -> Closing -> Draining -> Terminal`, mirroring the lifecycle RFC 9000
//! describes in terms of the handshake, active data transfer, and the
//! closing/draining states entered on either end of a CONNECTION_CLOSE.

use crate::{
    state::{event, is},
    time::{Timer, Timestamp},
};
use core::time::Duration;

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

/// The lifecycle state of a single connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum State {
    /// The connection has been allocated but the handshake has not started
    #[default]
    Initialized,
    /// The handshake is in progress; Initial and/or Handshake keys are installed
    Handshake,
    /// The handshake is confirmed and 1-RTT application data may flow
    Connected,
    /// A CONNECTION_CLOSE has been sent or received; the drain timer is armed
    Closing,
    /// A CONNECTION_CLOSE has been received from the peer; no further sends
    /// are permitted besides possibly a single close packet in response
    Draining,
    /// The drain timer has expired; all connection state may be freed
    Terminal,
}

impl State {
    event! {
        /// The handshake has started (Initial keys installed)
        on_handshake_start(
            Initialized => Handshake,
        );
        /// The handshake has been confirmed by the peer
        on_handshake_confirmed(
            Handshake => Connected,
        );
        /// The application or transport layer requested the connection be closed
        on_close(
            Initialized | Handshake | Connected => Closing,
        );
        /// A CONNECTION_CLOSE frame was received from the peer
        on_peer_close(
            Initialized | Handshake | Connected | Closing => Draining,
        );
        /// The drain timer has expired
        on_drain_timer_expired(
            Closing | Draining => Terminal,
        );
    }

    is!(is_initialized, Initialized);
    is!(is_handshaking, Handshake);
    is!(is_connected, Connected);
    is!(is_closing, Closing);
    is!(is_draining, Draining);
    is!(is_terminal, Terminal);

    /// True once the connection has entered the closing or draining state
    ///
    /// After this point no new application data may be sent, though
    /// outstanding frame-release callbacks must still be invoked (per
    /// the cancellation contract: shutdown does not invalidate in-flight
    /// sent-packet metadata, only the drain timer eventually frees it).
    #[inline]
    pub fn is_closing_or_draining(&self) -> bool {
        self.is_closing() || self.is_draining()
    }

    /// True if the handshake has completed and 1-RTT keys are active
    #[inline]
    pub fn is_handshake_confirmed(&self) -> bool {
        matches!(self, Self::Connected | Self::Closing | Self::Draining)
    }
}

/// Multiplier applied to the current PTO period to compute the drain timer
/// duration, per RFC 9000 section 10.2: "the recommended period is three
/// times the current Probe Timeout (PTO)".
pub const DRAIN_TIMER_PTO_MULTIPLIER: u32 = 3;

/// Tracks the single drain timer armed on entry to `Closing`/`Draining`.
///
/// A connection that has no outstanding drain timer is still alive; once
/// armed, its expiration is the only event that can move the connection to
/// `Terminal`.
#[derive(Clone, Debug, Default)]
pub struct DrainTimer {
    timer: Timer,
}

impl DrainTimer {
    /// Arms the drain timer for `DRAIN_TIMER_PTO_MULTIPLIER * pto_period`
    /// starting at `now`.
    #[inline]
    pub fn arm(&mut self, now: Timestamp, pto_period: Duration) {
        self.timer.set(now + pto_period * DRAIN_TIMER_PTO_MULTIPLIER);
    }

    /// Returns `true` iff the drain timer is armed and has elapsed as of `now`
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.timer.is_expired(now)
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Clock, NoopClock};

    #[test]
    fn happy_path() {
        let mut state = State::Initialized;
        assert!(state.is_initialized());

        state.on_handshake_start().unwrap();
        assert!(state.is_handshaking());
        assert!(!state.is_handshake_confirmed());

        state.on_handshake_confirmed().unwrap();
        assert!(state.is_connected());
        assert!(state.is_handshake_confirmed());

        state.on_close().unwrap();
        assert!(state.is_closing());
        assert!(state.is_closing_or_draining());

        state.on_drain_timer_expired().unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn peer_initiated_close_skips_local_closing() {
        let mut state = State::Connected;
        state.on_peer_close().unwrap();
        assert!(state.is_draining());
        assert!(state.is_closing_or_draining());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut state = State::Initialized;
        assert!(state.on_handshake_confirmed().is_err());
        // the invalid transition must not have mutated the state
        assert!(state.is_initialized());
    }

    #[test]
    fn drain_timer_arms_for_three_pto() {
        let now = NoopClock.get_time();
        let pto = Duration::from_millis(100);

        let mut timer = DrainTimer::default();
        assert!(!timer.is_armed());

        timer.arm(now, pto);
        assert!(timer.is_armed());
        assert!(!timer.is_expired(now + pto * 2));
        assert!(timer.is_expired(now + pto * 3));
    }
}
