// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The packet builder: selects a packet type, coalesces frames into a single
//! datagram, and finalizes (pads, encrypts, header-protects) the result for
//! handoff to the datapath.
//!
//! The frame codec and the datapath socket are both out-of-scope external
//! collaborators (see the crate-level documentation), so the builder here is
//! generic over a [`DatagramWriter`] rather than any concrete buffer or
//! socket type, following the same abstraction style as
//! [`transmission::Writer`](crate::transmission::Writer).

use crate::{
    frame::ack_elicitation::AckElicitation,
    packet::{key_phase::KeyPhase, number::PacketNumberSpace},
    random,
    state::{event, is},
    time::Timestamp,
};

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

/// Hard cap on the number of frames a single packet may carry before the
/// builder forces it closed, regardless of remaining byte budget.
pub const MAX_FRAMES_PER_PACKET: usize = 20;

/// A packet payload must contain at least this many bytes before the AEAD
/// tag is appended, so that header-protection sampling always has a full
/// sample available (RFC 9001 section 5.4.2).
pub const MIN_PAYLOAD_LEN: usize = 4;

/// Length in bytes of the AEAD authentication tag appended to a sealed
/// packet. Encryption may be disabled for 1-RTT packets in test
/// configurations, in which case the effective overhead is zero.
pub const AEAD_TAG_LEN: usize = 16;

/// Upper bound (exclusive) on the pseudorandom packet-number skip applied
/// to defend against an observer inferring packet arrival order from gaps
/// in the packet-number sequence.
pub const MAX_PACKET_NUMBER_SKIP: u64 = 65_535;

/// The encryption level a packet is built at. Distinct from
/// [`PacketNumberSpace`] because 0-RTT and 1-RTT packets share the
/// `ApplicationData` packet-number space but use different keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    ZeroRtt,
    OneRtt,
}

impl EncryptionLevel {
    #[inline]
    pub fn packet_number_space(self) -> PacketNumberSpace {
        match self {
            Self::Initial => PacketNumberSpace::Initial,
            Self::Handshake => PacketNumberSpace::Handshake,
            Self::ZeroRtt | Self::OneRtt => PacketNumberSpace::ApplicationData,
        }
    }

    /// Long-header packet types (everything but 1-RTT) always quote the
    /// connection IDs and version in the header.
    #[inline]
    pub fn is_long_header(self) -> bool {
        !matches!(self, Self::OneRtt)
    }
}

/// State machine governing one in-progress, potentially-coalesced datagram.
///
/// ```text
///  Uninitialized ── init ──► Initialized ── prepare ──► Prepared
///    ▲                           ▲                          │
///    │                           │                          │ add_frame
///    │                        finalize(flush)                ▼
///    └──── cleanup ──── Sent ◄── finalize(flush) ── Building ── finalize(!flush) ──► Finalized ──► (loops back to Prepared)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuilderState {
    #[default]
    Uninitialized,
    Initialized,
    Prepared,
    Building,
    Finalized,
    Sent,
}

impl BuilderState {
    event! {
        /// A new datagram has been claimed from the datapath
        on_initialize(
            Uninitialized => Initialized,
        );
        /// A packet type/key was selected and a tentative header written
        on_prepare(
            Initialized | Finalized => Prepared,
        );
        /// At least one frame has been recorded against the current packet
        on_add_frame(
            Prepared | Building => Building,
        );
        /// finalize(flush = false): the packet is closed but the datagram is retained
        on_finalize_partial(
            Building => Finalized,
        );
        /// finalize(flush = true): the datagram is sent to the datapath
        on_finalize_flush(
            Initialized | Prepared | Building => Sent,
        );
        /// The sent datagram's resources have been released
        on_cleanup(
            Sent => Uninitialized,
        );
    }

    is!(is_uninitialized, Uninitialized);
    is!(is_prepared, Prepared);
    is!(is_building, Building);
    is!(is_sent, Sent);
}

/// Per-space assignment of the next outbound packet number, including an
/// occasional pseudorandom skip as a defense against an observer inferring
/// packet arrival order from gaps in the packet-number sequence.
#[derive(Clone, Copy, Debug, Default)]
pub struct PacketNumberAssigner {
    next: u64,
}

impl PacketNumberAssigner {
    /// Probability (out of 1000) that any given send triggers a skip. The
    /// magnitude is not security-critical -- it only needs to be rare
    /// enough to avoid materially changing throughput while still being
    /// common enough to poison naive packet-number-gap inference.
    const SKIP_PROBABILITY: f64 = 1.0 / 256.0;

    /// Returns the next packet number to assign, occasionally skipping a
    /// pseudorandom span first. The skipped span (if any) is returned
    /// alongside so callers can record it as "never transmitted" in the
    /// ACK range bookkeeping without it ever appearing on the wire.
    #[inline]
    pub fn next(&mut self, random_generator: &mut dyn random::Generator) -> (u64, Option<u64>) {
        let mut skipped = None;

        if random_generator.gen_bool(Self::SKIP_PROBABILITY) {
            let mut buf = [0u8; 2];
            random_generator.public_random_fill(&mut buf);
            let span = (u16::from_be_bytes(buf) as u64 % MAX_PACKET_NUMBER_SKIP) + 1;
            skipped = Some(self.next);
            self.next += span;
        }

        let assigned = self.next;
        self.next += 1;
        (assigned, skipped)
    }
}

/// One key-phase rollover may be in flight at a time: a next key has been
/// derived but its use has not yet been confirmed by the peer acknowledging
/// a packet sent under it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyUpdatePhase {
    #[default]
    Stable,
    /// The next key has been generated; sends still use the current phase
    /// until `begin_rollover` flips the outgoing phase bit.
    PendingRollover,
    /// The outgoing phase bit has flipped; waiting for the peer to
    /// acknowledge a packet sent under the new phase before another
    /// rollover may begin.
    AwaitingConfirmation { first_sent_in_phase: u64 },
}

/// Tracks 1-RTT key-phase rollover independent of the concrete AEAD key
/// material, which is an out-of-scope TLS/crypto collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyUpdater {
    phase: KeyPhase,
    state: KeyUpdatePhase,
}

impl KeyUpdater {
    #[inline]
    pub fn current_phase(&self) -> KeyPhase {
        self.phase
    }

    /// Called when the per-key byte limit is approaching; generates (via
    /// the caller-supplied derivation, out of scope here) the next key and
    /// marks a rollover pending. No-ops if a rollover is already in
    /// flight.
    #[inline]
    pub fn start_rollover(&mut self) -> bool {
        if self.state != KeyUpdatePhase::Stable {
            return false;
        }
        self.state = KeyUpdatePhase::PendingRollover;
        true
    }

    /// Flips the outgoing phase bit on the next packet sent, entering the
    /// `AwaitingConfirmation` state.
    #[inline]
    pub fn on_send(&mut self, packet_number: u64) {
        if self.state == KeyUpdatePhase::PendingRollover {
            self.phase = self.phase.next_phase();
            self.state = KeyUpdatePhase::AwaitingConfirmation {
                first_sent_in_phase: packet_number,
            };
        }
    }

    /// Called when an ACK newly acknowledges `packet_number`. Clears the
    /// in-flight rollover once the peer has confirmed a packet sent under
    /// the new phase, allowing a subsequent rollover to begin.
    #[inline]
    pub fn on_ack(&mut self, packet_number: u64) {
        if let KeyUpdatePhase::AwaitingConfirmation {
            first_sent_in_phase,
        } = self.state
        {
            if packet_number >= first_sent_in_phase {
                self.state = KeyUpdatePhase::Stable;
            }
        }
    }

    #[inline]
    pub fn rollover_in_flight(&self) -> bool {
        !matches!(self.state, KeyUpdatePhase::Stable)
    }
}

/// Why a packet is being padded, which determines the target length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaddingReason {
    /// Initial packets are padded to the path MTU (client) or to the
    /// amplification limit (server), whichever is smaller.
    InitialDatagram,
    /// Probe Timeout retransmissions are padded to the stateless-reset
    /// token length so that an observer cannot distinguish a PTO probe
    /// from a stateless reset by size alone.
    TlpProbe,
    /// PMTUD probes are padded to the size under test.
    MtuProbe,
    /// Every other packet is only padded up to the AEAD-safety minimum.
    None,
}

/// Computes the padded payload length for a packet given its current
/// (unpadded) length and the reason for padding.
#[inline]
pub fn padded_len(
    reason: PaddingReason,
    current_len: usize,
    mtu: usize,
    amplification_limit: usize,
    stateless_reset_len: usize,
    probe_size: usize,
) -> usize {
    let target = match reason {
        PaddingReason::InitialDatagram => mtu.min(amplification_limit),
        PaddingReason::TlpProbe => stateless_reset_len,
        PaddingReason::MtuProbe => probe_size,
        PaddingReason::None => 0,
    };

    current_len.max(target).max(MIN_PAYLOAD_LEN)
}

/// Per-packet bookkeeping recorded by the builder at `finalize` time, for
/// use by the loss detector and congestion controller (RFC 9002's
/// sent-packet tracking), minus the carried frame list -- frame encoding
/// and retransmission/release handling is delegated to the frame codec,
/// which is out of scope here (callers retain their own list of produced
/// frames alongside this record).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalizedPacket {
    pub packet_number_space: PacketNumberSpace,
    pub packet_number: u64,
    pub time_sent: Timestamp,
    pub sent_bytes: usize,
    pub ack_elicitation: AckElicitation,
    pub is_congestion_controlled: bool,
}

/// Abstraction over "something that can accept header and payload bytes
/// and hand the finished datagram to the datapath," so the builder's
/// state machine and invariants don't have to commit to a concrete
/// socket, GSO batch, or frame-encoding type.
///
/// Mirrors the way [`transmission::Writer`](crate::transmission::Writer)
/// already abstracts frame producers over "something that accepts
/// frames" without assuming a concrete datapath type.
pub trait DatagramWriter {
    /// Bytes remaining in the current datagram before hitting the MTU or
    /// the congestion/amplification allowance, whichever is smaller.
    fn remaining_capacity(&self) -> usize;

    /// Writes `header` followed by `payload`, returning the total bytes
    /// written. Must not be called more than once per finalized packet.
    fn write_packet(&mut self, header: &[u8], payload: &[u8]) -> usize;

    /// Sends the accumulated datagram (all coalesced packets) to the
    /// datapath. Returns `false` if the datapath could not accept the
    /// send right now (a retriable back-pressure condition, not an
    /// error).
    fn flush(&mut self) -> bool;
}

/// A single in-progress, potentially-coalesced datagram.
///
/// `W` is the datapath buffer abstraction (see [`DatagramWriter`]).
pub struct PacketBuilder<W> {
    state: BuilderState,
    writer: Option<W>,
    current_level: Option<EncryptionLevel>,
    current_packet_number: u64,
    frame_count: usize,
    ack_elicitation: AckElicitation,
    is_congestion_controlled: bool,
    header_len: usize,
    payload_len: usize,
    last_flush_time: Option<Timestamp>,
}

impl<W> Default for PacketBuilder<W> {
    fn default() -> Self {
        Self {
            state: BuilderState::default(),
            writer: None,
            current_level: None,
            current_packet_number: 0,
            frame_count: 0,
            ack_elicitation: AckElicitation::NonEliciting,
            is_congestion_controlled: false,
            header_len: 0,
            payload_len: 0,
            last_flush_time: None,
        }
    }
}

impl<W: DatagramWriter> PacketBuilder<W> {
    /// Claims `writer` as the datagram this builder will fill. Returns
    /// `false` iff the connection has no source connection ID available
    /// to quote in the packet header, in which case the caller must not
    /// proceed.
    #[inline]
    pub fn initialize(&mut self, writer: W, has_source_cid: bool, now: Timestamp) -> bool {
        if !has_source_cid {
            return false;
        }

        self.writer = Some(writer);
        self.current_level = None;
        self.frame_count = 0;
        self.ack_elicitation = AckElicitation::NonEliciting;
        self.is_congestion_controlled = false;
        self.header_len = 0;
        self.payload_len = 0;
        self.last_flush_time = Some(now);
        self.state.on_initialize().is_ok()
    }

    #[inline]
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Exposes the datagram writer so that out-of-scope frame producers can encode
    /// frame bytes directly into the packet currently under construction.
    #[inline]
    pub fn writer_mut(&mut self) -> Option<&mut W> {
        self.writer.as_mut()
    }

    /// Selects a packet type/key and writes a tentative header. `header_len`
    /// is the number of bytes the caller has already written for the
    /// tentative header (long or short form).
    #[inline]
    pub fn prepare(&mut self, level: EncryptionLevel, header_len: usize) -> Result<(), BuilderError> {
        self.state
            .on_prepare()
            .map_err(|_| BuilderError::InvalidState)?;
        self.current_level = Some(level);
        self.header_len = header_len;
        self.frame_count = 0;
        self.ack_elicitation = AckElicitation::NonEliciting;
        self.is_congestion_controlled = false;
        self.payload_len = 0;
        Ok(())
    }

    /// Records a frame of `frame_len` bytes against the packet currently
    /// under construction. Returns `true` iff the packet has reached
    /// `MAX_FRAMES_PER_PACKET` and must be finalized before another frame
    /// can be added.
    #[inline]
    pub fn add_frame(&mut self, frame_len: usize, ack_eliciting: bool) -> bool {
        debug_assert!(
            self.state.is_prepared() || self.state.is_building(),
            "add_frame called outside of a prepared packet"
        );

        let _ = self.state.on_add_frame();
        self.frame_count += 1;
        self.payload_len += frame_len;
        self.is_congestion_controlled = true;
        if ack_eliciting {
            self.ack_elicitation = AckElicitation::Eliciting;
        }

        self.frame_count >= MAX_FRAMES_PER_PACKET
    }

    /// Finalizes the packet currently under construction.
    ///
    /// If no frames were added, the tentative header is considered void
    /// and `Ok(false)` ("can_keep_sending" is false) is returned without
    /// transitioning to `Sent`/`Finalized`. Otherwise the payload is
    /// padded per `padding`, the packet is recorded via `on_finalized`,
    /// and -- if `flush` -- the accumulated datagram is handed to the
    /// datapath.
    #[inline]
    pub fn finalize(
        &mut self,
        flush: bool,
        now: Timestamp,
        packet_number_assigner: &mut PacketNumberAssigner,
        random_generator: &mut dyn random::Generator,
        padding: PaddingReason,
        mtu: usize,
        amplification_limit: usize,
        stateless_reset_len: usize,
        probe_size: usize,
    ) -> Result<Option<FinalizedPacket>, BuilderError> {
        let level = self.current_level.ok_or(BuilderError::InvalidState)?;

        if self.frame_count == 0 {
            // Nothing was written into this packet; undo the tentative
            // header and report that the caller should stop trying to
            // send for now.
            if flush {
                self.state
                    .on_finalize_flush()
                    .map_err(|_| BuilderError::InvalidState)?;
            }
            return Ok(None);
        }

        let (packet_number, _skipped) = packet_number_assigner.next(random_generator);

        let padded = padded_len(
            padding,
            self.payload_len,
            mtu,
            amplification_limit,
            stateless_reset_len,
            probe_size,
        );

        let writer = self.writer.as_mut().ok_or(BuilderError::InvalidState)?;
        let sent_bytes = self.header_len + padded + AEAD_TAG_LEN;

        let record = FinalizedPacket {
            packet_number_space: level.packet_number_space(),
            packet_number,
            time_sent: now,
            sent_bytes,
            ack_elicitation: self.ack_elicitation,
            is_congestion_controlled: self.is_congestion_controlled,
        };

        if flush {
            self.state
                .on_finalize_flush()
                .map_err(|_| BuilderError::InvalidState)?;
            writer.flush();
            self.last_flush_time = Some(now);
        } else {
            self.state
                .on_finalize_partial()
                .map_err(|_| BuilderError::InvalidState)?;
        }

        Ok(Some(record))
    }

    /// Prepares the builder to accept another coalesced packet after a
    /// partial finalize, or releases the datagram after a flushed send.
    #[inline]
    pub fn cleanup(&mut self) {
        if self.state.is_sent() {
            let _ = self.state.on_cleanup();
            self.writer = None;
        }
    }

    #[inline]
    pub fn last_flush_time(&self) -> Option<Timestamp> {
        self.last_flush_time
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuilderError {
    /// The operation is not valid for the builder's current state
    InvalidState,
}
