// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A minimal in-memory `Writer` used by unit tests of congestion control, loss
//! recovery, and the ACK tracker, none of which need a real packet builder.

use crate::{
    endpoint,
    event::{self, IntoEvent},
    frame::{
        ack::AckRanges as AckRangesTrait,
        ack_elicitation::{AckElicitable, AckElicitation},
        Ack, FrameTrait,
    },
    packet::number::{PacketNumber, PacketNumberSpace},
    time::Timestamp,
    transmission,
    varint::VarInt,
};
use s2n_codec::encoder::EncoderValue;

/// Records the tag of every frame written, in order, so tests can assert on what a
/// component attempted to send without decoding an actual datagram.
#[derive(Debug, Default)]
pub struct OutgoingFrameBuffer {
    frames: alloc::vec::Vec<event::builder::Frame>,
}

impl OutgoingFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[event::builder::Frame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A `Writer` that never runs out of capacity and accepts every frame given to it.
pub struct Writer<'a> {
    now: Timestamp,
    buffer: &'a mut OutgoingFrameBuffer,
    constraint: transmission::Constraint,
    mode: transmission::Mode,
    local_endpoint_type: endpoint::Type,
    packet_number: PacketNumber,
    ack_elicitation: AckElicitation,
}

impl<'a> Writer<'a> {
    pub fn new(
        now: Timestamp,
        buffer: &'a mut OutgoingFrameBuffer,
        constraint: transmission::Constraint,
        mode: transmission::Mode,
        local_endpoint_type: endpoint::Type,
    ) -> Self {
        Self {
            now,
            buffer,
            constraint,
            mode,
            local_endpoint_type,
            packet_number: PacketNumberSpace::Initial.new_packet_number(VarInt::from_u8(0)),
            ack_elicitation: AckElicitation::NonEliciting,
        }
    }

    fn push<Frame>(&mut self, frame: &Frame) -> PacketNumber
    where
        Frame: EncoderValue + FrameTrait,
        for<'frame> &'frame Frame: IntoEvent<event::builder::Frame>,
    {
        let event = frame.into_event();
        self.ack_elicitation |= frame.ack_elicitation();
        self.buffer.frames.push(event);
        self.packet_number
    }
}

impl<'a> transmission::Writer for Writer<'a> {
    #[inline]
    fn current_time(&self) -> Timestamp {
        self.now
    }

    #[inline]
    fn transmission_constraint(&self) -> transmission::Constraint {
        self.constraint
    }

    #[inline]
    fn transmission_mode(&self) -> transmission::Mode {
        self.mode
    }

    #[inline]
    fn remaining_capacity(&self) -> usize {
        usize::MAX
    }

    #[inline]
    fn write_ack_frame<AckRanges: AckRangesTrait>(
        &mut self,
        _ack_frame: &Ack<AckRanges>,
    ) -> Option<PacketNumber> {
        self.ack_elicitation |= AckElicitation::NonEliciting;
        Some(self.packet_number)
    }

    #[inline]
    fn write_frame<Frame>(&mut self, frame: &Frame) -> Option<PacketNumber>
    where
        Frame: EncoderValue + FrameTrait,
        for<'frame> &'frame Frame: IntoEvent<event::builder::Frame>,
    {
        Some(self.push(frame))
    }

    #[inline]
    fn write_fitted_frame<Frame>(&mut self, frame: &Frame) -> PacketNumber
    where
        Frame: EncoderValue + FrameTrait,
        for<'frame> &'frame Frame: IntoEvent<event::builder::Frame>,
    {
        self.push(frame)
    }

    #[inline]
    fn write_frame_forced<Frame>(&mut self, frame: &Frame) -> Option<PacketNumber>
    where
        Frame: EncoderValue + FrameTrait,
        for<'frame> &'frame Frame: IntoEvent<event::builder::Frame>,
    {
        Some(self.push(frame))
    }

    #[inline]
    fn ack_elicitation(&self) -> AckElicitation {
        self.ack_elicitation
    }

    #[inline]
    fn packet_number(&self) -> PacketNumber {
        self.packet_number
    }

    #[inline]
    fn local_endpoint_type(&self) -> endpoint::Type {
        self.local_endpoint_type
    }

    #[inline]
    fn header_len(&self) -> usize {
        1
    }

    #[inline]
    fn tag_len(&self) -> usize {
        16
    }
}
