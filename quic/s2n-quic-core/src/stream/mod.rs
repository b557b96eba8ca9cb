// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Stream identifiers referenced by frame types and by sent-packet metadata.
//!
//! The stream byte-stream state machine itself (reassembly, flow control,
//! application-facing read/write) is outside the scope of the transport
//! engine this crate implements; connections refer to streams only by
//! [`StreamId`] index.

mod id;
mod type_;

pub use id::*;
pub use type_::*;
