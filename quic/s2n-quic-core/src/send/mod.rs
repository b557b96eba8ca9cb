// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet construction: assembling, padding, and finalizing outbound
//! datagrams from the frames a connection wants to transmit.

mod builder;

pub use builder::*;
