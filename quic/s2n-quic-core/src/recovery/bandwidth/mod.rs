// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod estimator;

pub use estimator::{Bandwidth, Estimator, PacketInfo, RateSample};
