// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod activity;
pub mod backoff;
pub mod config;
pub mod delivery;
pub mod envelope;
pub mod errors;
pub mod feed;
pub mod forwarder;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod pipeline;
pub mod poller;
pub mod producer;
pub mod token;
pub mod window;
