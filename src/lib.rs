// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]

pub mod record;
pub mod metrics;
pub mod health;
pub mod store;
pub mod capture;
pub mod export;
pub mod query;
pub mod config;
pub mod server;
mod system;

pub use self::system::System;
