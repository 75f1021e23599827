// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Device-facing control layer for the `mos` firmware tool.
//!
//! The crate covers the parts of the tool where timing, partial failure and
//! byte-exact framing meet:
//! - [`session`]: one logical connection to a device over an injected RPC channel
//! - [`rpc`]: single named method calls with JSON arguments
//! - [`fs`]: chunked get/put/list/remove of device-resident files
//! - [`boot`]: GPIO bit-bang sequences forcing a board into bootloader or run mode
//! - [`package`] and [`build_service`]: shipping a filtered source tree to the
//!   remote build service and unpacking its result

pub mod archive;
pub mod boot;
pub mod build_service;
pub mod cancel;
pub mod cobs;
pub mod config;
pub mod error;
pub mod firmware;
pub mod fs;
pub mod manifest;
pub mod pacing;
pub mod package;
pub mod protocol;
pub mod rpc;
pub mod session;
pub mod skeleton;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use config::{BuildConfig, Config, DeviceConfig};
pub use error::{Error, ErrorKind, Result};
pub use protocol::{Command, Response, FS_CHUNK_SIZE};
pub use session::{ChannelFactory, ConnectOptions, DeviceSession, RpcChannel};
