// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared protocol types for host <-> device RPC.
//!
//! Covers the method call envelope and the argument/result shapes of the
//! chunked filesystem, configuration and variables services.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

// --- Session constants ---

/// Identity this tool announces as the frame source.
pub const LOCAL_ID: &str = "mos";

/// Empty destination: the directly attached device.
pub const DIRECT_DEST: &str = "";

/// Settle time after closing a channel before it may be reopened.
pub const DISCONNECT_SETTLE: Duration = Duration::from_millis(500);

/// Method that makes the device restart about 100 ms after it acknowledges.
pub const REBOOT_METHOD: &str = "Sys.Reboot";

/// Pause after a reboot request before the next request may be sent.
pub const REBOOT_SETTLE: Duration = Duration::from_millis(200);

// --- Chunked file transfer ---

/// Chunk size for FS.Get and FS.Put. Identical on both paths; changing it
/// breaks compatibility with deployed devices.
pub const FS_CHUNK_SIZE: usize = 512;

pub const FS_LIST: &str = "FS.List";
pub const FS_GET: &str = "FS.Get";
pub const FS_PUT: &str = "FS.Put";
pub const FS_REMOVE: &str = "FS.Remove";

pub const CONFIG_GET: &str = "Config.Get";
pub const CONFIG_SET: &str = "Config.Set";
pub const VARS_GET: &str = "Vars.Get";

// --- Method call envelope ---

/// Request half of the envelope: `{cmd, args?}`.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct Command<'a> {
    pub cmd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<&'a RawValue>,
}

impl<'a> Command<'a> {
    pub fn new(cmd: &'a str) -> Self {
        Self { cmd, args: None }
    }

    pub fn with_args(cmd: &'a str, args: &'a RawValue) -> Self {
        Self {
            cmd,
            args: Some(args),
        }
    }
}

/// Response half of the envelope. `status == 0` is success.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Response {
    #[serde(default)]
    pub status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl Response {
    pub fn ok(response: Option<Value>) -> Self {
        Self {
            status: 0,
            status_msg: None,
            response,
        }
    }

    pub fn error(status: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            status_msg: Some(message.into()),
            response: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

// --- Filesystem service ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GetArgs {
    pub filename: String,
    pub offset: i64,
    pub len: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GetResult {
    /// Standard Base64.
    pub data: String,
    /// Bytes remaining after this chunk; 0 ends the transfer.
    pub left: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PutArgs {
    pub filename: String,
    /// Standard Base64.
    pub data: String,
    pub append: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoveArgs {
    pub filename: String,
}

// --- Configuration service ---

#[derive(Serialize, Debug)]
pub struct ConfigSetArgs<'a> {
    pub config: &'a Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_without_args_omits_field() {
        let json = serde_json::to_string(&Command::new("Sys.GetInfo")).unwrap();
        assert_eq!(json, r#"{"cmd":"Sys.GetInfo"}"#);
    }

    #[test]
    fn test_command_args_are_embedded_verbatim() {
        let args = RawValue::from_string(r#"{"a": [1, 2]}"#.to_string()).unwrap();
        let json = serde_json::to_string(&Command::with_args("X.Y", &args)).unwrap();
        assert_eq!(json, r#"{"cmd":"X.Y","args":{"a": [1, 2]}}"#);
    }

    #[test]
    fn test_response_defaults_to_success() {
        let resp: Response = serde_json::from_str("{}").unwrap();
        assert!(resp.is_ok());
        assert!(resp.response.is_none());
    }

    #[test]
    fn test_get_args_wire_names() {
        let json = serde_json::to_value(GetArgs {
            filename: "conf.json".into(),
            offset: 1024,
            len: FS_CHUNK_SIZE as i64,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"filename": "conf.json", "offset": 1024, "len": 512})
        );
    }
}
