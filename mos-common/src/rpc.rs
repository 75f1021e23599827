// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Single named method calls over a session's channel.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::protocol::{Command, REBOOT_METHOD, REBOOT_SETTLE};
use crate::session::{DeviceSession, RpcChannel};

/// True for a JSON object, array or bare string.
pub fn is_json_args(args: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(args),
        Ok(Value::Object(_) | Value::Array(_) | Value::String(_))
    )
}

/// Validate user-supplied call arguments. Empty means no arguments.
pub fn parse_args(args: &str) -> Result<Option<Box<RawValue>>> {
    if args.is_empty() {
        return Ok(None);
    }
    if !is_json_args(args) {
        return Err(Error::InvalidArgument(format!(
            "args [{}] is not a valid JSON string",
            args
        )));
    }
    RawValue::from_string(args.to_string())
        .map(Some)
        .map_err(|e| Error::InvalidArgument(format!("args [{}]: {}", args, e)))
}

/// Issues requests to one destination and checks the reply status.
pub struct ServiceClient<'s> {
    channel: &'s mut dyn RpcChannel,
    dest: &'s str,
}

impl<'s> ServiceClient<'s> {
    pub fn new(channel: &'s mut dyn RpcChannel, dest: &'s str) -> Self {
        Self { channel, dest }
    }

    pub fn dest(&self) -> &str {
        self.dest
    }

    /// Send pre-encoded arguments; a nonzero status becomes [`Error::Remote`].
    pub fn call_raw(
        &mut self,
        method: &str,
        args: Option<&RawValue>,
        cancel: &CancelToken,
    ) -> Result<Option<Value>> {
        cancel.check(method)?;
        let cmd = Command { cmd: method, args };
        log::debug!("Calling {} (dest {:?})", method, self.dest);

        let resp = self.channel.call(self.dest, &cmd, cancel)?;
        if !resp.is_ok() {
            return Err(Error::Remote {
                status: resp.status,
                message: resp.status_msg.unwrap_or_default(),
            });
        }
        Ok(resp.response)
    }

    /// Encode `args`, call `method` and decode the payload.
    /// A missing or null payload decodes to `None`.
    pub fn invoke<A, R>(
        &mut self,
        method: &str,
        args: Option<&A>,
        cancel: &CancelToken,
    ) -> Result<Option<R>>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let raw = args
            .map(to_raw_value)
            .transpose()
            .map_err(|e| Error::InvalidArgument(format!("encoding {} args: {}", method, e)))?;

        match self.call_raw(method, raw.as_deref(), cancel)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::Protocol(format!("decoding {} response: {}", method, e))),
        }
    }
}

/// Call `method` with JSON `args` and return the payload pretty-printed.
///
/// Arguments are validated before anything is sent. An empty payload is a
/// successful `null`. A reboot request is followed by a fixed pause so the
/// device has restarted before the next request goes out.
pub fn call(
    session: &mut DeviceSession,
    method: &str,
    args: &str,
    cancel: &CancelToken,
) -> Result<String> {
    if method.is_empty() {
        return Err(Error::InvalidArgument("method required".to_string()));
    }
    let args = parse_args(args)?;

    let payload = session
        .service()?
        .call_raw(method, args.as_deref(), cancel)?;

    if method == REBOOT_METHOD {
        session.pause(REBOOT_SETTLE);
    }

    serde_json::to_string_pretty(&payload.unwrap_or(Value::Null))
        .map_err(|e| Error::Protocol(format!("formatting {} response: {}", method, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_argument_shapes() {
        for args in ["{}", "[1,2]", "\"s\"", r#"{"a": {"b": null}}"#] {
            assert!(is_json_args(args), "{} should be accepted", args);
        }
    }

    #[test]
    fn test_rejected_argument_shapes() {
        for args in ["not json", "42", "true", "null", "{", " "] {
            assert!(!is_json_args(args), "{} should be rejected", args);
        }
    }

    #[test]
    fn test_parse_args_empty_is_absent() {
        assert!(parse_args("").unwrap().is_none());
        assert_eq!(parse_args("[1,2]").unwrap().unwrap().get(), "[1,2]");
    }
}
