// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Lifecycle of one logical connection to a device.
//!
//! The wire framing lives behind [`RpcChannel`]; a [`ChannelFactory`] is
//! injected so the session works the same over serial, TCP or an in-memory
//! fake. At most one channel is live per session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cancel::CancelToken;
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::fs::FsClient;
use crate::pacing::{pause, StdDelay};
use crate::protocol::{
    Command, ConfigSetArgs, Response, CONFIG_GET, CONFIG_SET, DIRECT_DEST, DISCONNECT_SETTLE,
    LOCAL_ID, VARS_GET,
};
use crate::rpc::ServiceClient;

/// Receives bytes read from the link that are not part of any reply frame
/// (device console output, line noise).
pub type JunkHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Options handed to the channel factory on connect.
#[derive(Clone)]
pub struct ConnectOptions {
    pub local_id: String,
    /// Re-establish the link after an unexpected drop (not after `disconnect`).
    pub reconnect: bool,
    pub junk_handler: JunkHandler,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("local_id", &self.local_id)
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

/// An established RPC channel.
pub trait RpcChannel: Send {
    /// Send one request to `dest` and wait for its reply.
    fn call(&mut self, dest: &str, cmd: &Command<'_>, cancel: &CancelToken) -> Result<Response>;

    /// Close the channel. It is not reopened afterwards, even with reconnect on.
    fn disconnect(&mut self, cancel: &CancelToken) -> Result<()>;
}

/// Opens channels for a device address.
pub trait ChannelFactory {
    fn open(
        &self,
        address: &str,
        opts: &ConnectOptions,
        cancel: &CancelToken,
    ) -> Result<Box<dyn RpcChannel>>;
}

fn ignore_junk() -> JunkHandler {
    Arc::new(|_junk: &[u8]| {})
}

pub struct DeviceSession {
    address: String,
    dest: String,
    reconnect: bool,
    junk_handler: JunkHandler,
    factory: Box<dyn ChannelFactory>,
    channel: Option<Box<dyn RpcChannel>>,
    delay: Box<dyn DelayNs + Send>,
}

impl DeviceSession {
    /// A disconnected session addressing the directly attached device.
    pub fn new(address: impl Into<String>, factory: Box<dyn ChannelFactory>) -> Self {
        Self {
            address: address.into(),
            dest: DIRECT_DEST.to_string(),
            reconnect: false,
            junk_handler: ignore_junk(),
            factory,
            channel: None,
            delay: Box::new(StdDelay),
        }
    }

    pub fn from_config(cfg: &DeviceConfig, factory: Box<dyn ChannelFactory>) -> Result<Self> {
        let mut session = Self::new(cfg.address()?, factory);
        session.reconnect = cfg.reconnect;
        Ok(session)
    }

    pub fn with_junk_handler(mut self, handler: JunkHandler) -> Self {
        self.junk_handler = handler;
        self
    }

    /// Replace the delay used for pacing sleeps.
    pub fn with_delay(mut self, delay: impl DelayNs + Send + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn reconnect(&self) -> bool {
        self.reconnect
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Establish the channel. No-op when already connected.
    pub fn connect(&mut self, reconnect: bool, cancel: &CancelToken) -> Result<()> {
        if self.channel.is_some() {
            return Ok(());
        }
        cancel.check("connect")?;

        self.reconnect = reconnect;
        let opts = ConnectOptions {
            local_id: LOCAL_ID.to_string(),
            reconnect,
            junk_handler: Arc::clone(&self.junk_handler),
        };

        log::debug!("Connecting to {} (reconnect: {})", self.address, reconnect);
        let channel = self.factory.open(&self.address, &opts, cancel)?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Close the channel and wait for the port to settle.
    ///
    /// The channel reference is cleared and the settle delay honoured even
    /// when closing fails; the close error is returned afterwards.
    pub fn disconnect(&mut self, cancel: &CancelToken) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };
        log::debug!("Disconnecting from {}", self.address);
        let result = channel.disconnect(cancel);
        drop(channel);

        // Reopening a serial port right after closing it fails on some
        // platforms; wait everywhere.
        pause(self.delay.as_mut(), DISCONNECT_SETTLE);
        result
    }

    /// Blocking pause through the session's delay. Not cancellable.
    pub fn pause(&mut self, duration: Duration) {
        pause(self.delay.as_mut(), duration);
    }

    /// Raw service client bound to the session's destination.
    pub fn service(&mut self) -> Result<ServiceClient<'_>> {
        let channel = self
            .channel
            .as_deref_mut()
            .ok_or_else(|| Error::transport("call", format!("not connected to {}", self.address)))?;
        Ok(ServiceClient::new(channel, &self.dest))
    }

    pub fn config(&mut self) -> Result<ConfigClient<'_>> {
        Ok(ConfigClient {
            inner: self.service()?,
        })
    }

    pub fn vars(&mut self) -> Result<VarsClient<'_>> {
        Ok(VarsClient {
            inner: self.service()?,
        })
    }

    pub fn filesystem(&mut self) -> Result<FsClient<'_>> {
        Ok(FsClient::new(self.service()?))
    }

    pub fn get_config(&mut self, cancel: &CancelToken) -> Result<DevConf> {
        self.config()?.get(cancel)
    }

    pub fn set_config(&mut self, conf: &DevConf, cancel: &CancelToken) -> Result<()> {
        self.config()?.set(conf, cancel)
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("address", &self.address)
            .field("dest", &self.dest)
            .field("reconnect", &self.reconnect)
            .field("connected", &self.channel.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct NoArgs {}

/// Configuration service client.
pub struct ConfigClient<'s> {
    inner: ServiceClient<'s>,
}

impl ConfigClient<'_> {
    pub fn get(&mut self, cancel: &CancelToken) -> Result<DevConf> {
        let data: Option<Value> = self.inner.invoke(CONFIG_GET, Some(&NoArgs {}), cancel)?;
        let data = data.ok_or_else(|| Error::Protocol("empty configuration response".into()))?;
        DevConf::from_value(data)
    }

    /// The document is encoded straight into the request when it is sent.
    pub fn set(&mut self, conf: &DevConf, cancel: &CancelToken) -> Result<()> {
        let args = ConfigSetArgs { config: &conf.data };
        let _: Option<Value> = self.inner.invoke(CONFIG_SET, Some(&args), cancel)?;
        Ok(())
    }
}

/// Device variables service client.
pub struct VarsClient<'s> {
    inner: ServiceClient<'s>,
}

impl VarsClient<'_> {
    pub fn get(&mut self, cancel: &CancelToken) -> Result<Value> {
        let vars: Option<Value> = self.inner.invoke(VARS_GET, Some(&NoArgs {}), cancel)?;
        Ok(vars.unwrap_or(Value::Null))
    }
}

/// Device configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct DevConf {
    data: Value,
}

impl DevConf {
    pub fn from_value(data: Value) -> Result<Self> {
        if !data.is_object() {
            return Err(Error::Protocol(
                "device configuration is not a JSON object".into(),
            ));
        }
        Ok(Self { data })
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Look up a dotted path such as `wifi.sta.ssid`. Empty path is the root.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.data);
        }
        path.split('.')
            .try_fold(&self.data, |node, key| node.as_object()?.get(key))
    }

    /// Set a dotted path. `raw` is stored as JSON when it parses, otherwise
    /// as a string. Missing intermediate objects are created.
    pub fn set(&mut self, path: &str, raw: &str) -> Result<()> {
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        let keys: Vec<&str> = path.split('.').collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(Error::InvalidArgument(format!("bad config path {:?}", path)));
        }
        let (last, parents) = keys
            .split_last()
            .ok_or_else(|| Error::InvalidArgument("empty config path".into()))?;

        let mut node = &mut self.data;
        for key in parents {
            let obj = node.as_object_mut().ok_or_else(|| {
                Error::InvalidArgument(format!("{:?}: {} is not an object", path, key))
            })?;
            node = obj
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let obj = node.as_object_mut().ok_or_else(|| {
            Error::InvalidArgument(format!("{:?}: parent of {} is not an object", path, last))
        })?;
        obj.insert(last.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_devconf_get_dotted_path() {
        let conf = DevConf::from_value(json!({"wifi": {"sta": {"ssid": "home"}}})).unwrap();
        assert_eq!(conf.get("wifi.sta.ssid"), Some(&json!("home")));
        assert_eq!(conf.get("wifi.ap"), None);
        assert_eq!(conf.get(""), Some(conf.data()));
    }

    #[test]
    fn test_devconf_set_parses_json_or_keeps_string() {
        let mut conf = DevConf::from_value(json!({"debug": {"level": 1}})).unwrap();
        conf.set("debug.level", "3").unwrap();
        conf.set("wifi.sta.ssid", "my net").unwrap();
        conf.set("wifi.sta.enable", "true").unwrap();
        assert_eq!(
            conf.data(),
            &json!({
                "debug": {"level": 3},
                "wifi": {"sta": {"ssid": "my net", "enable": true}}
            })
        );
    }

    #[test]
    fn test_devconf_set_below_scalar_is_rejected() {
        let mut conf = DevConf::from_value(json!({"debug": {"level": 1}})).unwrap();
        assert!(conf.set("debug.level.x", "1").is_err());
        assert!(conf.set("a..b", "1").is_err());
    }

    #[test]
    fn test_devconf_requires_object() {
        assert!(DevConf::from_value(json!([1, 2])).is_err());
    }
}
