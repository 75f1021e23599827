// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Explicit configuration handed to components at construction.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default remote build service.
pub const DEFAULT_SERVER: &str = "https://mongoose.cloud";

/// Default per-command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit for a remote build round trip, compile time included.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(300);

/// Local build output directory, replaced by every remote build.
pub const BUILD_DIR: &str = "build";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub device: DeviceConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// `serial:///dev/ttyUSB0`, `tcp://host:port`, ...
    pub port: Option<String>,
    /// Let the channel re-establish itself after an unexpected drop.
    pub reconnect: bool,
    pub timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            reconnect: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DeviceConfig {
    pub fn address(&self) -> Result<&str> {
        self.port
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidArgument("--port is required".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub server: String,
    pub user: String,
    pub pass: String,
    /// Overrides the manifest's `arch`.
    pub arch: Option<String>,
    pub build_vars: BTreeMap<String, String>,
    /// Echo the build log even when the build succeeded.
    pub verbose: bool,
    pub timeout: Duration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            user: "test".to_string(),
            pass: "test".to_string(),
            arch: None,
            build_vars: BTreeMap::new(),
            verbose: false,
            timeout: DEFAULT_BUILD_TIMEOUT,
        }
    }
}

impl BuildConfig {
    /// Server URL without a trailing slash; a bare host gets `http://`.
    pub fn server_url(&self) -> Result<String> {
        let server = self.server.trim().trim_end_matches('/');
        if server.is_empty() {
            return Err(Error::InvalidArgument("--server must not be empty".to_string()));
        }
        if server.contains("://") {
            Ok(server.to_string())
        } else {
            Ok(format!("http://{}", server))
        }
    }
}

/// Parse repeated `NAME:VALUE` flags, splitting on the first `:`.
pub fn parse_build_vars<S: AsRef<str>>(items: &[S]) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for item in items {
        let item = item.as_ref();
        let (name, value) = item.split_once(':').ok_or_else(|| {
            Error::InvalidArgument(format!("build variable {:?} is not NAME:VALUE", item))
        })?;
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "build variable {:?} has an empty name",
                item
            )));
        }
        vars.insert(name.to_string(), value.to_string());
    }
    Ok(vars)
}
