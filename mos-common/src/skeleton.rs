// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! New project initialisation from the build service's skeleton archive.

use std::fs;
use std::path::Path;

use reqwest::blocking::Client;

use crate::archive;
use crate::build_service::map_http_error;
use crate::cancel::CancelToken;
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::manifest::Manifest;

pub fn skeleton_url(cfg: &BuildConfig) -> Result<String> {
    Ok(format!("{}/downloads/skeleton.zip", cfg.server_url()?))
}

pub fn is_dir_empty(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).map_err(|e| Error::io("reading contents of", dir, e))?;
    Ok(entries.next().is_none())
}

pub fn download(url: &str, cancel: &CancelToken) -> Result<Vec<u8>> {
    const OP: &str = "skeleton download";
    cancel.check(OP)?;

    // No deadline means no timeout at all, not reqwest's 30 s default.
    let client = Client::builder()
        .timeout(cancel.remaining())
        .build()
        .map_err(|e| Error::transport(OP, e))?;
    let resp = client.get(url).send().map_err(|e| map_http_error(OP, e))?;

    let status = resp.status().as_u16();
    if status != 200 {
        return Err(Error::Service {
            status,
            body: format!("bad response on {:?}", url),
        });
    }
    Ok(resp.bytes().map_err(|e| map_http_error(OP, e))?.to_vec())
}

/// Unpack a skeleton into `dir` (dropping its top directory) and set the
/// manifest's `arch` when one is given.
pub fn install(data: &[u8], dir: &Path, arch: Option<&str>) -> Result<()> {
    archive::unpack(data, dir, 1)?;
    if let Some(arch) = arch.filter(|a| !a.is_empty()) {
        let mut manifest = Manifest::load(dir)?;
        manifest.arch = arch.to_string();
        manifest.save(dir)?;
    }
    Ok(())
}

/// Initialise a project in `dir`; a non-empty `dir` needs `force`.
pub fn init(dir: &Path, cfg: &BuildConfig, force: bool, cancel: &CancelToken) -> Result<()> {
    if !force && !is_dir_empty(dir)? {
        return Err(Error::InvalidArgument(
            "refuse to init source tree in non-empty directory".to_string(),
        ));
    }
    let url = skeleton_url(cfg)?;
    log::info!("Downloading project skeleton from {}", url);
    let data = download(&url, cancel)?;
    install(&data, dir, cfg.arch.as_deref())
}
