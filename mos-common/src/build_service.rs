// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Upload of a packaged source tree to the remote build service and
//! interpretation of its reply.
//!
//! ```text
//! POST {server}/api/{user}/firmware/build   (multipart field "file" = source.zip)
//!   200 -> zip with build/build.log and build/fw.zip   build succeeded
//!   418 -> zip with build/build.log                    build ran and failed
//!   *   -> raw diagnostic text                         request failed
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;

use crate::archive;
use crate::cancel::CancelToken;
use crate::config::{BuildConfig, BUILD_DIR};
use crate::error::{Error, Result};
use crate::manifest::{default_app_name, manifest_transform, Manifest, MANIFEST_FILE};
use crate::package::{package, PackageManifest};

/// Build log location relative to the build directory.
pub const BUILD_LOG: &str = "build.log";

/// Firmware bundle location relative to the build directory.
pub const FIRMWARE_FILE: &str = "fw.zip";

const STATUS_OK: u16 = 200;
const STATUS_BUILD_FAILED: u16 = 418;

/// Raw reply from the build service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub outcome: BuildOutcome,
    /// Directory the reply archive was unpacked into.
    pub root: PathBuf,
    pub log_path: PathBuf,
    /// Present only for successful builds.
    pub firmware: Option<PathBuf>,
}

impl BuildResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == BuildOutcome::Succeeded
    }
}

/// Client for the remote build API.
#[derive(Debug, Clone)]
pub struct BuildService {
    server: String,
    user: String,
    pass: String,
}

impl BuildService {
    pub fn from_config(cfg: &BuildConfig) -> Result<Self> {
        Ok(Self {
            server: cfg.server_url()?,
            user: cfg.user.clone(),
            pass: cfg.pass.clone(),
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn build_url(&self) -> String {
        format!("{}/api/{}/firmware/build", self.server, self.user)
    }

    /// POST the archive and return the status and full body.
    ///
    /// Only the token's deadline bounds the request once it is sent; an
    /// explicit [`CancelToken::cancel`] is seen before sending, not while
    /// waiting for the reply.
    pub fn upload(&self, archive: Vec<u8>, cancel: &CancelToken) -> Result<BuildResponse> {
        const OP: &str = "build upload";
        cancel.check(OP)?;

        // No deadline means no timeout at all, not reqwest's 30 s default.
        let client = Client::builder()
            .timeout(cancel.remaining())
            .build()
            .map_err(|e| Error::transport(OP, e))?;

        let part = Part::bytes(archive)
            .file_name("source.zip")
            .mime_str("application/zip")
            .map_err(|e| Error::transport(OP, e))?;
        let form = Form::new().part("file", part);

        let url = self.build_url();
        log::debug!("POST {}", url);
        let resp = client
            .post(&url)
            .basic_auth(&self.user, Some(&self.pass))
            .multipart(form)
            .send()
            .map_err(|e| map_http_error(OP, e))?;

        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| map_http_error(OP, e))?.to_vec();
        log::debug!("build service replied {} ({} bytes)", status, body.len());
        Ok(BuildResponse { status, body })
    }
}

impl BuildService {
    /// Upload `archive` and unpack the reply into `project_dir`.
    pub fn build(
        &self,
        archive: Vec<u8>,
        project_dir: &Path,
        cfg: &BuildConfig,
        echo: &mut dyn Write,
        cancel: &CancelToken,
    ) -> Result<BuildResult> {
        let resp = self.upload(archive, cancel)?;
        handle_response(&resp, project_dir, cfg.verbose, echo)
    }
}

/// Package the project's whitelisted sources, injecting the resolved
/// architecture and command-line build variables into the manifest copy.
pub fn package_project(project_dir: &Path, cfg: &BuildConfig) -> Result<Vec<u8>> {
    let manifest = Manifest::load(project_dir)?;
    let arch = manifest.resolve_arch(cfg.arch.as_deref())?;
    let spec = PackageManifest::new(manifest.whitelist()).with_transform(
        MANIFEST_FILE,
        manifest_transform(
            Some(arch),
            cfg.build_vars.clone(),
            default_app_name(project_dir)?,
        ),
    );
    package(project_dir, &spec)
}

/// Package, upload and unpack: one remote build.
pub fn remote_build(
    project_dir: &Path,
    cfg: &BuildConfig,
    echo: &mut dyn Write,
    cancel: &CancelToken,
) -> Result<BuildResult> {
    let service = BuildService::from_config(cfg)?;
    let archive = package_project(project_dir, cfg)?;
    log::info!(
        "Uploading sources ({} bytes) to {}, user {}",
        archive.len(),
        service.server(),
        service.user()
    );
    service.build(archive, project_dir, cfg, echo, cancel)
}

pub(crate) fn map_http_error(op: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Cancelled(format!("{}: {}", op, e))
    } else {
        Error::transport(op, e)
    }
}

/// Interpret a build reply.
///
/// On 200/418 the previous `build/` directory is removed and the archive
/// is unpacked into `project_dir`. The build log goes to `echo` when the build
/// failed or `verbose` is set. Any other status is [`Error::Service`] and
/// touches nothing on disk.
pub fn handle_response(
    resp: &BuildResponse,
    project_dir: &Path,
    verbose: bool,
    echo: &mut dyn Write,
) -> Result<BuildResult> {
    let outcome = match resp.status {
        STATUS_OK => BuildOutcome::Succeeded,
        STATUS_BUILD_FAILED => BuildOutcome::Failed,
        status => {
            return Err(Error::Service {
                status,
                body: String::from_utf8_lossy(&resp.body).trim().to_string(),
            })
        }
    };

    let build_path = project_dir.join(BUILD_DIR);
    match fs::remove_dir_all(&build_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io("removing", &build_path, e)),
    }
    archive::unpack(&resp.body, project_dir, 0)?;

    let log_path = build_path.join(BUILD_LOG);
    if !log_path.is_file() {
        return Err(Error::Protocol(format!(
            "build result has no {}",
            log_path.display()
        )));
    }

    if verbose || outcome == BuildOutcome::Failed {
        let mut log = fs::File::open(&log_path).map_err(|e| Error::io("opening", &log_path, e))?;
        io::copy(&mut log, echo).map_err(|e| Error::io("echoing", &log_path, e))?;
    }

    let firmware = match outcome {
        BuildOutcome::Succeeded => {
            let fw = build_path.join(FIRMWARE_FILE);
            if !fw.is_file() {
                return Err(Error::Protocol(format!(
                    "build succeeded but {} is missing",
                    fw.display()
                )));
            }
            Some(fw)
        }
        BuildOutcome::Failed => None,
    };

    Ok(BuildResult {
        outcome,
        root: project_dir.to_path_buf(),
        log_path,
        firmware,
    })
}
