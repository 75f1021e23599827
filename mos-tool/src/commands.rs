// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use indicatif::{ProgressBar, ProgressStyle};

use mos_common::build_service::{handle_response, package_project, BuildOutcome, BuildService};
use mos_common::firmware::FirmwareInfo;
use mos_common::{fs as devfs, rpc, skeleton};
use mos_common::{BuildConfig, CancelToken, DeviceConfig, DeviceSession};

use crate::cli::BootMode;
use crate::transport::FramedChannelFactory;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Connect, run `f`, then always disconnect. The first error wins.
fn with_session<T>(
    cfg: &DeviceConfig,
    cancel: &CancelToken,
    f: impl FnOnce(&mut DeviceSession) -> mos_common::Result<T>,
) -> Result<T> {
    let mut session = DeviceSession::from_config(cfg, Box::new(FramedChannelFactory))?
        .with_junk_handler(Arc::new(|junk: &[u8]| {
            let text = String::from_utf8_lossy(junk);
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                log::info!("device: {}", line.trim_end());
            }
        }));

    session
        .connect(cfg.reconnect, cancel)
        .with_context(|| format!("Failed to connect to {}", session.address()))?;

    let result = f(&mut session);
    let closed = session.disconnect(cancel);
    let value = result?;
    closed.with_context(|| format!("Failed to disconnect from {}", session.address()))?;
    Ok(value)
}

/// Call one RPC method and print its pretty-printed result.
pub fn call(cfg: &DeviceConfig, method: &str, args: Option<&str>, cancel: &CancelToken) -> Result<()> {
    let out = with_session(cfg, cancel, |s| rpc::call(s, method, args.unwrap_or(""), cancel))
        .with_context(|| format!("{} failed", method))?;
    println!("{}", out);
    Ok(())
}

pub fn ls(cfg: &DeviceConfig, cancel: &CancelToken) -> Result<()> {
    let names = with_session(cfg, cancel, |s| devfs::list(s, cancel)).context("Listing files failed")?;
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

pub fn get(cfg: &DeviceConfig, file: &str, cancel: &CancelToken) -> Result<()> {
    let data = with_session(cfg, cancel, |s| devfs::get(s, file, cancel))
        .with_context(|| format!("Failed to get {}", file))?;
    log::debug!("{}: {} bytes, CRC32 0x{:08x}", file, data.len(), CRC32.checksum(&data));
    let mut stdout = io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

/// Upload a host file in chunks, with a progress bar.
pub fn put(
    cfg: &DeviceConfig,
    host_file: &Path,
    device_file: Option<&str>,
    cancel: &CancelToken,
) -> Result<()> {
    let name = match device_file {
        Some(name) => name.to_string(),
        None => host_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Cannot derive a device file name from {}", host_file.display()))?,
    };
    let data = fs::read(host_file)
        .with_context(|| format!("Failed to read {}", host_file.display()))?;

    println!(
        "File: {} -> {} ({} bytes, CRC32: 0x{:08x})",
        host_file.display(),
        name,
        data.len(),
        CRC32.checksum(&data)
    );

    let pb = ProgressBar::new(data.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let source = pb.wrap_read(data.as_slice());
    let written = match with_session(cfg, cancel, |s| devfs::put(s, &name, source, cancel)) {
        Ok(n) => n,
        Err(e) => {
            pb.abandon();
            return Err(e.context(format!("Failed to put {}", name)));
        }
    };
    pb.finish_and_clear();

    println!("Wrote {} bytes to {}", written, name);
    Ok(())
}

pub fn rm(cfg: &DeviceConfig, file: &str, cancel: &CancelToken) -> Result<()> {
    with_session(cfg, cancel, |s| devfs::remove(s, file, cancel))
        .with_context(|| format!("Failed to remove {}", file))
}

pub fn config_get(cfg: &DeviceConfig, path: Option<&str>, cancel: &CancelToken) -> Result<()> {
    let conf = with_session(cfg, cancel, |s| s.get_config(cancel))
        .context("Failed to read device configuration")?;
    let value = match path.filter(|p| !p.is_empty()) {
        Some(path) => conf
            .get(path)
            .ok_or_else(|| anyhow!("No config value at {}", path))?,
        None => conf.data(),
    };
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read-modify-write of the device configuration.
pub fn config_set(cfg: &DeviceConfig, pairs: &[String], cancel: &CancelToken) -> Result<()> {
    let mut updates = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("{:?} is not KEY=VALUE", pair);
        };
        updates.push((key, value));
    }

    with_session(cfg, cancel, |s| {
        let mut conf = s.get_config(cancel)?;
        for (key, value) in &updates {
            log::debug!("Setting {} = {}", key, value);
            conf.set(key, value)?;
        }
        s.set_config(&conf, cancel)
    })
    .context("Failed to update device configuration")
}

pub fn vars(cfg: &DeviceConfig, cancel: &CancelToken) -> Result<()> {
    let vars = with_session(cfg, cancel, |s| s.vars()?.get(cancel))
        .context("Failed to read device variables")?;
    println!("{}", serde_json::to_string_pretty(&vars)?);
    Ok(())
}

/// Package the project, build it remotely and report the firmware bundle.
pub fn build(project_dir: &Path, cfg: &BuildConfig, cancel: &CancelToken) -> Result<()> {
    let service = BuildService::from_config(cfg)?;
    let archive = package_project(project_dir, cfg).context("Failed to package sources")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!(
        "Building on {} ({} bytes of sources, user {})",
        service.server(),
        archive.len(),
        service.user()
    ));
    pb.enable_steady_tick(Duration::from_millis(120));
    let resp = service.upload(archive, cancel);
    pb.finish_and_clear();
    let resp = resp.context("Build request failed")?;

    let mut stdout = io::stdout();
    let result = handle_response(&resp, project_dir, cfg.verbose, &mut stdout)?;
    if result.outcome == BuildOutcome::Failed {
        bail!("build failed, see {}", result.log_path.display());
    }

    let Some(firmware) = result.firmware else {
        bail!("build succeeded without firmware");
    };
    let data = fs::read(&firmware)
        .with_context(|| format!("Failed to read {}", firmware.display()))?;
    println!(
        "Firmware saved to {} ({} bytes, CRC32: 0x{:08x})",
        firmware.display(),
        data.len(),
        CRC32.checksum(&data)
    );

    let info = FirmwareInfo::from_bundle(&data)
        .with_context(|| format!("Failed to read bundle manifest of {}", firmware.display()))?;
    println!(
        "Success, built {}/{} version {} ({}).",
        info.name, info.platform, info.version, info.build_id
    );
    Ok(())
}

pub fn init(project_dir: &Path, cfg: &BuildConfig, force: bool, cancel: &CancelToken) -> Result<()> {
    skeleton::init(project_dir, cfg, force, cancel)
        .with_context(|| format!("Failed to initialise {}", project_dir.display()))?;
    println!("Project initialised in {}", project_dir.display());
    Ok(())
}

#[cfg(feature = "ftdi")]
pub fn board(mode: BootMode) -> Result<()> {
    use mos_common::boot::{Board, BootModeController};
    use mos_common::pacing::StdDelay;

    use crate::ftdi_lines::FtdiLines;

    let board = Board::LaunchXl;
    let lines = FtdiLines::open(board)?;
    let mut ctl = BootModeController::open(lines, StdDelay, board)?;
    match mode {
        BootMode::Bootloader => {
            ctl.enter_bootloader()?;
            println!("Board is in bootloader mode");
        }
        BootMode::Run => {
            ctl.boot_firmware()?;
            println!("Board is running firmware");
        }
    }
    Ok(())
}

#[cfg(not(feature = "ftdi"))]
pub fn board(mode: BootMode) -> Result<()> {
    bail!(
        "Cannot switch the board to {:?} mode: mos was built without the `ftdi` feature",
        mode
    )
}
