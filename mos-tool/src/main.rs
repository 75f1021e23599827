// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! `mos`: build, flash and operate mos firmware devices.
//!
//! Usage:
//!   mos --port /dev/ttyUSB0 call Sys.GetInfo
//!   mos --port /dev/ttyUSB0 put init.js
//!   mos --port tcp://192.168.4.1:2323 config-set wifi.ap.enable=false
//!   mos build --arch esp8266 --build-var LED_PIN:2
//!   mos board bootloader

mod cli;
mod commands;
#[cfg(feature = "ftdi")]
mod ftdi_lines;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let default_filter = match args.log_level {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    cli::run(args)
}
