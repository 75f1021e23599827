// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use mos_common::config::{self, BuildConfig, Config, DeviceConfig};
use mos_common::CancelToken;

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "mos")]
#[command(about = "Build, flash and operate mos firmware devices")]
pub struct Cli {
    /// Log more (-v debug, -vv trace)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub log_level: u8,

    /// Echo the build log even when the build succeeds
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Device address (serial:///dev/ttyUSB0, COM7, tcp://host:port)
    #[arg(short, long, env = "MOS_PORT", global = true)]
    pub port: Option<String>,

    /// Re-open the device link after it drops
    #[arg(long, global = true)]
    pub reconnect: bool,

    /// Device command timeout in seconds
    #[arg(long, env = "MOS_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,

    /// Remote build timeout in seconds
    #[arg(long, env = "MOS_BUILD_TIMEOUT", default_value = "300", global = true)]
    pub build_timeout: u64,

    /// Build server URL
    #[arg(long, env = "MOS_SERVER", default_value = config::DEFAULT_SERVER, global = true)]
    pub server: String,

    /// Build server user name
    #[arg(long, env = "MOS_USER", default_value = "test", global = true)]
    pub user: String,

    /// Build server password
    #[arg(long, env = "MOS_PASS", default_value = "test", global = true, hide_env_values = true)]
    pub pass: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Call a device RPC method
    Call {
        /// Method name (e.g. Sys.GetInfo)
        #[arg(value_name = "METHOD")]
        method: String,

        /// JSON arguments: object, array or string
        #[arg(value_name = "ARGS")]
        args: Option<String>,
    },

    /// List files on the device
    Ls,

    /// Print a device file to stdout
    Get {
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Upload a host file to the device
    Put {
        #[arg(value_name = "HOST_FILE")]
        host_file: PathBuf,

        /// Name on the device (default: host file's base name)
        #[arg(value_name = "DEVICE_FILE")]
        device_file: Option<String>,
    },

    /// Delete a device file
    Rm {
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Print the device configuration, or one dotted path of it
    ConfigGet {
        #[arg(value_name = "PATH")]
        path: Option<String>,
    },

    /// Change device configuration values
    ConfigSet {
        #[arg(value_name = "KEY=VALUE", required = true)]
        pairs: Vec<String>,
    },

    /// Print device variables
    Vars,

    /// Build the project in the current directory on the build server
    Build {
        /// Target architecture (overrides mos.yml)
        #[arg(long)]
        arch: Option<String>,

        /// Extra build variable, NAME:VALUE (repeatable)
        #[arg(long = "build-var", value_name = "NAME:VALUE")]
        build_vars: Vec<String>,
    },

    /// Create a new project in the current directory
    Init {
        /// Target architecture written to mos.yml
        #[arg(long)]
        arch: Option<String>,

        /// Initialise even if the directory is not empty
        #[arg(long)]
        force: bool,
    },

    /// Force the attached board into a boot mode
    Board {
        #[arg(value_enum)]
        mode: BootMode,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BootMode {
    /// ROM bootloader, ready for flashing
    Bootloader,
    /// Application firmware
    Run,
}

impl Cli {
    /// Collect the global flags into one configuration value.
    pub fn config(&self) -> Config {
        Config {
            device: DeviceConfig {
                port: self.port.clone(),
                reconnect: self.reconnect,
                timeout: Duration::from_secs(self.timeout),
            },
            build: BuildConfig {
                server: self.server.clone(),
                user: self.user.clone(),
                pass: self.pass.clone(),
                arch: None,
                build_vars: Default::default(),
                verbose: self.verbose,
                timeout: Duration::from_secs(self.build_timeout),
            },
        }
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let mut cfg = cli.config();
    let device = &cfg.device;
    let device_cancel = || CancelToken::with_timeout(device.timeout);

    match cli.command {
        Commands::Call { method, args } => {
            commands::call(device, &method, args.as_deref(), &device_cancel())
        }
        Commands::Ls => commands::ls(device, &device_cancel()),
        Commands::Get { file } => commands::get(device, &file, &device_cancel()),
        Commands::Put {
            host_file,
            device_file,
        } => commands::put(device, &host_file, device_file.as_deref(), &device_cancel()),
        Commands::Rm { file } => commands::rm(device, &file, &device_cancel()),
        Commands::ConfigGet { path } => {
            commands::config_get(device, path.as_deref(), &device_cancel())
        }
        Commands::ConfigSet { pairs } => commands::config_set(device, &pairs, &device_cancel()),
        Commands::Vars => commands::vars(device, &device_cancel()),
        Commands::Build { arch, build_vars } => {
            cfg.build.arch = arch;
            cfg.build.build_vars = config::parse_build_vars(&build_vars)?;
            let cancel = CancelToken::with_timeout(cfg.build.timeout);
            commands::build(&project_dir()?, &cfg.build, &cancel)
        }
        Commands::Init { arch, force } => {
            cfg.build.arch = arch;
            let cancel = CancelToken::with_timeout(cfg.build.timeout);
            commands::init(&project_dir()?, &cfg.build, force, &cancel)
        }
        Commands::Board { mode } => commands::board(mode),
    }
}

fn project_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to determine the current directory")
}
