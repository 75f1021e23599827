// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! FTDI bit-bang driver for board reset and boot-select lines.

use std::io::{self, Write};

use ::ftdi::{find_by_vid_pid, BitMode, Device, Interface};

use mos_common::boot::{Board, LineControl};
use mos_common::{Error, Result};

/// Reset/boot lines of a board wired to FTDI interface A.
pub struct FtdiLines {
    device: Device,
}

impl FtdiLines {
    /// Open the board's debug probe by its USB ids.
    pub fn open(board: Board) -> Result<Self> {
        let (vid, pid) = (board.vendor_id(), board.product_id());
        log::debug!("Looking for FTDI device VID={:04X} PID={:04X}", vid, pid);

        let device = find_by_vid_pid(vid, pid)
            .interface(Interface::A)
            .open()
            .map_err(|e| Error::hardware("failed to open FTDI device", e.to_string()))?;

        log::debug!("Opened FTDI device VID={:04X} PID={:04X}", vid, pid);
        Ok(Self { device })
    }
}

impl LineControl for FtdiLines {
    type Error = io::Error;

    fn set_bitbang_mode(&mut self, mask: u8) -> io::Result<()> {
        let mode = if mask == 0 {
            BitMode::Reset
        } else {
            BitMode::Bitbang
        };
        self.device
            .set_bitmode(mask, mode)
            .map_err(|e| io::Error::other(e.to_string()))
    }

    fn write_byte(&mut self, value: u8) -> io::Result<()> {
        self.device.write_all(&[value])
    }
}
