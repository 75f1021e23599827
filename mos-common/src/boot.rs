// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot-mode control by bit-banging a board's reset and boot-select lines.
//!
//! The sequences are pure data computed per board; [`BootModeController`]
//! applies them through a narrow [`LineControl`] capability so the ordering
//! and hold times can be checked without hardware.
//!
//! Line byte layout (FTDI bit-bang port):
//!
//! | bit | line        | 0                  | 1                     |
//! |-----|-------------|--------------------|-----------------------|
//! | 0   | SOP2 / boot | low (run firmware) | high (bootloader)     |
//! | 5   | reset       | asserted           | released (running)    |
//! | 6   | debug LED   | on                 | off                   |

use embedded_hal::delay::DelayNs;

use crate::error::{Error, Result};

pub const SOP2_BIT: u8 = 0x01;
pub const RESET_BIT: u8 = 0x20;
pub const DEBUG_BIT: u8 = 0x40;

/// Minimum time reset must be held asserted.
pub const RESET_HOLD_MS: u32 = 50;

/// Time the ROM bootloader needs after reset is released.
pub const BOOTLOADER_START_MS: u32 = 1000;

/// Hardware line-control capability.
pub trait LineControl {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Take control of the lines in `mask`; 0 releases every line.
    fn set_bitbang_mode(&mut self, mask: u8) -> core::result::Result<(), Self::Error>;

    /// Drive the controlled lines to `value`.
    fn write_byte(&mut self, value: u8) -> core::result::Result<(), Self::Error>;
}

/// One line transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineAction {
    /// Write this line state.
    Drive(u8),
    /// Give up control of all lines; pull resistors take over.
    Release,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootStep {
    pub action: LineAction,
    /// Settle time after the transition, before the next one.
    pub hold_ms: u32,
    pub description: &'static str,
}

/// Ordered line transitions. Recomputed per invocation, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootSequence {
    pub steps: Vec<BootStep>,
}

/// Supported boards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Board {
    /// TI CC3200 LaunchXL, TCK jump-wired to SOP2.
    LaunchXl,
}

impl Board {
    pub fn vendor_id(&self) -> u16 {
        match self {
            Board::LaunchXl => 0x0451,
        }
    }

    pub fn product_id(&self) -> u16 {
        match self {
            Board::LaunchXl => 0xc32a,
        }
    }

    /// Lines taken under control when the controller opens.
    pub fn control_mask(&self) -> u8 {
        match self {
            Board::LaunchXl => DEBUG_BIT | RESET_BIT | SOP2_BIT,
        }
    }

    /// Line state on open: in reset, SOP2 low, debug LED on.
    pub fn initial_state(&self) -> u8 {
        0
    }

    pub fn enter_bootloader(&self) -> BootSequence {
        match self {
            Board::LaunchXl => BootSequence {
                steps: vec![
                    BootStep {
                        action: LineAction::Drive(SOP2_BIT),
                        hold_ms: RESET_HOLD_MS,
                        description: "enter reset with SOP2 high",
                    },
                    BootStep {
                        action: LineAction::Drive(RESET_BIT | SOP2_BIT),
                        hold_ms: BOOTLOADER_START_MS,
                        description: "leave reset with SOP2 high",
                    },
                ],
            },
        }
    }

    pub fn boot_firmware(&self) -> BootSequence {
        match self {
            Board::LaunchXl => BootSequence {
                steps: vec![
                    BootStep {
                        action: LineAction::Drive(0),
                        hold_ms: RESET_HOLD_MS,
                        description: "enter reset with SOP2 low",
                    },
                    BootStep {
                        action: LineAction::Release,
                        hold_ms: 0,
                        description: "release all lines",
                    },
                ],
            },
        }
    }
}

/// Forces a board into bootloader or run mode.
///
/// No retries: a sequence that fails midway leaves the lines undefined and
/// must be restarted from the beginning.
pub struct BootModeController<L, D> {
    lines: L,
    delay: D,
    board: Board,
}

impl<L: LineControl, D: DelayNs> BootModeController<L, D> {
    /// Take control of the board's lines and park it in reset.
    pub fn open(mut lines: L, delay: D, board: Board) -> Result<Self> {
        lines
            .set_bitbang_mode(board.control_mask())
            .map_err(|e| Error::hardware("failed to set bitbang mode", e))?;
        lines
            .write_byte(board.initial_state())
            .map_err(|e| Error::hardware("failed to set bit values", e))?;
        Ok(Self {
            lines,
            delay,
            board,
        })
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn enter_bootloader(&mut self) -> Result<()> {
        let sequence = self.board.enter_bootloader();
        self.run(&sequence)
    }

    pub fn boot_firmware(&mut self) -> Result<()> {
        let sequence = self.board.boot_firmware();
        self.run(&sequence)
    }

    /// Apply each step, then hold for its settle time.
    pub fn run(&mut self, sequence: &BootSequence) -> Result<()> {
        for step in &sequence.steps {
            log::debug!("{} ({:?})", step.description, step.action);
            let written = match step.action {
                LineAction::Drive(value) => self.lines.write_byte(value),
                LineAction::Release => self.lines.set_bitbang_mode(0),
            };
            written.map_err(|e| Error::hardware(format!("failed to {}", step.description), e))?;
            if step.hold_ms > 0 {
                self.delay.delay_ms(step.hold_ms);
            }
        }
        Ok(())
    }

    pub fn into_inner(self) -> (L, D) {
        (self.lines, self.delay)
    }
}
