// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-memory zip archives: building them and unpacking them onto disk.

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Component, Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Zip builder over a memory buffer.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Add one file. `name` must use forward slashes.
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(name, options)
            .map_err(|e| Error::Protocol(format!("adding {} to archive: {}", name, e)))?;
        self.zip
            .write_all(data)
            .map_err(|e| Error::io("writing archive entry", name, e))
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        self.zip
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| Error::Protocol(format!("finishing archive: {}", e)))
    }
}

/// Entry names, in archive order.
pub fn entry_names(data: &[u8]) -> Result<Vec<String>> {
    let archive = open(data)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Read one entry fully.
pub fn read_entry(data: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = open(data)?;
    let mut file = archive
        .by_name(name)
        .map_err(|e| Error::Protocol(format!("archive entry {}: {}", name, e)))?;
    let mut out = Vec::new();
    io::copy(&mut file, &mut out).map_err(|e| Error::io("reading archive entry", name, e))?;
    Ok(out)
}

fn open(data: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::Protocol(format!("bad zip archive: {}", e)))
}

/// Strip `strip` leading components; None when nothing is left.
fn strip_components(path: &Path, strip: usize) -> Option<PathBuf> {
    let rest: PathBuf = path.components().skip(strip).collect();
    if rest.as_os_str().is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Unpack `data` into `dest`, dropping `strip` leading path components.
///
/// Entries that would land outside `dest` are rejected. Returns the paths
/// of the files written.
pub fn unpack(data: &[u8], dest: &Path, strip: usize) -> Result<Vec<PathBuf>> {
    let mut archive = open(data)?;
    let mut written = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::Protocol(format!("archive entry #{}: {}", i, e)))?;
        let name = file
            .enclosed_name()
            .filter(|p| p.components().all(|c| matches!(c, Component::Normal(_))))
            .ok_or_else(|| {
                Error::Protocol(format!("archive entry {:?} escapes destination", file.name()))
            })?;
        let Some(rel) = strip_components(&name, strip) else {
            continue;
        };
        let target = dest.join(&rel);

        if file.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io("creating", &target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io("creating", parent, e))?;
        }
        let mut out = fs::File::create(&target).map_err(|e| Error::io("creating", &target, e))?;
        io::copy(&mut file, &mut out).map_err(|e| Error::io("writing", &target, e))?;
        log::trace!("unpacked {}", target.display());
        written.push(target);
    }

    Ok(written)
}
