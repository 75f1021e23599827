// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Packaging a whitelisted source tree for the remote build service.
//!
//! Only paths whose top-level component is whitelisted are included;
//! excluded directories are not descended into. Entries are stored under
//! `src/` with forward slashes whatever the host separator.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::archive::ArchiveWriter;
use crate::error::{Error, Result};

/// Archive directory all packaged files are stored under.
pub const ARCHIVE_ROOT: &str = "src";

/// Content rewrite applied to one file while it is packaged.
pub type Transform = Box<dyn Fn(Vec<u8>) -> Result<Vec<u8>>>;

/// What to package: top-level whitelist plus per-path transforms keyed by
/// forward-slash relative path.
#[derive(Default)]
pub struct PackageManifest {
    pub whitelist: BTreeSet<String>,
    pub transforms: BTreeMap<String, Transform>,
}

impl PackageManifest {
    pub fn new(whitelist: BTreeSet<String>) -> Self {
        Self {
            whitelist,
            transforms: BTreeMap::new(),
        }
    }

    pub fn with_transform(mut self, path: impl Into<String>, transform: Transform) -> Self {
        self.transforms.insert(path.into(), transform);
        self
    }
}

/// Build the archive. Any read or transform failure aborts with no output.
pub fn package(root: &Path, spec: &PackageManifest) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new();
    if !spec.whitelist.contains(".") {
        log::debug!("root is not whitelisted, packaging nothing");
        return writer.finish();
    }

    let mut files = Vec::new();
    for (name, path) in sorted_entries(root)? {
        if !spec.whitelist.contains(&name) {
            log::debug!("ignoring {}", name);
            continue;
        }
        collect(&path, name, &mut files)?;
    }

    for (rel, path) in files {
        log::debug!("zipping {}", rel);
        let mut data = fs::read(&path).map_err(|e| Error::io("reading", &path, e))?;
        if let Some(transform) = spec.transforms.get(&rel) {
            data = transform(data)?;
        }
        writer.add(&format!("{}/{}", ARCHIVE_ROOT, rel), &data)?;
    }

    let archive = writer.finish()?;
    log::debug!("source archive: {} bytes", archive.len());
    Ok(archive)
}

/// Directory entries as (name, path), sorted by name.
fn sorted_entries(dir: &Path) -> Result<Vec<(String, std::path::PathBuf)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io("listing", dir, e))? {
        let entry = entry.map_err(|e| Error::io("listing", dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path()));
    }
    entries.sort();
    Ok(entries)
}

/// Gather files below `path`, keyed by their forward-slash relative path.
fn collect(path: &Path, rel: String, out: &mut Vec<(String, std::path::PathBuf)>) -> Result<()> {
    let meta = fs::metadata(path).map_err(|e| Error::io("inspecting", path, e))?;
    if !meta.is_dir() {
        out.push((rel, path.to_path_buf()));
        return Ok(());
    }
    for (name, child) in sorted_entries(path)? {
        collect(&child, format!("{}/{}", rel, name), out)?;
    }
    Ok(())
}
