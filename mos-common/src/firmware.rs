// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Metadata of a built firmware bundle (`fw.zip`).

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::archive;
use crate::error::{Error, Result};

const BUNDLE_MANIFEST: &str = "manifest.json";

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub build_id: String,
}

impl FirmwareInfo {
    /// Read `manifest.json` at the bundle root or one directory down.
    pub fn from_bundle(data: &[u8]) -> Result<Self> {
        let entry = archive::entry_names(data)?
            .into_iter()
            .find(|name| {
                let depth = name.matches('/').count();
                depth <= 1 && name.rsplit('/').next() == Some(BUNDLE_MANIFEST)
            })
            .ok_or_else(|| Error::Protocol(format!("firmware bundle has no {}", BUNDLE_MANIFEST)))?;
        let raw = archive::read_entry(data, &entry)?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::Protocol(format!("bad bundle {}: {}", entry, e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| Error::io("reading", path, e))?;
        Self::from_bundle(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveWriter;

    #[test]
    fn test_manifest_one_level_down() {
        let mut w = ArchiveWriter::new();
        w.add("blinky-esp8266/0x00000.bin", b"\xe9").unwrap();
        w.add(
            "blinky-esp8266/manifest.json",
            br#"{"name":"blinky","platform":"esp8266","version":"1.0","build_id":"20260101"}"#,
        )
        .unwrap();
        let info = FirmwareInfo::from_bundle(&w.finish().unwrap()).unwrap();
        assert_eq!(info.name, "blinky");
        assert_eq!(info.platform, "esp8266");
        assert_eq!(info.build_id, "20260101");
    }

    #[test]
    fn test_missing_manifest_is_protocol_error() {
        let mut w = ArchiveWriter::new();
        w.add("a/b/manifest.json", b"{}").unwrap();
        let err = FirmwareInfo::from_bundle(&w.finish().unwrap()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Protocol);
    }
}
