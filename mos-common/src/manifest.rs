// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The fields of the app manifest (`mos.yml`) this crate reads or rewrites.
//! Every other key is carried through untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::package::Transform;

pub const MANIFEST_FILE: &str = "mos.yml";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filesystem: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_files: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build_vars: BTreeMap<String, String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

impl Manifest {
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(data)
            .map_err(|e| Error::InvalidArgument(format!("bad {}: {}", MANIFEST_FILE, e)))
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let data = fs::read(&path).map_err(|e| Error::io("reading", &path, e))?;
        Self::parse(&data)
    }

    pub fn to_yaml(&self) -> Result<Vec<u8>> {
        serde_yaml::to_string(self)
            .map(String::into_bytes)
            .map_err(|e| Error::Protocol(format!("encoding {}: {}", MANIFEST_FILE, e)))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, self.to_yaml()?).map_err(|e| Error::io("writing", &path, e))
    }

    /// Top-level names eligible for packaging: the manifest itself, the
    /// bare root, and every source, filesystem and extra-file entry.
    pub fn whitelist(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::from([MANIFEST_FILE.to_string(), ".".to_string()]);
        for entry in self
            .sources
            .iter()
            .chain(&self.filesystem)
            .chain(&self.extra_files)
        {
            let entry = entry.trim_start_matches("./").trim_end_matches('/');
            if !entry.is_empty() {
                names.insert(entry.to_string());
            }
        }
        names
    }

    /// The command-line override wins over the manifest's own `arch`.
    pub fn resolve_arch(&self, arch_override: Option<&str>) -> Result<String> {
        match arch_override.filter(|a| !a.is_empty()) {
            Some(arch) => Ok(arch.to_string()),
            None if !self.arch.is_empty() => Ok(self.arch.clone()),
            None => Err(Error::InvalidArgument(format!(
                "--arch must be specified or {} should contain an arch key",
                MANIFEST_FILE
            ))),
        }
    }

    /// Apply packaging-time overrides.
    pub fn apply_overrides(
        &mut self,
        arch: Option<&str>,
        build_vars: &BTreeMap<String, String>,
        default_name: &str,
    ) {
        if let Some(arch) = arch.filter(|a| !a.is_empty()) {
            self.arch = arch.to_string();
        }
        self.build_vars
            .extend(build_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        if self.name.is_empty() {
            self.name = default_name.to_string();
        }
    }
}

/// App name fallback: the project directory's base name.
pub fn default_app_name(dir: &Path) -> Result<String> {
    let abs = dir
        .canonicalize()
        .map_err(|e| Error::io("resolving", dir, e))?;
    Ok(abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default())
}

/// Transform rewriting the manifest content while it is packaged.
/// The file on disk is left as is.
pub fn manifest_transform(
    arch: Option<String>,
    build_vars: BTreeMap<String, String>,
    default_name: String,
) -> Transform {
    Box::new(move |data: Vec<u8>| {
        let mut manifest = Manifest::parse(&data)?;
        manifest.apply_overrides(arch.as_deref(), &build_vars, &default_name);
        manifest.to_yaml()
    })
}
