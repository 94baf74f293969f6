use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Filename of the mod activation list inside a mods directory.
pub const MOD_LIST_FILE: &str = "mod-list.json";

/// Content of a `mod-list.json` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModList {
    pub mods: Vec<ModListEntry>,
}

/// A single mod entry of `mod-list.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModListEntry {
    pub name: String,
    pub enabled: bool,
}

impl ModList {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(Error::io("unable to read", path))?;
        serde_json::from_slice(&raw).map_err(|source| Error::Json { path: path.to_path_buf(), source })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_vec(self).map_err(|source| Error::Json { path: path.to_path_buf(), source })?;
        std::fs::write(path, raw).map_err(Error::io("unable to write", path))
    }

    /// Marks a mod as enabled, adding it when not listed.
    pub fn enable(&mut self, name: &str) {
        match self.mods.iter_mut().find(|m| m.name == name) {
            Some(entry) => entry.enabled = true,
            None => self.mods.push(ModListEntry {
                name: name.to_string(),
                enabled: true,
            }),
        }
    }

    /// Drops every entry whose name is in `names`.
    pub fn remove(&mut self, names: &[&str]) {
        self.mods.retain(|m| !names.contains(&m.name.as_str()));
    }
}

/// Enables `name` in the `mod-list.json` of `mods_dir`.
pub fn enable_mod(mods_dir: &Path, name: &str) -> Result<()> {
    let path = mods_dir.join(MOD_LIST_FILE);
    if !path.exists() {
        return Err(Error::ModListMissing { dir: mods_dir.to_path_buf() });
    }
    let mut list = ModList::load(&path)?;
    list.enable(name);
    list.write(&path)
}
