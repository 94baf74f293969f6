//! Parameters handed to the companion mod.
//!
//! Mods cannot read arbitrary files, so the parameters are serialized as JSON
//! inside a Lua long string: `return [===[{...}]===]`. The mod `require`s the
//! file and decodes the string.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::RenderParams;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
pub struct Overrides<'a> {
    /// Run id; the mod renders on startup and writes `mapshot-done-<id>`.
    pub onstartup: &'a str,
    /// Name grouping all shots of the same save.
    pub shotname: &'a str,
    #[serde(flatten)]
    pub params: &'a RenderParams,
}

impl Overrides<'_> {
    pub fn to_lua(&self) -> Result<String> {
        let json = serde_json::to_string(self).map_err(|source| Error::Json {
            path: PathBuf::from(mapshot_mod::OVERRIDES_FILE),
            source,
        })?;
        // Pick a long bracket level that does not occur in the payload.
        let mut level = 3;
        while json.contains(&format!("]{}]", "=".repeat(level))) {
            level += 1;
        }
        let eq = "=".repeat(level);
        Ok(format!("return [{eq}[{json}]{eq}]\n"))
    }

    /// Writes the overrides file into the mod directory.
    pub fn write(&self, mod_dir: &Path) -> Result<PathBuf> {
        let path = mod_dir.join(mapshot_mod::OVERRIDES_FILE);
        std::fs::write(&path, self.to_lua()?).map_err(Error::io("unable to write overrides file", &path))?;
        tracing::info!(path = %path.display(), "overrides file created");
        Ok(path)
    }
}
