use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::env::EnvLookup;
use crate::error::{Error, Result};
use crate::index::BinDirs;
use crate::tool::ToolName;

/// Overrides `traversal_ceiling` from `config.toml`.
pub const CEILING_ENV: &str = "ASDFW_TRAVERSAL_CEILING";

/// Optional settings read from `<home>/config.toml`.
///
/// ```toml
/// traversal_ceiling = "/home/me"
/// shim_target = "/usr/local/bin/asdfw"
///
/// [tools.go]
/// bin_dirs = ["bin", "pkg/tool"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Upward `.tool-versions` lookup stops at this directory.
    pub traversal_ceiling: Option<PathBuf>,
    /// Executable that shims point to. Defaults to the running binary.
    pub shim_target: Option<PathBuf>,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSettings>,
}

/// Per-tool settings, keyed by tool name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSettings {
    /// Directories inside a version that hold executables. Defaults to
    /// `bin`.
    #[serde(default)]
    pub bin_dirs: Vec<PathBuf>,
}

impl Settings {
    /// Loads settings from a file path. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns [`Error::Settings`] if the file is not valid TOML or has
    /// unknown keys.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(Error::io(path, e)),
        };
        toml::from_str(&content).map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Applies environment overrides on top of the file settings.
    pub fn with_env<E: EnvLookup>(mut self, env: &E) -> Settings {
        if let Some(ceiling) = env.var(CEILING_ENV).filter(|c| !c.is_empty()) {
            self.traversal_ceiling = Some(PathBuf::from(ceiling));
        }
        self
    }

    /// The configured bin directories of every tool.
    ///
    /// # Errors
    /// Returns [`Error::Settings`] for an invalid tool name or bin directory.
    pub fn bin_dirs(&self, path: &Path) -> Result<BinDirs> {
        let invalid = |e: Error| Error::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let mut bin_dirs = BinDirs::default();
        for (name, tool) in &self.tools {
            let name = ToolName::new(name).map_err(invalid)?;
            bin_dirs = bin_dirs.with_tool(name, tool.bin_dirs.clone()).map_err(invalid)?;
        }
        Ok(bin_dirs)
    }
}
