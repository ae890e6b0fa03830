use std::path::PathBuf;
use directories::BaseDirs;
use crate::env::EnvLookup;
use crate::error::{Error, Result};

/// Overrides the home directory of the tool (default `~/.asdfw`).
pub const HOME_ENV: &str = "ASDFW_HOME";

const DEFAULT_DIR_NAME: &str = ".asdfw";

/// Where everything lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub home: PathBuf,
    /// `<home>/installs/<tool>/<version>/bin/<executable>`
    pub installs_dir: PathBuf,
    /// Must come before the system directories on `PATH`.
    pub shims_dir: PathBuf,
    pub global_file: PathBuf,
    pub log_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl Layout {
    pub fn from_home(home: impl Into<PathBuf>) -> Layout {
        let home = home.into();
        Layout {
            installs_dir: home.join("installs"),
            shims_dir: home.join("shims"),
            global_file: home.join(crate::tool_versions::FILE_NAME),
            log_dir: home.join("logs"),
            settings_file: home.join("config.toml"),
            home,
        }
    }

    /// Uses `$ASDFW_HOME` when set, `~/.asdfw` otherwise.
    pub fn discover<E: EnvLookup>(env: &E) -> Result<Layout> {
        match env.var(HOME_ENV).filter(|home| !home.is_empty()) {
            Some(home) => Ok(Layout::from_home(home)),
            None => Ok(Layout::from_home(default_home()?)),
        }
    }

    /// Creates the directories this tool owns. The install root is left to
    /// the installer.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.shims_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(())
    }
}

pub fn default_home() -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or_else(|| {
        Error::io(
            "~",
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine the home directory",
            ),
        )
    })?;
    Ok(dirs.home_dir().join(DEFAULT_DIR_NAME))
}
