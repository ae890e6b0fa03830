//! Per-user state: where things live and how the user configured them.

pub mod layout;
pub mod settings;

use std::path::PathBuf;
use tracing::debug;
use crate::dispatch::Dispatcher;
use crate::env::EnvLookup;
use crate::error::{Error, Result};
use crate::fs::OsFileSystem;
use crate::index::{BinDirs, InstallationIndex};
use crate::resolver::VersionResolver;
use crate::shims::ShimRegistry;
use layout::Layout;
use settings::Settings;

/// What one invocation works with. Built once per process.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub layout: Layout,
    pub settings: Settings,
    pub current_dir: PathBuf,
    pub bin_dirs: BinDirs,
}

impl Runtime {
    /// Reads the layout and settings from `env` and `<home>/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the home directory can't be determined or the
    /// settings file is invalid.
    pub fn load<E: EnvLookup>(env: &E, current_dir: PathBuf) -> Result<Runtime> {
        let layout = Layout::discover(env)?;
        let settings = Settings::load(&layout.settings_file)?.with_env(env);
        let bin_dirs = settings.bin_dirs(&layout.settings_file)?;
        debug!("home {}, settings {settings:?}", layout.home.display());
        Ok(Runtime {
            layout,
            settings,
            current_dir,
            bin_dirs,
        })
    }

    pub fn resolver<E: EnvLookup>(&self, env: E) -> VersionResolver<OsFileSystem, E> {
        VersionResolver::new(OsFileSystem, env, &self.layout.global_file)
            .with_ceiling(self.settings.traversal_ceiling.clone())
    }

    pub fn scan(&self) -> Result<InstallationIndex> {
        InstallationIndex::scan_with(&self.layout.installs_dir, &self.bin_dirs)
    }

    pub fn dispatcher<E: EnvLookup>(&self, env: E) -> Result<Dispatcher<OsFileSystem, E>> {
        Ok(Dispatcher::new(self.resolver(env), self.scan()?))
    }

    /// The executable shims forward to: `shim_target` from the settings, or
    /// the running binary.
    pub fn shim_target(&self) -> Result<PathBuf> {
        match &self.settings.shim_target {
            Some(target) => Ok(target.clone()),
            None => std::env::current_exe().map_err(|e| Error::io("asdfw", e)),
        }
    }

    pub fn shim_registry(&self) -> Result<ShimRegistry> {
        Ok(ShimRegistry::new(&self.layout.shims_dir, self.shim_target()?))
    }
}
