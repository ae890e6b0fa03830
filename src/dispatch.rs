//! Turns an invocation of a shim into the run of the configured version of
//! the tool behind it.
//!
//! The steps are: derive the command from the invoked name, derive the tool
//! that owns it, resolve the tool's version, locate that version's install,
//! check the executable is there, and launch it. The first failing step ends
//! the dispatch with its own error kind; nothing falls back to another
//! version.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use crate::env::EnvLookup;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::index::InstallationIndex;
use crate::resolver::{Resolution, VersionResolver};
use crate::tool::ToolName;
use crate::util::{command_stem, split_windows_extension, WINDOWS_EXTENSIONS};

/// Everything needed to run a tool, short of running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub command: String,
    pub resolution: Resolution,
    pub executable: PathBuf,
}

/// How the tool is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Replaces the current process (Unix only; spawns elsewhere).
    Replace,
    /// Runs the tool as a child and returns its exit code.
    Spawn,
}

impl Default for LaunchMode {
    fn default() -> Self {
        if cfg!(unix) {
            LaunchMode::Replace
        } else {
            LaunchMode::Spawn
        }
    }
}

pub struct Dispatcher<F, E> {
    resolver: VersionResolver<F, E>,
    index: InstallationIndex,
    mode: LaunchMode,
}

fn invoked_file_name(invoked_name: &OsStr) -> Result<&str> {
    let file_name = Path::new(invoked_name).file_name().unwrap_or(invoked_name);
    let name = file_name.to_str().ok_or_else(|| Error::InvalidName {
        kind: "command",
        value: file_name.to_string_lossy().into_owned(),
        reason: "must be valid UTF-8",
    })?;
    if name.is_empty() {
        return Err(Error::InvalidName {
            kind: "command",
            value: String::new(),
            reason: "must not be empty",
        });
    }
    Ok(name)
}

/// The command a shim was invoked as: the file name of `invoked_name`,
/// without the platform executable extension.
pub fn command_name(invoked_name: &OsStr) -> Result<String> {
    Ok(command_stem(invoked_file_name(invoked_name)?).to_string())
}

/// File names an invoked `file_name` may be installed as, in lookup order.
///
/// With `windows` set, a name without an executable extension matches the
/// `.exe`, `.cmd` and `.bat` files of that name, as the shell would.
pub fn executable_candidates(file_name: &str, windows: bool) -> Vec<String> {
    if !windows || split_windows_extension(file_name).is_some() {
        return vec![file_name.to_string()];
    }
    WINDOWS_EXTENSIONS
        .iter()
        .map(|ext| format!("{file_name}.{ext}"))
        .collect()
}

/// The tool a command belongs to.
///
/// A command named like an installed tool belongs to that tool. Otherwise
/// the installed tool shipping one of the `candidates` owns it, as
/// `kubens` belongs to `kubectx`. A command no tool ships is taken as a
/// tool name, so an unconfigured tool still gets a useful error.
///
/// # Errors
///
/// Returns [`Error::AmbiguousExecutable`] if several tools ship the command.
pub fn owning_tool(
    index: &InstallationIndex,
    command: &str,
    candidates: &[String],
) -> Result<ToolName> {
    let same_name = ToolName::new(command);
    if let Ok(tool) = &same_name {
        if index.has_tool(tool) {
            return Ok(tool.clone());
        }
    }
    let owners: BTreeSet<&ToolName> = candidates
        .iter()
        .flat_map(|name| index.owners(name))
        .collect();
    let mut iter = owners.iter();
    match (iter.next(), iter.next()) {
        (None, _) => same_name,
        (Some(owner), None) => Ok((*owner).clone()),
        _ => Err(Error::AmbiguousExecutable {
            executable: command.to_string(),
            tools: owners.iter().map(ToString::to_string).collect(),
        }),
    }
}

impl<F: FileSystem, E: EnvLookup> Dispatcher<F, E> {
    pub fn new(resolver: VersionResolver<F, E>, index: InstallationIndex) -> Self {
        Self {
            resolver,
            index,
            mode: LaunchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: LaunchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Works out what `invoked_name` would run in `current_dir`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoVersionConfigured`] if no tier declares the tool
    /// - [`Error::VersionNotInstalled`] if the declared version is missing
    /// - [`Error::ExecutableMissing`] if that version doesn't ship the command
    /// - [`Error::AmbiguousExecutable`] if the owning tool can't be told
    /// - [`Error::Format`] if a declaration file on the way is malformed
    pub fn prepare(&self, invoked_name: &OsStr, current_dir: &Path) -> Result<Launch> {
        let file_name = invoked_file_name(invoked_name)?;
        let command = command_stem(file_name).to_string();
        let candidates = executable_candidates(file_name, cfg!(windows));
        let tool = owning_tool(&self.index, &command, &candidates)?;
        debug!("'{command}' belongs to {tool}");

        let resolution = self
            .resolver
            .resolve(&tool, current_dir)?
            .ok_or_else(|| Error::NoVersionConfigured { tool: tool.to_string() })?;

        let record = self
            .index
            .locate(&tool, &resolution.version)
            .ok_or_else(|| Error::VersionNotInstalled {
                tool: tool.to_string(),
                version: resolution.version.to_string(),
                origin: resolution.source.to_string(),
                installed: self
                    .index
                    .versions(&tool)
                    .into_iter()
                    .map(ToString::to_string)
                    .collect(),
            })?;

        let executable = candidates
            .iter()
            .find_map(|name| record.find_executable(name))
            .ok_or_else(|| Error::ExecutableMissing {
                tool: tool.to_string(),
                version: resolution.version.to_string(),
                executable: command.clone(),
                bin_dirs: record.bin_dirs.clone(),
            })?;

        Ok(Launch {
            command,
            resolution,
            executable,
        })
    }

    /// Runs the configured version of `invoked_name` with `args` and
    /// returns its exit code.
    ///
    /// Arguments are passed through untouched, and the environment and the
    /// standard streams are inherited. In [`LaunchMode::Replace`] on Unix
    /// this only returns on failure.
    ///
    /// # Errors
    ///
    /// Everything [`Dispatcher::prepare`] returns, plus
    /// [`Error::LaunchFailed`] if the executable can't be started.
    pub fn dispatch<I>(&self, invoked_name: &OsStr, args: I, current_dir: &Path) -> Result<i32>
    where
        I: IntoIterator<Item = OsString>,
    {
        let launch = self.prepare(invoked_name, current_dir)?;
        info!(
            "running {} {} ({}): {}",
            launch.resolution.tool,
            launch.resolution.version,
            launch.resolution.source,
            launch.executable.display()
        );
        let mut command = Command::new(&launch.executable);
        command.args(args);
        run(command, &launch.executable, self.mode)
    }
}

#[cfg(unix)]
fn run(mut command: Command, program: &Path, mode: LaunchMode) -> Result<i32> {
    use std::os::unix::process::CommandExt;
    if mode == LaunchMode::Replace {
        let source = command.exec();
        return Err(Error::LaunchFailed {
            program: program.to_path_buf(),
            source,
        });
    }
    spawn(command, program)
}

#[cfg(not(unix))]
fn run(command: Command, program: &Path, _mode: LaunchMode) -> Result<i32> {
    spawn(command, program)
}

fn spawn(mut command: Command, program: &Path) -> Result<i32> {
    // Ctrl-C reaches the child through the console; the shim only waits.
    if let Err(e) = ctrlc::set_handler(|| {}) {
        debug!("Ctrl-C handler not installed: {e}");
    }
    let status = command.status().map_err(|source| Error::LaunchFailed {
        program: program.to_path_buf(),
        source,
    })?;
    debug!("{} exited with {status}", program.display());
    if let Some(code) = status.code() {
        return Ok(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Ok(128 + signal);
        }
    }
    Ok(1)
}
