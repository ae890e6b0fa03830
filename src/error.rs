use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while resolving, reshimming or dispatching.
///
/// Absence of configuration is *not* an error in the lower layers (it is an
/// `Option`); it only becomes [`Error::NoVersionConfigured`] once the
/// dispatcher has exhausted every tier.
#[derive(Debug, Error)]
pub enum Error {
    /// A declaration file (or override variable) does not follow the
    /// `<tool> <version>` grammar.
    #[error("{}:{line}: {reason}", .path.display())]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error(
        "no version configured for '{tool}'. Run `asdfw global {tool} <version>` \
         or `asdfw local {tool} <version>` to configure one"
    )]
    NoVersionConfigured { tool: String },

    #[error(
        "version '{version}' of '{tool}' is configured ({origin}) but not installed{}",
        alternatives_hint(.installed)
    )]
    VersionNotInstalled {
        tool: String,
        version: String,
        origin: String,
        installed: Vec<String>,
    },

    #[error(
        "'{executable}' not found in {} ('{tool}' {version} does not provide it)",
        display_paths(.bin_dirs)
    )]
    ExecutableMissing {
        tool: String,
        version: String,
        executable: String,
        bin_dirs: Vec<PathBuf>,
    },

    #[error("could not create shim '{name}': {source}")]
    ShimCreation {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not launch {}: {source}", .program.display())]
    LaunchFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "'{executable}' is provided by several tools ({}); \
         remove one of the conflicting installations",
        .tools.join(", ")
    )]
    AmbiguousExecutable {
        executable: String,
        tools: Vec<String>,
    },

    #[error("invalid {kind} '{value}': {reason}")]
    InvalidName {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {reason}", .path.display())]
    Settings { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

fn alternatives_hint(installed: &[String]) -> String {
    if installed.is_empty() {
        String::from(". No versions of it are installed")
    } else {
        format!(". Installed versions: {}", installed.join(", "))
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    paths.join(", ")
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this kind of failure. Scripts branch on these.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io { .. } | Error::Settings { .. } => 1,
            Error::Format { .. } | Error::InvalidName { .. } => 3,
            Error::NoVersionConfigured { .. } => 4,
            Error::VersionNotInstalled { .. } => 5,
            Error::ExecutableMissing { .. } => 6,
            Error::ShimCreation { .. } => 7,
            Error::AmbiguousExecutable { .. } => 8,
            Error::LaunchFailed { .. } => 126,
        }
    }
}
