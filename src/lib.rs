//! # asdfw Core Library
//!
//! This crate contains the core logic of the `asdfw` tool – a per-tool version manager for
//! standalone command-line executables, in the spirit of `asdf`.
//!
//! Several versions of a tool live side by side under `<home>/installs/<tool>/<version>/bin`.
//! The version that runs is picked per invocation: an `ASDFW_<TOOL>_VERSION` variable wins, then
//! the nearest `.tool-versions` file above the current directory, then the global one. Shims on
//! the `PATH` route every call through the [`dispatch`] module, which launches the selected
//! executable.
//!
//! ## Modules Overview
//! - [`tool_versions`] – Parsing and atomic updates of `.tool-versions` files
//! - [`resolver`] – Picking the version of a tool for a directory
//! - [`index`] – Scanning the installed tools, versions and executables
//! - [`shims`] – Creating and reconciling the shims
//! - [`dispatch`] – Running the configured version of a shimmed command
//! - [`global`] – Home directory layout and user settings
//! - [`error`] – Error kinds and their exit codes
//! - [`util`] – Shared filesystem helpers

pub mod env;
pub mod error;
pub mod fs;
pub mod tool;
pub mod tool_versions;
pub mod resolver;
pub mod index;
pub mod util;
pub mod shims;
pub mod dispatch;
pub mod logging;
pub mod global;

pub use dispatch::{Dispatcher, Launch, LaunchMode};
pub use error::{Error, Result};
pub use index::{InstallRecord, InstallationIndex};
pub use resolver::{Resolution, VersionResolver, VersionSource};
pub use shims::{ReshimReport, ShimRegistry};
pub use tool::{ToolName, Version};
pub use tool_versions::ToolVersions;
