use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;
use crate::error::{Error, Result};
use crate::tool::{ToolName, Version};
use crate::util::is_executable;

/// Directory inside a version that holds its executables, unless the tool
/// is configured otherwise.
pub const BIN_DIR: &str = "bin";

/// One installed version of one tool, as found on disk under
/// `<installs>/<tool>/<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallRecord {
    pub tool: ToolName,
    pub version: Version,
    /// Searched in order; the first one holding an executable wins.
    pub bin_dirs: Vec<PathBuf>,
    pub executables: BTreeSet<String>,
}

impl InstallRecord {
    /// Path of `file_name` in the first bin directory that has it.
    pub fn find_executable(&self, file_name: &str) -> Option<PathBuf> {
        self.bin_dirs
            .iter()
            .map(|dir| dir.join(file_name))
            .find(|path| path.is_file())
    }
}

/// Where each tool keeps its executables, relative to a version directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinDirs {
    per_tool: BTreeMap<ToolName, Vec<PathBuf>>,
}

impl BinDirs {
    /// Overrides the bin directories of `tool`. An empty list keeps the
    /// default.
    ///
    /// # Errors
    /// Returns [`Error::InvalidName`] for absolute paths and paths leaving
    /// the version directory.
    pub fn with_tool(mut self, tool: ToolName, dirs: Vec<PathBuf>) -> Result<Self> {
        for dir in &dirs {
            let escapes = dir
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes || dir.as_os_str().is_empty() {
                return Err(Error::InvalidName {
                    kind: "bin directory",
                    value: dir.display().to_string(),
                    reason: "must be a relative path inside the version directory",
                });
            }
        }
        if !dirs.is_empty() {
            self.per_tool.insert(tool, dirs);
        }
        Ok(self)
    }

    pub fn for_tool(&self, tool: &ToolName) -> Vec<PathBuf> {
        self.per_tool
            .get(tool)
            .cloned()
            .unwrap_or_else(|| vec![PathBuf::from(BIN_DIR)])
    }
}

/// A snapshot of the install root.
///
/// The filesystem is the only source of truth: nothing is persisted, each
/// process builds its own snapshot with [`InstallationIndex::scan`].
#[derive(Debug, Clone, Default)]
pub struct InstallationIndex {
    records: Vec<InstallRecord>,
}

/// Sorted entries of `dir` (not recursive). Links are not followed here;
/// callers classify entries through their resolved metadata.
fn list_dir(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                Error::io(path, e.into())
            })
        })
        .collect()
}

fn entry_name(entry: &walkdir::DirEntry) -> Option<String> {
    let name = entry.file_name().to_str().map(str::to_string);
    if name.is_none() {
        warn!("skipping non UTF-8 entry {}", entry.path().display());
    }
    name
}

impl InstallationIndex {
    /// Scans `root` with every tool keeping its executables in `bin`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if a directory can't be listed.
    pub fn scan(root: &Path) -> Result<InstallationIndex> {
        InstallationIndex::scan_with(root, &BinDirs::default())
    }

    /// Scans `root` for `<tool>/<version>/<bin dir>/<executable>` entries.
    ///
    /// Records are ordered by tool, then version, and executables are
    /// sorted, so two scans of the same tree are identical. A missing root
    /// is an empty index. Nothing under `root` is modified.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if a directory can't be listed.
    pub fn scan_with(root: &Path, bin_dirs: &BinDirs) -> Result<InstallationIndex> {
        let mut records = Vec::new();
        if !root.is_dir() {
            debug!("install root {} does not exist", root.display());
            return Ok(InstallationIndex { records });
        }

        for tool_entry in list_dir(root)? {
            if !tool_entry.path().is_dir() {
                continue;
            }
            let Some(tool_dir_name) = entry_name(&tool_entry) else {
                continue;
            };
            let tool = match ToolName::new(&tool_dir_name) {
                Ok(tool) => tool,
                Err(e) => {
                    warn!("skipping {}: {e}", tool_entry.path().display());
                    continue;
                }
            };
            let relative_bin_dirs = bin_dirs.for_tool(&tool);

            for version_entry in list_dir(tool_entry.path())? {
                if !version_entry.path().is_dir() {
                    continue;
                }
                let Some(version_dir_name) = entry_name(&version_entry) else {
                    continue;
                };
                let version = match Version::new(&version_dir_name) {
                    Ok(version) => version,
                    Err(e) => {
                        warn!("skipping {}: {e}", version_entry.path().display());
                        continue;
                    }
                };
                let dirs: Vec<PathBuf> = relative_bin_dirs
                    .iter()
                    .map(|dir| version_entry.path().join(dir))
                    .collect();
                let mut executables = BTreeSet::new();
                for dir in &dirs {
                    executables.extend(scan_bin_dir(dir)?);
                }
                debug!("found {tool} {version} with {} executables", executables.len());
                records.push(InstallRecord {
                    tool: tool.clone(),
                    version,
                    bin_dirs: dirs,
                    executables,
                });
            }
        }

        records.sort_by(|a, b| (&a.tool, &a.version).cmp(&(&b.tool, &b.version)));
        Ok(InstallationIndex { records })
    }

    pub fn records(&self) -> &[InstallRecord] {
        &self.records
    }

    /// The record of an installed version. `None` means the version is not
    /// installed; there is no fallback to any other version.
    pub fn locate(&self, tool: &ToolName, version: &Version) -> Option<&InstallRecord> {
        self.records
            .iter()
            .find(|r| r.tool == *tool && r.version == *version)
    }

    /// Installed versions of `tool`, in index order.
    pub fn versions(&self, tool: &ToolName) -> Vec<&Version> {
        self.records
            .iter()
            .filter(|r| r.tool == *tool)
            .map(|r| &r.version)
            .collect()
    }

    /// Every installed tool.
    pub fn tools(&self) -> BTreeSet<&ToolName> {
        self.records.iter().map(|r| &r.tool).collect()
    }

    pub fn has_tool(&self, tool: &ToolName) -> bool {
        self.records.iter().any(|r| r.tool == *tool)
    }

    /// Tools that ship an executable named `executable` in any version.
    pub fn owners(&self, executable: &str) -> BTreeSet<&ToolName> {
        self.records
            .iter()
            .filter(|r| r.executables.contains(executable))
            .map(|r| &r.tool)
            .collect()
    }

    /// Union of all executable names; the set of shims there should be.
    pub fn executables(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .flat_map(|r| r.executables.iter().cloned())
            .collect()
    }
}

fn scan_bin_dir(bin_dir: &Path) -> Result<BTreeSet<String>> {
    let mut executables = BTreeSet::new();
    if !bin_dir.is_dir() {
        return Ok(executables);
    }
    for entry in list_dir(bin_dir)? {
        if !is_executable(entry.path()) {
            continue;
        }
        if let Some(name) = entry_name(&entry) {
            executables.insert(name);
        }
    }
    Ok(executables)
}
