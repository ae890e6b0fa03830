use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use crate::error::{Error, Result};
use crate::index::InstallationIndex;
use crate::util::is_script_name;

/// Suffix of the hidden link a stale shim is rebuilt under before it is
/// renamed into place.
const TMP_SUFFIX: &str = ".asdfw-tmp";

/// What a shim is on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimKind {
    /// A symlink to (Unix) or a copy of (elsewhere) the `asdfw` executable.
    Binary,
    /// A batch file calling `asdfw exec`. Windows runs `.cmd` and `.bat`
    /// files through `cmd.exe`, so a copied binary can't stand in for them.
    Script,
}

impl ShimKind {
    pub fn for_name(name: &str) -> ShimKind {
        if cfg!(windows) && is_script_name(name) {
            ShimKind::Script
        } else {
            ShimKind::Binary
        }
    }
}

/// Content of the script shim for `name`.
pub fn script_shim(target: &Path, name: &str) -> String {
    format!(
        "@echo off\r\n\"{}\" exec {name} %*\r\nexit /b %ERRORLEVEL%\r\n",
        target.display()
    )
}

/// Creates a platform-specific "shim" for the command `name` that forwards
/// execution to `target`.
///
/// On Unix systems, this creates a symbolic link at `shim_path` pointing to
/// `target`; the dispatcher finds out which command was meant from the name
/// it was invoked under. Elsewhere, `target` is copied to `shim_path`, or a
/// [`script_shim`] is written for batch scripts.
///
/// # Arguments
///
/// * `target` - Path to the `asdfw` executable.
/// * `name` - The executable the shim stands for.
/// * `shim_path` - Path where the shim will be created.
///
/// # Errors
///
/// Returns an error if the symlink (on Unix), the copy or the write fails.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use asdfw::shims::create_shim;
///
/// let target = Path::new("/usr/local/bin/asdfw");
/// create_shim(target, "hugo", Path::new("/home/me/.asdfw/shims/hugo")).unwrap();
/// ```
pub fn create_shim(target: &Path, name: &str, shim_path: &Path) -> io::Result<()> {
    if ShimKind::for_name(name) == ShimKind::Script {
        return fs::write(shim_path, script_shim(target, name));
    }
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, shim_path)?;
    }
    #[cfg(not(unix))]
    {
        fs::copy(target, shim_path)?;
    }
    Ok(())
}

fn is_leftover(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TMP_SUFFIX)
}

/// Outcome of one reconciliation. Every shim name lands in exactly one of
/// the sets, or in `failures`.
#[derive(Debug, Default, Serialize)]
pub struct ReshimReport {
    pub created: BTreeSet<String>,
    pub updated: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    /// Shims without an installed executable, left in place.
    pub orphaned: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<Error>,
}

fn serialize_failures<S: Serializer>(
    failures: &[Error],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(failures.iter().map(ToString::to_string))
}

impl ReshimReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// True when the run touched nothing on disk.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.failures.is_empty()
    }
}

/// The shims directory, kept in line with the installed executables.
#[derive(Debug, Clone)]
pub struct ShimRegistry {
    shims_dir: PathBuf,
    target: PathBuf,
}

impl ShimRegistry {
    /// `target` is the executable every shim forwards to.
    pub fn new(shims_dir: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            shims_dir: shims_dir.into(),
            target: target.into(),
        }
    }

    pub fn shims_dir(&self) -> &Path {
        &self.shims_dir
    }

    /// Shims currently present, by name. Leftovers of an interrupted update
    /// are not shims.
    pub fn existing(&self) -> Result<BTreeMap<String, PathBuf>> {
        let mut shims = BTreeMap::new();
        if !self.shims_dir.is_dir() {
            return Ok(shims);
        }
        let entries = WalkDir::new(&self.shims_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.shims_dir, e.into()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                warn!("ignoring non UTF-8 entry {}", entry.path().display());
                continue;
            };
            if is_leftover(name) {
                continue;
            }
            shims.insert(name.to_string(), entry.path().to_path_buf());
        }
        Ok(shims)
    }

    /// Makes the shims directory contain one shim per installed executable.
    ///
    /// Missing shims are created, stale ones re-pointed, and shims of
    /// executables no longer installed are removed when `cleanup` is set
    /// (reported as orphaned otherwise). A failing shim is recorded in the
    /// report and does not stop the others; nothing is rolled back.
    ///
    /// # Errors
    ///
    /// Only fails as a whole if the shims directory can't be created or
    /// listed.
    pub fn reconcile(&self, index: &InstallationIndex, cleanup: bool) -> Result<ReshimReport> {
        fs::create_dir_all(&self.shims_dir).map_err(|e| Error::io(&self.shims_dir, e))?;
        let wanted = index.executables();
        let existing = self.existing()?;
        let mut report = ReshimReport::default();

        for name in &wanted {
            let shim_path = self.shims_dir.join(name);
            if !existing.contains_key(name) {
                match create_shim(&self.target, name, &shim_path) {
                    Ok(()) => {
                        debug!("created shim {}", shim_path.display());
                        report.created.insert(name.clone());
                    }
                    Err(source) => report.failures.push(Error::ShimCreation {
                        name: name.clone(),
                        source,
                    }),
                }
            } else if self.is_stale(name, &shim_path) {
                match self.repoint(name, &shim_path) {
                    Ok(()) => {
                        debug!("re-pointed shim {}", shim_path.display());
                        report.updated.insert(name.clone());
                    }
                    Err(source) => report.failures.push(Error::ShimCreation {
                        name: name.clone(),
                        source,
                    }),
                }
            } else {
                report.unchanged.insert(name.clone());
            }
        }

        for (name, shim_path) in existing.iter().filter(|(name, _)| !wanted.contains(*name)) {
            if !cleanup {
                report.orphaned.insert(name.clone());
                continue;
            }
            match fs::remove_file(shim_path) {
                Ok(()) => {
                    debug!("removed shim {}", shim_path.display());
                    report.removed.insert(name.clone());
                }
                Err(e) => report.failures.push(Error::io(shim_path, e)),
            }
        }

        info!(
            "reshim: {} created, {} updated, {} removed, {} orphaned, {} failed",
            report.created.len(),
            report.updated.len(),
            report.removed.len(),
            report.orphaned.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// A symlink pointing anywhere but the target, or a script shim with
    /// other content. Other regular files are left as they are.
    fn is_stale(&self, name: &str, shim_path: &Path) -> bool {
        match ShimKind::for_name(name) {
            ShimKind::Script => fs::read_to_string(shim_path)
                .map_or(true, |content| content != script_shim(&self.target, name)),
            ShimKind::Binary => match fs::read_link(shim_path) {
                Ok(points_to) => points_to != self.target,
                Err(_) => false,
            },
        }
    }

    /// Swaps a stale shim for a fresh one without a moment where the name
    /// is missing.
    fn repoint(&self, name: &str, shim_path: &Path) -> io::Result<()> {
        let tmp = self.shims_dir.join(format!(".{name}{TMP_SUFFIX}"));
        match fs::remove_file(&tmp) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        create_shim(&self.target, name, &tmp)?;
        fs::rename(&tmp, shim_path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }
}
