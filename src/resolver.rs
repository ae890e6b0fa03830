//! Picks the version of a tool that applies in a directory.
//!
//! Precedence, highest first:
//! 1. the `ASDFW_<TOOL>_VERSION` environment variable,
//! 2. the nearest `.tool-versions` declaring the tool, walking up from the
//!    current directory,
//! 3. the global declaration file.
//!
//! The lookup is a pure function of the tool, the directory, the injected
//! environment and the files on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::{debug, trace};
use crate::env::EnvLookup;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::tool::{ToolName, Version};
use crate::tool_versions::{ToolVersions, FILE_NAME};

/// Where a resolved version came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VersionSource {
    Environment { variable: String },
    Local { path: PathBuf },
    Global { path: PathBuf },
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSource::Environment { variable } => write!(f, "set by {variable}"),
            VersionSource::Local { path } => write!(f, "set by {}", path.display()),
            VersionSource::Global { path } => write!(f, "set by global {}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub tool: ToolName,
    pub version: Version,
    pub source: VersionSource,
}

pub struct VersionResolver<F, E> {
    fs: F,
    env: E,
    global_file: PathBuf,
    ceiling: Option<PathBuf>,
}

impl<F: FileSystem, E: EnvLookup> VersionResolver<F, E> {
    pub fn new(fs: F, env: E, global_file: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            env,
            global_file: global_file.into(),
            ceiling: None,
        }
    }

    /// Stops the upward walk at `ceiling` (inclusive) for directories inside
    /// it. Directories outside the ceiling walk up to the root.
    pub fn with_ceiling(mut self, ceiling: Option<PathBuf>) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Resolves the version of `tool` for `current_dir`.
    ///
    /// `Ok(None)` means no tier declares the tool.
    ///
    /// # Errors
    /// A malformed declaration file met on the way is fatal: it is reported
    /// instead of being skipped. Files further up than the first match are
    /// never read.
    pub fn resolve(&self, tool: &ToolName, current_dir: &Path) -> Result<Option<Resolution>> {
        if let Some(resolution) = self.from_env(tool)? {
            return Ok(Some(resolution));
        }
        if let Some(resolution) = self.from_local(tool, current_dir)? {
            return Ok(Some(resolution));
        }
        self.from_global(tool)
    }

    /// Resolves several tools against the same directory.
    pub fn resolve_all<'a, I>(
        &self,
        tools: I,
        current_dir: &Path,
    ) -> Result<Vec<(ToolName, Option<Resolution>)>>
    where
        I: IntoIterator<Item = &'a ToolName>,
    {
        tools
            .into_iter()
            .map(|tool| Ok((tool.clone(), self.resolve(tool, current_dir)?)))
            .collect()
    }

    /// Directories whose `.tool-versions` are consulted, nearest first.
    pub fn candidate_dirs(&self, current_dir: &Path) -> Vec<PathBuf> {
        let ceiling = self
            .ceiling
            .as_deref()
            .filter(|ceiling| current_dir.starts_with(ceiling));
        let mut dirs = Vec::new();
        for dir in current_dir.ancestors() {
            if dir.as_os_str().is_empty() {
                break;
            }
            dirs.push(dir.to_path_buf());
            if Some(dir) == ceiling {
                break;
            }
        }
        dirs
    }

    fn from_env(&self, tool: &ToolName) -> Result<Option<Resolution>> {
        let variable = tool.env_var();
        match self.env.var(&variable) {
            Some(value) if !value.is_empty() => {
                let version = Version::new(&value)?;
                debug!("{tool} {version} from {variable}");
                Ok(Some(Resolution {
                    tool: tool.clone(),
                    version,
                    source: VersionSource::Environment { variable },
                }))
            }
            _ => Ok(None),
        }
    }

    fn from_local(&self, tool: &ToolName, current_dir: &Path) -> Result<Option<Resolution>> {
        for dir in self.candidate_dirs(current_dir) {
            let path = dir.join(FILE_NAME);
            trace!("looking for {tool} in {}", path.display());
            let Some(declared) = ToolVersions::load(&self.fs, &path)? else {
                continue;
            };
            if let Some(version) = declared.get(tool) {
                debug!("{tool} {version} from {}", path.display());
                return Ok(Some(Resolution {
                    tool: tool.clone(),
                    version: version.clone(),
                    source: VersionSource::Local { path },
                }));
            }
        }
        Ok(None)
    }

    fn from_global(&self, tool: &ToolName) -> Result<Option<Resolution>> {
        let declared = ToolVersions::load(&self.fs, &self.global_file)?;
        let version = declared.as_ref().and_then(|d| d.get(tool));
        Ok(version.map(|version| {
            debug!("{tool} {version} from global {}", self.global_file.display());
            Resolution {
                tool: tool.clone(),
                version: version.clone(),
                source: VersionSource::Global {
                    path: self.global_file.clone(),
                },
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fs::MemoryFileSystem;
    use std::collections::HashMap;

    const GLOBAL: &str = "/home/me/.asdfw/.tool-versions";

    fn tool(name: &str) -> ToolName {
        ToolName::new(name).unwrap()
    }

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn hugo_fixture() -> MemoryFileSystem {
        MemoryFileSystem::new()
            .with_file(GLOBAL, "hugo 0.92.1\ndocker v1.19\n")
            .with_file("/proj/.tool-versions", "hugo 0.90.0\n")
    }

    fn version_of(resolution: Option<Resolution>) -> Option<String> {
        resolution.map(|r| r.version.to_string())
    }

    #[test]
    fn test_global_applies_without_local_file() {
        let fs = MemoryFileSystem::new().with_file(GLOBAL, "hugo 0.92.1\n");
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL);
        let resolution = resolver.resolve(&tool("hugo"), Path::new("/proj")).unwrap().unwrap();
        assert_eq!(resolution.version.as_str(), "0.92.1");
        assert_eq!(resolution.source, VersionSource::Global { path: PathBuf::from(GLOBAL) });
    }

    #[test]
    fn test_local_found_by_upward_traversal() {
        let fs = hugo_fixture();
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL);
        let resolution = resolver.resolve(&tool("hugo"), Path::new("/proj/sub")).unwrap().unwrap();
        assert_eq!(resolution.version.as_str(), "0.90.0");
        assert_eq!(
            resolution.source,
            VersionSource::Local { path: PathBuf::from("/proj/.tool-versions") }
        );
    }

    #[test]
    fn test_environment_override_wins() {
        let fs = hugo_fixture();
        let resolver = VersionResolver::new(&fs, env(&[("ASDFW_HUGO_VERSION", "1.0.0")]), GLOBAL);
        for dir in ["/", "/proj", "/proj/sub", "/proj/sub/deeper/still"] {
            let resolution = resolver.resolve(&tool("hugo"), Path::new(dir)).unwrap().unwrap();
            assert_eq!(resolution.version.as_str(), "1.0.0", "in {dir}");
            assert!(matches!(resolution.source, VersionSource::Environment { .. }));
        }
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let fs = hugo_fixture();
        let resolver = VersionResolver::new(&fs, env(&[("ASDFW_HUGO_VERSION", "")]), GLOBAL);
        let resolution = resolver.resolve(&tool("hugo"), Path::new("/proj")).unwrap();
        assert_eq!(version_of(resolution), Some("0.90.0".into()));
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let fs = hugo_fixture();
        let overrides = env(&[("ASDFW_HUGO_VERSION", "1.0 beta")]);
        let resolver = VersionResolver::new(&fs, overrides, GLOBAL);
        assert!(resolver.resolve(&tool("hugo"), Path::new("/proj")).is_err());
    }

    #[test]
    fn test_undeclared_tool_is_unresolved() {
        let fs = hugo_fixture();
        let resolver = VersionResolver::new(&fs, env(&[("ASDFW_HUGO_VERSION", "1.0.0")]), GLOBAL);
        for dir in ["/", "/proj", "/proj/sub", "/elsewhere"] {
            assert_eq!(resolver.resolve(&tool("terraform"), Path::new(dir)).unwrap(), None);
        }
    }

    #[test]
    fn test_nearest_declaration_wins() {
        let fs = MemoryFileSystem::new()
            .with_file("/a/.tool-versions", "tool1 v1.3\ntool3 v10\n")
            .with_file("/a/b/.tool-versions", "tool1 v1.4\n");
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL);
        let dir = Path::new("/a/b/c");
        assert_eq!(version_of(resolver.resolve(&tool("tool1"), dir).unwrap()), Some("v1.4".into()));
        assert_eq!(version_of(resolver.resolve(&tool("tool3"), dir).unwrap()), Some("v10".into()));
        let resolved = resolver.resolve(&tool("tool1"), Path::new("/a")).unwrap();
        assert_eq!(version_of(resolved), Some("v1.3".into()));
    }

    #[test]
    fn test_malformed_file_in_chain_is_fatal() {
        let fs = hugo_fixture().with_file("/proj/sub/.tool-versions", "hugo 1.0\nhugo 2.0\n");
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL);
        let err = resolver.resolve(&tool("hugo"), Path::new("/proj/sub")).unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }), "{err:?}");
        // the file is fatal for every tool, not only the duplicated one
        assert!(resolver.resolve(&tool("docker"), Path::new("/proj/sub")).is_err());
    }

    #[test]
    fn test_malformed_global_is_fatal() {
        let fs = MemoryFileSystem::new().with_file(GLOBAL, "hugo  0.92.1\n");
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL);
        assert!(resolver.resolve(&tool("hugo"), Path::new("/proj")).is_err());
    }

    #[test]
    fn test_ceiling_stops_traversal() {
        let fs = MemoryFileSystem::new()
            .with_file("/home/.tool-versions", "hugo 0.50\n")
            .with_file("/home/me/.tool-versions", "docker 1\n");
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL)
            .with_ceiling(Some(PathBuf::from("/home/me")));
        let dir = Path::new("/home/me/work/proj");
        assert_eq!(
            resolver.candidate_dirs(dir),
            vec![
                PathBuf::from("/home/me/work/proj"),
                PathBuf::from("/home/me/work"),
                PathBuf::from("/home/me"),
            ]
        );
        assert_eq!(resolver.resolve(&tool("hugo"), dir).unwrap(), None);
        assert_eq!(version_of(resolver.resolve(&tool("docker"), dir).unwrap()), Some("1".into()));
        // outside the ceiling the walk goes to the root
        assert_eq!(resolver.candidate_dirs(Path::new("/srv/x")).len(), 3);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let fs = hugo_fixture();
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL);
        let first = resolver.resolve(&tool("hugo"), Path::new("/proj/sub")).unwrap();
        let second = resolver.resolve(&tool("hugo"), Path::new("/proj/sub")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_all() {
        let fs = hugo_fixture();
        let resolver = VersionResolver::new(&fs, no_env(), GLOBAL);
        let tools = [tool("docker"), tool("hugo"), tool("kubectl")];
        let resolved = resolver.resolve_all(&tools, Path::new("/proj")).unwrap();
        let versions: Vec<Option<String>> =
            resolved.into_iter().map(|(_, r)| version_of(r)).collect();
        assert_eq!(versions, vec![Some("v1.19".into()), Some("0.90.0".into()), None]);
    }
}
