use std::path::Path;
use std::sync::LazyLock;
use regex::Regex;
use tracing::debug;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, OsFileSystem};
use crate::tool::{ToolName, Version};
use crate::util::atomic_write;

/// Name of a directory-local declaration file.
pub const FILE_NAME: &str = ".tool-versions";

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s#]\S*) (\S+)$").expect("declaration line pattern is valid")
});

/// The parsed contents of a `.tool-versions` file.
///
/// Entries keep the order they appear in the file. A file never declares the
/// same tool twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolVersions {
    entries: Vec<(ToolName, Version)>,
}

/// What [`write`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Appended,
    Replaced,
    Unchanged,
}

/// Strips the line terminator, tolerating the CRLF endings the Windows
/// version of the tool wrote and a stray `\r` ending the file.
fn split_terminator(segment: &str) -> (&str, &str) {
    if let Some(body) = segment.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = segment.strip_suffix('\n') {
        (body, "\n")
    } else if let Some(body) = segment.strip_suffix('\r') {
        (body, "\r")
    } else {
        (segment, "")
    }
}

fn is_ignored(body: &str) -> bool {
    body.is_empty() || body.starts_with('#')
}

fn parse_line(body: &str, path: &Path, line: usize) -> Result<(ToolName, Version)> {
    let format_error = |reason: String| Error::Format {
        path: path.to_path_buf(),
        line,
        reason,
    };
    let captures = LINE
        .captures(body)
        .ok_or_else(|| format_error(format!("expected '<tool> <version>', found '{body}'")))?;
    let tool = ToolName::new(&captures[1]).map_err(|e| format_error(e.to_string()))?;
    let version = Version::new(&captures[2]).map_err(|e| format_error(e.to_string()))?;
    Ok((tool, version))
}

impl ToolVersions {
    /// Parses declaration file content. `path` is only used for error
    /// messages.
    ///
    /// # Errors
    /// Returns [`Error::Format`] for the first malformed line or for a tool
    /// declared twice.
    pub fn parse(content: &str, path: &Path) -> Result<ToolVersions> {
        let mut entries: Vec<(ToolName, Version)> = Vec::new();
        for (index, segment) in content.split_inclusive('\n').enumerate() {
            let (body, _) = split_terminator(segment);
            if is_ignored(body) {
                continue;
            }
            let line = index + 1;
            let (tool, version) = parse_line(body, path, line)?;
            if entries.iter().any(|(existing, _)| *existing == tool) {
                return Err(Error::Format {
                    path: path.to_path_buf(),
                    line,
                    reason: format!("duplicate entry for '{tool}'"),
                });
            }
            entries.push((tool, version));
        }
        Ok(ToolVersions { entries })
    }

    /// Loads a declaration file through `fs`.
    ///
    /// Returns `Ok(None)` when the file does not exist; that only means
    /// nothing is declared at this location.
    pub fn load<F: FileSystem>(fs: &F, path: &Path) -> Result<Option<ToolVersions>> {
        match fs.read_to_string(path) {
            Ok(content) => ToolVersions::parse(&content, path).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn get(&self, tool: &ToolName) -> Option<&Version> {
        self.entries
            .iter()
            .find(|(name, _)| name == tool)
            .map(|(_, version)| version)
    }
}

/// Reads a declaration file from disk. See [`ToolVersions::load`].
pub fn read(path: &Path) -> Result<Option<ToolVersions>> {
    ToolVersions::load(&OsFileSystem, path)
}

/// Sets `tool` to `version` in the file at `path`.
///
/// An existing line for the tool is replaced in place; everything else in
/// the file (comments, blank lines, other tools) is kept as is. Otherwise
/// the entry is appended, creating the file if needed. The new content
/// replaces the old one atomically.
///
/// # Errors
/// Returns [`Error::Format`] if the existing file is malformed (it is left
/// untouched) and [`Error::Io`] if it can't be read or replaced.
pub fn write(path: &Path, tool: &ToolName, version: &Version) -> Result<WriteOutcome> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(Error::io(path, e)),
    };

    let (content, outcome) = match existing {
        None => (format!("{tool} {version}\n"), WriteOutcome::Created),
        Some(content) => {
            ToolVersions::parse(&content, path)?;
            upsert(&content, path, tool, version)?
        }
    };

    if outcome == WriteOutcome::Unchanged {
        debug!("{} already declares {tool} {version}", path.display());
        return Ok(outcome);
    }
    debug!("writing {tool} {version} to {} ({outcome:?})", path.display());
    atomic_write(path, content.as_bytes())?;
    Ok(outcome)
}

fn upsert(
    content: &str,
    path: &Path,
    tool: &ToolName,
    version: &Version,
) -> Result<(String, WriteOutcome)> {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut output = String::with_capacity(content.len() + 32);
    let mut outcome = WriteOutcome::Appended;

    for (index, segment) in content.split_inclusive('\n').enumerate() {
        let (body, terminator) = split_terminator(segment);
        if !is_ignored(body) {
            let (name, current) = parse_line(body, path, index + 1)?;
            if name == *tool {
                outcome = if current == *version {
                    WriteOutcome::Unchanged
                } else {
                    WriteOutcome::Replaced
                };
                output.push_str(&format!("{tool} {version}{terminator}"));
                continue;
            }
        }
        output.push_str(segment);
    }

    if outcome == WriteOutcome::Appended {
        if output.ends_with('\r') {
            output.push('\n');
        } else if !output.is_empty() && !output.ends_with('\n') {
            output.push_str(newline);
        }
        output.push_str(&format!("{tool} {version}{newline}"));
    }
    Ok((output, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn tool(name: &str) -> ToolName {
        ToolName::new(name).unwrap()
    }

    fn version(v: &str) -> Version {
        Version::new(v).unwrap()
    }

    fn parse(content: &str) -> Result<ToolVersions> {
        ToolVersions::parse(content, Path::new(FILE_NAME))
    }

    #[test]
    fn test_parse_valid_file() {
        let tvs = parse("tool1 v1.2\ntool2 v2.1.3\n# comment\n\ntool3 12\n").unwrap();
        assert_eq!(tvs, parse("tool1 v1.2\ntool2 v2.1.3\ntool3 12").unwrap());
        assert_eq!(tvs.get(&tool("tool2")), Some(&version("v2.1.3")));
        assert_eq!(tvs.get(&tool("TOOL3")), Some(&version("12")));
        assert_eq!(tvs.get(&tool("tool4")), None);
    }

    #[test]
    fn test_parse_tolerates_crlf() {
        let tvs = parse("tool1 v1.2\r\ntool2 v2.1.3\r\n").unwrap();
        assert_eq!(tvs.get(&tool("tool1")), Some(&version("v1.2")));
        assert_eq!(tvs.get(&tool("tool2")), Some(&version("v2.1.3")));
    }

    #[test]
    fn test_parse_tolerates_bare_cr_at_end_of_file() {
        let tvs = parse("docker 1\r\nhugo 1.0\r").unwrap();
        assert_eq!(tvs.get(&tool("docker")), Some(&version("1")));
        assert_eq!(tvs.get(&tool("hugo")), Some(&version("1.0")));

        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "docker 1\r\nhugo 1.0\r").unwrap();
        assert_eq!(write(&path, &tool("go"), &version("1.22")).unwrap(), WriteOutcome::Appended);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "docker 1\r\nhugo 1.0\r\ngo 1.22\r\n"
        );
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let cases = [
            ("my-tool ", "missing version"),
            ("my-tool v1 1.2", "more than one space"),
            ("my-tool  v11.2", "two spaces separator"),
            ("my-tool v1.2 ", "trailing whitespace"),
            (" my-tool v1.2", "leading whitespace"),
            ("my-tool\tv1.2", "tab separator"),
            ("my-tool", "no separator"),
        ];
        for (line, msg) in cases {
            let content = format!("ok 1.0\n{line}\n");
            match parse(&content) {
                Err(Error::Format { line, .. }) => assert_eq!(line, 2, "{msg}"),
                other => panic!("{msg}: expected format error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_rejects_duplicate_tools() {
        let err = parse("hugo 1.0\nhugo 2.0\n").unwrap_err();
        match err {
            Error::Format { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("hugo"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parse("hugo 1.0\nHugo 1.0\n").is_err(), "duplicates are case-insensitive");
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let fs = MemoryFileSystem::new();
        let result = ToolVersions::load(&fs, Path::new("/nowhere/.tool-versions")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_reports_path_in_format_error() {
        let fs = MemoryFileSystem::new().with_file("/proj/.tool-versions", "hugo\n");
        let err = ToolVersions::load(&fs, Path::new("/proj/.tool-versions")).unwrap_err();
        assert!(err.to_string().starts_with("/proj/.tool-versions:1:"), "{err}");
    }

    #[test]
    fn test_write_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(FILE_NAME);
        let outcome = write(&path, &tool("hugo"), &version("0.92.1")).unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hugo 0.92.1\n");
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "# pinned tools\ndocker v1.19\nhugo 0.90.0\nminikube 2.5\n").unwrap();

        let outcome = write(&path, &tool("hugo"), &version("0.92.1")).unwrap();
        assert_eq!(outcome, WriteOutcome::Replaced);
        let tvs = read(&path).unwrap().unwrap();
        assert_eq!(tvs.get(&tool("hugo")), Some(&version("0.92.1")));
        assert_eq!(tvs.get(&tool("docker")), Some(&version("v1.19")));
        assert_eq!(tvs.get(&tool("minikube")), Some(&version("2.5")));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# pinned tools\ndocker v1.19\nhugo 0.92.1\nminikube 2.5\n"
        );
    }

    #[test]
    fn test_write_appends_new_tool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "docker v1.19").unwrap();
        assert_eq!(write(&path, &tool("hugo"), &version("1.0")).unwrap(), WriteOutcome::Appended);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "docker v1.19\nhugo 1.0\n");
    }

    #[test]
    fn test_write_keeps_crlf_line_endings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "tool1 v1.2\r\ntool2 v2\r\n").unwrap();
        write(&path, &tool("tool1"), &version("v1.3")).unwrap();
        write(&path, &tool("tool4"), &version("1.0")).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "tool1 v1.3\r\ntool2 v2\r\ntool4 1.0\r\n"
        );
    }

    #[test]
    fn test_write_same_version_is_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "hugo 1.0\n").unwrap();
        assert_eq!(write(&path, &tool("HUGO"), &version("1.0")).unwrap(), WriteOutcome::Unchanged);
    }

    #[test]
    fn test_write_refuses_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "hugo 1.0\nhugo 2.0\n").unwrap();
        let err = write(&path, &tool("docker"), &version("1")).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hugo 1.0\nhugo 2.0\n");
    }

    #[test]
    fn test_write_leaves_no_temporary_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        write(&path, &tool("a"), &version("1")).unwrap();
        write(&path, &tool("b"), &version("2")).unwrap();
        write(&path, &tool("a"), &version("3")).unwrap();
        let names: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(names, vec![path]);
    }
}
