use std::fmt;
use serde::Serialize;
use crate::error::{Error, Result};

/// Prefix and suffix of the per-tool override variable.
const ENV_PREFIX: &str = "ASDFW_";
const ENV_SUFFIX: &str = "_VERSION";

/// A tool name, normalized to lower case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ToolName(String);

/// An opaque version label. Compared by exact string match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(String);

fn validate_token(kind: &'static str, value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        "must not be empty"
    } else if value.chars().any(char::is_whitespace) {
        "must not contain whitespace"
    } else if value.contains('/') || value.contains('\\') {
        "must not contain path separators"
    } else if value == "." || value == ".." {
        "must not be a relative path component"
    } else {
        return Ok(());
    };
    Err(Error::InvalidName {
        kind,
        value: value.to_string(),
        reason,
    })
}

impl ToolName {
    pub fn new(name: &str) -> Result<Self> {
        validate_token("tool name", name)?;
        Ok(ToolName(name.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the variable that overrides this tool's version for the
    /// current shell, e.g. `ASDFW_HUGO_VERSION`.
    pub fn env_var(&self) -> String {
        format!("{ENV_PREFIX}{}{ENV_SUFFIX}", self.0.to_uppercase())
    }
}

impl Version {
    pub fn new(version: &str) -> Result<Self> {
        validate_token("version", version)?;
        Ok(Version(version.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
