use std::fs;
use std::io::Write;
use std::path::Path;
use crate::error::{Error, Result};

/// Replaces the file at `path` with `content` in one step.
///
/// The content goes to a temporary file next to `path`, is synced, and is
/// then renamed over the destination, so readers see either the old or the
/// new file and never a partial one. The temporary file is deleted on every
/// failure path. Missing parent directories are created.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let prefix = format!(
        ".{}.",
        path.file_name().unwrap_or_default().to_string_lossy()
    );
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;
    tmp.write_all(content).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;

    // temp files are created private; keep what the old file had instead
    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Checks if a given path has a Windows executable extension (.exe, .bat, .cmd).
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        let ext = ext.to_ascii_lowercase();
        matches!(ext.as_str(), "exe" | "bat" | "cmd")
    } else {
        false
    }
}

#[cfg(not(any(unix, windows)))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Extensions Windows runs without being told, lower case.
pub const WINDOWS_EXTENSIONS: [&str; 3] = ["exe", "cmd", "bat"];

/// Splits a Windows executable extension off `name`, ignoring case.
/// `None` for any other name, including a bare `.exe`.
pub fn split_windows_extension(name: &str) -> Option<(&str, &str)> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    WINDOWS_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
        .then_some((stem, ext))
}

/// A batch script (`.cmd` or `.bat`). Windows can't run a copied binary
/// under such a name, so these get script shims.
pub fn is_script_name(name: &str) -> bool {
    split_windows_extension(name).is_some_and(|(_, ext)| !ext.eq_ignore_ascii_case("exe"))
}

/// The command a file name stands for: on Windows without its executable
/// extension, elsewhere unchanged.
pub fn command_stem(name: &str) -> &str {
    if !cfg!(windows) {
        return name;
    }
    split_windows_extension(name).map_or(name, |(stem, _)| stem)
}
