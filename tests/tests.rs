use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use asdfw::fs::OsFileSystem;
use asdfw::global::layout::Layout;
use asdfw::tool_versions::{self, ToolVersions, WriteOutcome};
use asdfw::{
    Dispatcher, InstallationIndex, ShimRegistry, ToolName, Version, VersionResolver, VersionSource,
};

fn setup_tests() -> (TempDir, Layout) {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::from_home(temp_dir.path().join("home"));
    layout.ensure_dirs().unwrap();
    (temp_dir, layout)
}

fn install(layout: &Layout, tool: &str, version: &str, exes: &[&str]) -> PathBuf {
    let bin = layout.installs_dir.join(tool).join(version).join("bin");
    fs::create_dir_all(&bin).unwrap();
    for exe in exes {
        let path = bin.join(exe);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }
    bin
}

fn tool(name: &str) -> ToolName {
    ToolName::new(name).unwrap()
}

fn version(v: &str) -> Version {
    Version::new(v).unwrap()
}

type Env = HashMap<String, String>;

fn dispatcher(layout: &Layout, env: Env) -> Dispatcher<OsFileSystem, Env> {
    let resolver = VersionResolver::new(OsFileSystem, env, &layout.global_file);
    Dispatcher::new(resolver, InstallationIndex::scan(&layout.installs_dir).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_hugo_walkthrough() {
        let (dir, layout) = setup_tests();
        install(&layout, "hugo", "0.92.1", &["hugo"]);
        let local_bin = install(&layout, "hugo", "0.90.0", &["hugo"]);
        let project = dir.path().join("proj");
        fs::create_dir_all(project.join("sub")).unwrap();

        tool_versions::write(&layout.global_file, &tool("hugo"), &version("0.92.1")).unwrap();
        let local = project.join(".tool-versions");
        tool_versions::write(&local, &tool("hugo"), &version("0.90.0")).unwrap();

        let launch = dispatcher(&layout, HashMap::new())
            .prepare(OsStr::new("hugo"), &project.join("sub"))
            .unwrap();
        assert_eq!(launch.executable, local_bin.join("hugo"));
        assert_eq!(
            launch.resolution.source,
            VersionSource::Local { path: project.join(".tool-versions") }
        );

        // outside the project the global version applies
        let launch = dispatcher(&layout, HashMap::new())
            .prepare(OsStr::new("hugo"), dir.path())
            .unwrap();
        assert_eq!(launch.resolution.version.as_str(), "0.92.1");
    }

    #[test]
    fn test_override_of_uninstalled_version_is_reported() {
        let (dir, layout) = setup_tests();
        install(&layout, "hugo", "0.92.1", &["hugo"]);
        let env: Env = [("ASDFW_HUGO_VERSION".to_string(), "1.0.0".to_string())].into();

        let err = dispatcher(&layout, env).prepare(OsStr::new("hugo"), dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("ASDFW_HUGO_VERSION"));
    }

    #[test]
    fn test_write_then_read_back() {
        let (_dir, layout) = setup_tests();
        let path = &layout.global_file;
        let set = |name: &str, v: &str| {
            tool_versions::write(path, &tool(name), &version(v)).unwrap()
        };
        assert_eq!(set("hugo", "0.92.1"), WriteOutcome::Created);
        assert_eq!(set("docker", "v1.19"), WriteOutcome::Appended);
        assert_eq!(set("hugo", "0.90.0"), WriteOutcome::Replaced);

        let declared = tool_versions::read(path).unwrap().unwrap();
        let expected = ToolVersions::parse("hugo 0.90.0\ndocker v1.19\n", path).unwrap();
        assert_eq!(declared, expected);
    }

    #[test]
    fn test_reshim_after_uninstall() {
        let (_dir, layout) = setup_tests();
        install(&layout, "hugo", "0.92.1", &["hugo"]);
        install(&layout, "kubectx", "0.12", &["kubectx", "kubens"]);
        let registry = ShimRegistry::new(&layout.shims_dir, layout.home.join("asdfw"));

        let report = registry
            .reconcile(&InstallationIndex::scan(&layout.installs_dir).unwrap(), true)
            .unwrap();
        assert_eq!(report.created.len(), 3);

        fs::remove_dir_all(layout.installs_dir.join("kubectx")).unwrap();
        let report = registry
            .reconcile(&InstallationIndex::scan(&layout.installs_dir).unwrap(), true)
            .unwrap();
        assert_eq!(report.removed.iter().collect::<Vec<_>>(), vec!["kubectx", "kubens"]);
        assert!(report.created.is_empty());
        let names: Vec<String> = registry.existing().unwrap().into_keys().collect();
        assert_eq!(names, vec!["hugo"]);
        assert!(!layout.shims_dir.join("kubens").exists());
    }
}
