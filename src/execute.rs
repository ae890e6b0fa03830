use std::ffi::{OsStr, OsString};
use std::path::Path;
use anyhow::{Context, Result};
use colored::Colorize;
use tracing::warn;
use asdfw::env::ProcessEnv;
use asdfw::global::Runtime;
use asdfw::index::InstallationIndex;
use asdfw::logging;
use asdfw::resolver::Resolution;
use asdfw::shims::ReshimReport;
use asdfw::tool::{ToolName, Version};
use asdfw::tool_versions::{self, WriteOutcome, FILE_NAME};
use asdfw::Error;
use crate::cli::{AsdfwCommand, CLI};

fn runtime() -> Result<Runtime> {
    let current_dir = std::env::current_dir().context("Could not determine the current directory")?;
    Ok(Runtime::load(&ProcessEnv, current_dir)?)
}

/// Runs a subcommand and returns the process exit code.
pub fn execute(cli: CLI) -> Result<i32> {
    let runtime = runtime()?;
    match cli.command {
        AsdfwCommand::Reshim { cleanup, json } => {
            execute_reshim(&runtime, cleanup, json)
        }
        AsdfwCommand::Which { command } => {
            execute_which(&runtime, &command)?;
            Ok(0)
        }
        AsdfwCommand::Global { tool, version } => {
            execute_set(&runtime, &runtime.layout.global_file, &tool, &version)?;
            Ok(0)
        }
        AsdfwCommand::Local { tool, version } => {
            let path = runtime.current_dir.join(FILE_NAME);
            execute_set(&runtime, &path, &tool, &version)?;
            Ok(0)
        }
        AsdfwCommand::Exec { command, args } => {
            execute_exec(&runtime, command.into(), args)
        }
        AsdfwCommand::Current { tool } => {
            execute_current(&runtime, tool.as_deref())?;
            Ok(0)
        }
        AsdfwCommand::List { tool } => {
            execute_list(&runtime, tool.as_deref())?;
            Ok(0)
        }
    }
}

/// Entry point when the binary runs as a shim.
pub fn run_shim(invoked_name: OsString, args: Vec<OsString>) -> Result<i32> {
    let runtime = runtime()?;
    logging::init_shim(&runtime.layout.log_dir);
    execute_exec(&runtime, invoked_name, args)
}

pub fn execute_reshim(runtime: &Runtime, cleanup: bool, json: bool) -> Result<i32> {
    runtime.layout.ensure_dirs()?;
    let index = runtime.scan()?;
    let registry = runtime.shim_registry()?;
    let report = registry.reconcile(&index, cleanup)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, registry.shims_dir());
    }
    Ok(report.failures.iter().map(Error::exit_code).max().unwrap_or(0))
}

fn print_report(report: &ReshimReport, shims_dir: &Path) {
    if report.is_noop() && report.orphaned.is_empty() {
        println!("Shims in {} are up to date", shims_dir.display());
        return;
    }
    for name in &report.created {
        println!("{} {name}", "created".green());
    }
    for name in &report.updated {
        println!("{} {name}", "updated".green());
    }
    for name in &report.removed {
        println!("{} {name}", "removed".yellow());
    }
    for name in &report.orphaned {
        println!("{} {name} (run `asdfw reshim --cleanup` to remove it)", "orphaned".yellow());
    }
    for failure in &report.failures {
        eprintln!("{} {failure}", "failed".red());
    }
}

pub fn execute_which(runtime: &Runtime, command: &str) -> Result<()> {
    let dispatcher = runtime.dispatcher(ProcessEnv)?;
    let launch = dispatcher.prepare(OsStr::new(command), &runtime.current_dir)?;
    println!("{}", launch.executable.display());
    Ok(())
}

pub fn execute_set(runtime: &Runtime, path: &Path, tool: &str, version: &str) -> Result<()> {
    let tool = ToolName::new(tool)?;
    let version = Version::new(version)?;
    let outcome = tool_versions::write(path, &tool, &version)?;

    let index = runtime.scan()?;
    if index.locate(&tool, &version).is_none() {
        warn!("{tool} {version} is not installed");
    }
    match outcome {
        WriteOutcome::Unchanged => println!("{tool} {version} already set in {}", path.display()),
        _ => println!("Set {tool} {version} in {}", path.display()),
    }
    Ok(())
}

pub fn execute_exec(runtime: &Runtime, command: OsString, args: Vec<OsString>) -> Result<i32> {
    let dispatcher = runtime.dispatcher(ProcessEnv)?;
    Ok(dispatcher.dispatch(&command, args, &runtime.current_dir)?)
}

fn print_resolution(tool: &ToolName, resolution: Option<&Resolution>, index: &InstallationIndex) {
    match resolution {
        Some(resolution) => {
            let installed = index.locate(tool, &resolution.version).is_some();
            let state = if installed {
                String::new()
            } else {
                format!(" {}", "(not installed)".red())
            };
            println!("{tool} {}{state}", resolution.version);
            println!("   {}", resolution.source);
        }
        None => {
            println!("{tool} {}", "no version configured".yellow());
        }
    }
}

pub fn execute_current(runtime: &Runtime, tool: Option<&str>) -> Result<()> {
    let index = runtime.scan()?;
    let resolver = runtime.resolver(ProcessEnv);
    match tool {
        Some(tool) => {
            let tool = ToolName::new(tool)?;
            let resolution = resolver
                .resolve(&tool, &runtime.current_dir)?
                .ok_or_else(|| Error::NoVersionConfigured { tool: tool.to_string() })?;
            print_resolution(&tool, Some(&resolution), &index);
        }
        None => {
            let tools = index.tools();
            if tools.is_empty() {
                println!("No tools installed");
                return Ok(());
            }
            for (tool, resolution) in resolver.resolve_all(tools, &runtime.current_dir)? {
                print_resolution(&tool, resolution.as_ref(), &index);
            }
        }
    }
    Ok(())
}

pub fn execute_list(runtime: &Runtime, tool: Option<&str>) -> Result<()> {
    let index = runtime.scan()?;
    let tools: Vec<ToolName> = match tool {
        Some(tool) => vec![ToolName::new(tool)?],
        None => index.tools().into_iter().cloned().collect(),
    };
    if tools.is_empty() {
        println!("No tools installed");
        return Ok(());
    }
    for tool in &tools {
        let versions = index.versions(tool);
        if versions.is_empty() {
            println!("{tool}: {}", "not installed".yellow());
            continue;
        }
        println!("{tool}");
        for version in versions {
            println!("  {version}");
        }
    }
    Ok(())
}
