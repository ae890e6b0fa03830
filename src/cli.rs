use std::ffi::OsString;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
    #[command(subcommand)]
    pub(crate) command: AsdfwCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum AsdfwCommand {
    /// Creates a shim for every installed executable
    Reshim {
        /// Also remove shims whose executable is no longer installed
        #[clap(long)]
        cleanup: bool,
        /// Print the report as JSON
        #[clap(long)]
        json: bool,
    },
    /// Output the path of the executable a command would run here
    Which {
        command: String,
    },
    /// Sets the version of a tool in the global `.tool-versions`
    Global {
        tool: String,
        version: String,
    },
    /// Sets the version of a tool in `./.tool-versions`
    Local {
        tool: String,
        version: String,
    },
    /// Runs the configured version of a command, like its shim would
    Exec {
        command: String,
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
    /// Shows the resolved version of a tool and where it was set. Defaults to all installed tools
    Current {
        tool: Option<String>,
    },
    /// Lists installed versions. Defaults to all tools
    List {
        tool: Option<String>,
    },
}
