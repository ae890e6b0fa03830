mod cli;
mod execute;

use std::ffi::OsStr;
use clap::Parser;
use colored::Colorize;
use asdfw::dispatch::command_name;
use asdfw::logging;
use crate::cli::CLI;

const BIN_NAME: &str = env!("CARGO_BIN_NAME");

/// A binary started under any other name than its own is a shim.
fn is_shim(invoked_name: &OsStr) -> bool {
    command_name(invoked_name).is_ok_and(|name| name != BIN_NAME)
}

/// Prints the error with the causes its message doesn't already spell out,
/// and picks the exit code of its kind.
fn report(err: &anyhow::Error) -> i32 {
    let mut message = err.to_string();
    for cause in err.chain().skip(1) {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
    }
    eprintln!("{} {message}", "error:".red().bold());
    err.chain()
        .find_map(|cause| cause.downcast_ref::<asdfw::Error>())
        .map(asdfw::Error::exit_code)
        .unwrap_or(1)
}

fn main() {
    let mut args = std::env::args_os();
    let invoked_name = args.next().unwrap_or_default();

    let result = if is_shim(&invoked_name) {
        execute::run_shim(invoked_name, args.collect())
    } else {
        let cli = CLI::parse();
        logging::init_cli(cli.verbose);
        execute::execute(cli)
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => report(&err),
    };
    std::process::exit(code);
}
