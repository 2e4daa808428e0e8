//! Command-line surface of the `fuse-harness` binary.
//!
//! Configuration flags (see [`CONFIG_CLI_FLAGS`] and [`CONFIG_CLI_SWITCHES`])
//! must precede the subcommand and are handed to `ortho_config`; the
//! remaining tokens are parsed by clap.

use std::ffi::{OsStr, OsString};

use clap::{Parser, Subcommand};

/// Valued flags forwarded to the settings loader.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--home",
    "--manifest",
    "--start-command",
    "--status-command",
    "--stop-command",
    "--running-marker",
    "--instance-name",
    "--management-host",
    "--management-port",
    "--management-path",
    "--management-user",
    "--management-password",
    "--active-state",
    "--created-state",
    "--start-timeout-ms",
    "--management-timeout-ms",
    "--poll-interval-ms",
    "--shutdown-timeout-ms",
    "--log-filter",
    "--log-format",
];

/// Boolean settings flags; they never consume the next token.
pub(crate) const CONFIG_CLI_SWITCHES: &[&str] = &["--skip-admin-user"];

/// Starts, configures and verifies an application container.
#[derive(Parser, Debug)]
#[command(name = "fuse-harness", disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Starts the container, then installs and verifies the manifest's units.
    Start,
    /// Runs the container's stop command.
    Stop,
}

/// Arguments split between the settings loader and clap.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

/// Splits leading configuration flags from the subcommand tokens.
///
/// The program name is kept at the head of both halves.
pub(crate) fn split_arguments(args: &[OsString]) -> ArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut remaining = rest.iter().peekable();
    while let Some(argument) = remaining.peek() {
        let Some(needs_value) = config_flag(argument) else {
            break;
        };
        config_arguments.push((*argument).clone());
        remaining.next();
        if needs_value {
            if let Some(value) = remaining.next() {
                config_arguments.push(value.clone());
            }
        }
    }

    let mut command_arguments = vec![program.clone()];
    command_arguments.extend(remaining.cloned());
    ArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

/// Returns `Some(needs_value)` for a known configuration flag.
fn config_flag(argument: &OsStr) -> Option<bool> {
    let text = argument.to_string_lossy();
    if CONFIG_CLI_SWITCHES.contains(&&*text) {
        return Some(false);
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    CONFIG_CLI_FLAGS.contains(&flag).then_some(!inline_value)
}
