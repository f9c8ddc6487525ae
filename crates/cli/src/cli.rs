use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Watch saved Pittsburgh addresses for new property violations.
///
/// Runs a daily check against the WPRDC violation dataset and emails a
/// report of anything not seen before.
#[derive(Parser, Debug)]
#[command(name = "vwatch", version, about = "Pittsburgh property-violation watcher")]
pub struct CliArgs {
    /// Config profile; keys are read as {PROFILE}_{KEY} before {KEY}
    #[arg(long, global = true, env = "VWATCH_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restore the daily schedule and keep running until Ctrl-C
    Run,
    /// Check saved addresses now; does not change the schedule
    Check,
    /// Turn daily checks on and schedule the next one
    Enable,
    /// Turn daily checks off
    Disable,
    /// Show settings, next check and saved address count
    Status,
    /// Restore default settings and forget reported violations
    Reset {
        /// Also delete every saved address
        #[arg(long)]
        addresses: bool,
    },
    /// Look up violations for one or more addresses (no diffing, no email)
    Search {
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Manage saved addresses
    #[command(subcommand)]
    Addresses(AddressCommand),
    /// Manage email reports
    #[command(subcommand)]
    Email(EmailCommand),
}

#[derive(Subcommand, Debug)]
pub enum AddressCommand {
    /// List saved addresses
    List,
    /// Save one or more addresses
    Add {
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Remove one or more saved addresses
    Remove {
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Save every address in a file (one per line, `#` comments allowed)
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum EmailCommand {
    /// Set the report recipient
    Set { address: String },
    /// Send a report after every check
    On,
    /// Stop sending reports
    Off,
    /// Send a test message
    Test {
        /// Recipient; defaults to the configured report address
        #[arg(long)]
        to: Option<String>,
    },
}

impl Command {
    /// Long-running commands log at info; one-shot commands stay quiet.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Command::Run => "info",
            _ => "warn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_nested_subcommands() {
        let args = CliArgs::try_parse_from(["vwatch", "addresses", "add", "1 Main St", "2 Elm St"]).unwrap();
        match args.command {
            Command::Addresses(AddressCommand::Add { addresses }) => {
                assert_eq!(addresses, vec!["1 Main St", "2 Elm St"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = CliArgs::try_parse_from(["vwatch", "email", "test", "--to", "me@example.com"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Email(EmailCommand::Test { to: Some(ref t) }) if t == "me@example.com"
        ));
    }

    #[test]
    fn search_requires_an_address() {
        assert!(CliArgs::try_parse_from(["vwatch", "search"]).is_err());
    }

    #[test]
    fn run_logs_at_info() {
        let args = CliArgs::try_parse_from(["vwatch", "run"]).unwrap();
        assert_eq!(args.command.default_log_level(), "info");
        let args = CliArgs::try_parse_from(["vwatch", "status"]).unwrap();
        assert_eq!(args.command.default_log_level(), "warn");
    }
}
