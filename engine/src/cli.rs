//! CLI interface for the panel
//!
//! Defines the commands and global flags using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Panel interview engine
///
/// Runs a multi-interviewer panel against a local LLM. Interviewers decide
/// independently whether to follow up, and exactly one speaks at a time.
#[derive(Parser, Debug)]
#[command(name = "panel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an interactive interview on stdin
    Interview {
        /// Use the built-in scripted engine instead of the configured backend
        #[arg(long)]
        scripted: bool,

        /// Skip the opening introduction
        #[arg(long)]
        no_intro: bool,

        /// Disable voice output for the whole session
        #[arg(long)]
        mute: bool,
    },

    /// Answer once and print how each interviewer reacted
    Ask {
        /// The candidate's answer
        text: String,

        /// Use the built-in scripted engine instead of the configured backend
        #[arg(long)]
        scripted: bool,
    },

    /// List the configured interviewers
    Agents,

    /// Validate configuration and check the LLM backend
    Doctor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "panel",
            "ask",
            "I built a cache",
            "--scripted",
            "--json",
            "--log",
            "debug",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.log.as_deref(), Some("debug"));
        match cli.command {
            Command::Ask { text, scripted } => {
                assert_eq!(text, "I built a cache");
                assert!(scripted);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_interview_flags() {
        let cli = Cli::try_parse_from(["panel", "interview", "--no-intro", "--mute"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Interview {
                scripted: false,
                no_intro: true,
                mute: true
            }
        ));
    }
}
