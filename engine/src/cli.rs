//! CLI interface for Exa
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Exa scheduling assistant
///
/// Routes each request to planning, research or a tool-using loop over your
/// calendar, reminders and email.
#[derive(Parser, Debug)]
#[command(name = "exa")]
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
    /// Start an interactive session (type 'exit' or 'quit' to leave)
    Chat,

    /// Answer a single request and exit
    Run {
        /// The request, e.g. "add lunch with Sam tomorrow at noon"
        query: String,
    },

    /// Check configuration, data directory and provider availability
    Doctor,

    /// Serve the chat endpoint over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000", value_name = "ADDR")]
        bind: String,
    },
}
