//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wxcache - cached weather forecasts from the command line.
#[derive(Debug, Parser)]
#[command(name = "wxcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides the default location)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the forecast for a city, or for the current location
    Show {
        /// City name, e.g. "London" or "London,GB"
        query: Option<String>,

        /// Download even if the stored forecast is recent
        #[arg(short, long)]
        refresh: bool,
    },

    /// Change the unit system and refresh the current location
    Units {
        /// "metric" or "imperial"
        value: String,
    },

    /// Delete stored forecasts and forget the current location
    Clear,
}
