//! CLI argument definitions for reqpin.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "reqpin",
    version,
    about = "Resolve Python requirements into a pinned, annotated solution",
    long_about = "reqpin resolves requirements files against local source trees, \
                  PyPI-compatible indexes and previous solutions, and writes every \
                  pinned package together with the packages that required it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve requirements files into a solution
    Compile {
        /// Requirements files (`-` reads stdin); defaults to requirements.in
        inputs: Vec<PathBuf>,
        /// Constraint files: limit versions without adding packages
        #[arg(short, long = "constraint")]
        constraints: Vec<PathBuf>,
        /// Previous solution whose pins are reused where possible
        #[arg(short, long)]
        solution: Option<PathBuf>,
        /// Resolve these packages again instead of reusing their pins
        #[arg(short = 'P', long = "upgrade-package")]
        upgrade: Vec<String>,
        /// Local source tree to search for projects
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
        /// Base URL of the package index
        #[arg(long, env = "REQPIN_INDEX_URL")]
        index_url: Option<String>,
        /// Additional index consulted after the primary one
        #[arg(long = "extra-index-url")]
        extra_index_urls: Vec<String>,
        /// Never contact a package index
        #[arg(long, visible_alias = "no-index")]
        offline: bool,
        /// Allow pre-release versions
        #[arg(long)]
        pre: bool,
        /// Target Python version for marker evaluation (e.g. 3.11)
        #[arg(long)]
        python_version: Option<String>,
        /// Extra to request for every project found in a source tree
        #[arg(long = "extra")]
        extras: Vec<String>,
        /// Write the solution to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show which requirements pulled a package into a solution
    Why {
        /// Package name
        package: String,
        /// Solution file to inspect
        #[arg(short, long, default_value = "requirements.txt")]
        solution: PathBuf,
    },
}

/// Parse command-line arguments.
pub fn parse() -> Cli {
    Cli::parse()
}
