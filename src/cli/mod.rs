//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.
//!
//! Parameters declared by the build description are only known after the
//! document is loaded. [`Cli::parse_args`] sets aside every long option clap
//! does not know, together with its value, and [`params`] turns those into
//! selections.

pub mod commands;
pub mod output;
pub mod params;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser};

use crate::config::defaults::GRAPH_FILENAME;
use output::OutputConfig;

/// Kiln - build graph generator for multi-image embedded builds
///
/// Resolves a parameterized build description and writes the build graph
/// for the external executor.
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "Parameters of the build description are selected with --PARAM VALUE or --PARAM=VALUE; see --help-config."
)]
pub struct Cli {
    /// Build description (YAML or TOML)
    #[arg(value_name = "build.yaml")]
    pub conf: PathBuf,

    /// Show the parameters of the build description and exit
    #[arg(long)]
    pub help_config: bool,

    /// Print the processed build description
    #[arg(long)]
    pub dump: bool,

    /// Graph file to write
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Write the fetch depfile of one component instead of the graph
    #[arg(long, value_name = "COMPONENT", hide = true)]
    pub fetcherdep: Option<String>,

    /// Parameter selection words, set aside before clap parsing
    #[arg(skip)]
    pub params: Vec<String>,
}

impl Cli {
    /// Parse the process arguments
    pub fn parse_args() -> Self {
        let (known, params) = params::split_args(&Self::command(), std::env::args());
        let mut cli = Self::parse_from(known);
        cli.params = params;
        cli
    }

    /// Parse an argument list, reporting errors instead of exiting
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let (known, params) = params::split_args(&Self::command(), args.into_iter().map(Into::into));
        let mut cli = Self::try_parse_from(known)?;
        cli.params = params;
        Ok(cli)
    }

    /// Graph file, defaulting to `build.graph.json`
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(GRAPH_FILENAME))
    }

    /// Verbosity settings
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig::new(self.quiet, self.verbose)
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        if self.help_config {
            return commands::help_config::execute(&self.conf);
        }

        let selections = params::parse_selections(&self.params)?;
        let output = self.output_path();
        let out = self.output_config();
        match &self.fetcherdep {
            Some(component) => {
                let dir = output
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                commands::fetcher_dep::execute(&self.conf, &selections, component, dir, out)
            }
            None => commands::generate::execute(&self.conf, &selections, &output, self.dump, out),
        }
    }
}
