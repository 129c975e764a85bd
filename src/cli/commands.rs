//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - rules: load and list the rule set
//! - validate: score one candidate definition
//! - generate: run the loop for one term
//! - batch: run many requests concurrently

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use definitor::rules::TermCategory;

/// Definitor - generate definitions that pass a rule set
#[derive(Parser, Debug)]
#[command(name = "definitor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Rule directory or file, overrides the config
    #[arg(short, long, global = true)]
    pub rules: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the rule set and list its rules
    Rules {
        /// Rule directory or file to list, overrides --rules and the config
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Show only rules applicable to this term category
        #[arg(short = 't', long)]
        category: Option<TermCategory>,
    },

    /// Validate a candidate definition
    Validate {
        /// Candidate text
        text: String,

        /// Term category (process, type, result, instance)
        #[arg(short = 't', long)]
        category: TermCategory,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a definition for a term
    Generate {
        /// Term to define
        term: String,

        /// Term category (process, type, result, instance)
        #[arg(short = 't', long)]
        category: TermCategory,

        /// Domain context for the term
        #[arg(short = 'x', long, default_value = "")]
        context: String,

        /// Override the configured iteration budget
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every request in a YAML file concurrently
    Batch {
        /// YAML list of {term, context, category}
        file: PathBuf,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
}
