//! Command-line argument parsing for tutor-rag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tutor-rag - Textbook page retrieval for grounded tutoring feedback
#[derive(Parser, Debug)]
#[command(name = "tutor-rag")]
#[command(version)]
#[command(about = "Build a page embedding index and retrieve relevant textbook pages", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors and final output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed corpus pages into the persisted index, resuming where it stopped
    Build {
        /// Corpus JSON (defaults to paths.corpus)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Index file (defaults to paths.index)
        #[arg(long)]
        index: Option<PathBuf>,

        /// Also retry pages missing before the last indexed page
        #[arg(long)]
        fill_gaps: bool,
    },

    /// Show the pages most relevant to a query
    Query {
        /// Query text
        #[arg(value_name = "TEXT")]
        text: String,

        /// Number of pages to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Index file (defaults to paths.index)
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Generate feedback on a worked solution, grounded in retrieved pages
    Feedback {
        /// Question the learner is answering
        #[arg(long)]
        question: String,

        /// PNG image of the learner's attempt
        #[arg(long)]
        image: Option<PathBuf>,

        /// Index file (defaults to paths.index)
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Summarise the persisted index and its corpus coverage
    Stats {
        /// Corpus JSON (defaults to paths.corpus)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Index file (defaults to paths.index)
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log filter directive for this verbosity, or None to use the configured default
    pub fn log_level(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("debug"),
            Verbosity::VeryVerbose => Some("trace"),
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
