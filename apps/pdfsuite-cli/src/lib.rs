//! Command line front end for pdfsuite-core
//!
//! Reads PDFs from disk, runs one core command and writes the results to
//! the configured output directory.

pub mod cli;
pub mod config;

pub use cli::{run, write_bundle, Cli, Command};
pub use config::{CliConfig, FileFontSource};
