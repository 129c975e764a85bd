//! CLI module for definitor - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
