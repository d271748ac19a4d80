//! CLI module for gridload - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
