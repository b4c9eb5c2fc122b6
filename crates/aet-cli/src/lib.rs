//! Aerobic threshold analyzer CLI library.
//!
//! This crate provides the CLI interface for drift and zone analysis.

mod cli;
pub mod commands;
mod config;
pub mod output;
pub mod summary;

pub use cli::{Cli, Commands, OutputArgs, OutputFormat};
pub use config::{Config, load_config};
