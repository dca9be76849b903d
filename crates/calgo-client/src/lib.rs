//! The `calgo` command-line interface: argument parsing, configuration
//! layering, commands and output rendering.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
