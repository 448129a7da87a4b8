//! CLI module for docmodel
//!
//! Provides command-line access to a configured container:
//! - get: point read by store id
//! - latest / versions: inspect a model's version chain
//! - update-ttl: set the TTL of every version
//! - list: cursor-paged listing of one partition value

mod args;
mod commands;
mod errors;
mod io;

pub use args::{ChainArgs, Cli, Command};
pub use commands::{execute, run, run_command, RawDocument};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
