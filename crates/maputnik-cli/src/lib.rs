#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod util;

pub use cli::{run, run_from_env};
pub use error::{CliError, Result};
