//! CLI command implementations

pub mod error;
pub mod scan;

pub use error::CliError;
pub use scan::{Cli, Commands, OutputFormat, ScanArgs, StatusArgs};
