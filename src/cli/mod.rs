//! Command-line interface.
//!
//! Parses arguments, layers CLI overrides over the loaded settings and
//! dispatches to the command modules.

mod commands;

pub use commands::{is_verbose, run};
