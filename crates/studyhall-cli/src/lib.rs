//! studyhall CLI: argument parsing, command handlers and output formatting.

pub mod cli;
pub mod output;
