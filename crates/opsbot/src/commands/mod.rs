//! Subcommand implementations.

pub mod check;
pub mod lookup;
pub mod shell;
