//! Subcommand implementations

pub mod inspect;
pub mod predict;
pub mod query;
pub mod train;
