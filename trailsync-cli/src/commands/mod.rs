//! CLI subcommands.

pub mod common;
pub mod config;
pub mod distance;
pub mod locate;
pub mod replay;
