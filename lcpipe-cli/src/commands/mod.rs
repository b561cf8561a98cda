//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! - [`run`] - Run an extraction job against a tile directory
//! - [`status`] - Read-only progress monitor over the checkpoint documents

pub mod run;
pub mod status;
