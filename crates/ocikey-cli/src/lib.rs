//! Command-line surface for the `ocikey` binary.
//!
//! Holds the clap argument model, credential-path validation, tracing setup
//! and the dispatch that turns parsed flags into a provisioning run.

pub mod bootstrap;
pub mod cli_args;
pub mod cli_types;
pub mod runtime;
pub mod validation;

pub use bootstrap::init_tracing;
pub use cli_args::Cli;
pub use cli_types::*;
pub use runtime::{run_cli, EXIT_FAILURE, EXIT_SUCCESS};
pub use validation::*;
