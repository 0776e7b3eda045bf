//! CLI command implementations.

pub mod download;
pub mod fetch;
pub mod mux;
pub mod qualities;

use std::path::PathBuf;

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub verbose: bool,
}
