//! Error types for the command line tool.

use thiserror::Error;

/// Errors that can occur while running a `plyr` command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("PLY error: {0}")]
    Ply(#[from] plyr_data::PlyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No command configured")]
    NoCommand,
}
