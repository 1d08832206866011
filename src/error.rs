// Run-level error taxonomy. Per-number failures never surface here: the
// controller turns them into report rows. Only the variants below are
// allowed to end a run early.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegrabError {
    #[error("Missing environment variables: {}. Please check your .env file.", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),

    #[error("Invalid value for {name}: {reason}")]
    InvalidConfiguration { name: &'static str, reason: String },

    #[error("No phone numbers provided.")]
    NoNumbers,

    #[error("Could not read phone numbers from {}: {source}", path.display())]
    InputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),
}

pub type Result<T> = std::result::Result<T, TelegrabError>;
