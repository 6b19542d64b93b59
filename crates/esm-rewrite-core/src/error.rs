use std::path::PathBuf;
use thiserror::Error;

/// Hard errors raised while setting up the rewrite stage.
///
/// The stage never returns these; its failures degrade to warnings.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid stylesheet extension pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}
