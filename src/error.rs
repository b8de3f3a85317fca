use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The host has nothing to draw on. Not recoverable.
    #[error("drawing surface unavailable: {0}")]
    MissingSurface(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
