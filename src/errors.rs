// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only failures that stop the process (bad manifest, unreadable files) use
//! [`DispatchError`]. Expression and template failures have their own local
//! types and end up as status messages instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DispatchError>;
