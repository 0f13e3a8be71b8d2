// src/config/mod.rs

//! Application manifest loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk or any [`FileSystem`](crate::fs::FileSystem) (`loader.rs`).
//! - Validate definitions, trait stages and engine settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str, load_with_fs};
pub use model::{
    ApplicationSection, ComponentConfig, ComponentDefinition, ConfigFile, ConfigSection,
    EngineSettings, RawConfigFile, TraitConfig, TraitDefinition, DEFAULT_CLUSTER,
    MAX_TICK_INTERVAL,
};
