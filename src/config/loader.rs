// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::FileSystem;

/// Load a manifest from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** check that
/// definitions exist or that stages are used correctly. Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a manifest from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks definitions, trait stages and engine settings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Parse and validate manifest text that was already read.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw)
}

/// Like [`load_and_validate`], but reads through a [`FileSystem`].
///
/// Returns the manifest text alongside the parsed config so callers can
/// fingerprint exactly what was loaded.
pub fn load_with_fs(fs: &dyn FileSystem, path: &Path) -> Result<(ConfigFile, String)> {
    let contents = fs.read_to_string(path)?;
    let config = load_from_str(&contents)?;
    Ok((config, contents))
}

/// Default manifest location: `vela.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("vela.toml")
}
