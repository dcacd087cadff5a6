//! Router configuration generation.
//!
//! Materializes per-router configuration directories from the shared
//! template, substituting node identity into the destination path and
//! the hostname declarations.

pub mod generator;
pub mod template;

use std::path::PathBuf;

// Re-export key types and functions for easier access
pub use generator::{config_dir, config_root, generate, GeneratedConfig};
pub use template::{ConfigTemplate, HOSTNAME_FILES, HOSTNAME_PLACEHOLDER};

/// Errors raised while generating router configuration.
///
/// `Io` is fatal for the router it occurred on but must not abort
/// provisioning of sibling routers. `MissingHostname` is a latent
/// template/placeholder mismatch: the file is written unchanged and the
/// error is surfaced as a warning on the [`GeneratedConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O failure at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no 'hostname {placeholder}' line in '{path}'")]
    MissingHostname { path: PathBuf, placeholder: String },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}
