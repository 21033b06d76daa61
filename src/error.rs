//! Error types for renderer setup

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::DeviceError;

/// Failures while creating or reconfiguring a [`crate::Renderer`]
///
/// Frame rendering itself never fails; see [`crate::pipeline`].
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type RendererResult<T> = Result<T, RendererError>;
