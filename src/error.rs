use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main library error type.
#[derive(Error, Debug)]
pub enum StyleError {
    /// Invalid construction or run parameter.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tensor or layer parameter shape mismatch.
    #[error("invalid shape: {0}")]
    Shape(String),

    /// A required input file does not exist.
    #[error("missing file: {}", .0.display())]
    MissingFile(PathBuf),

    /// The generated image stopped being finite.
    #[error("optimization diverged at epoch {epoch}")]
    Diverged { epoch: usize },

    /// Nothing to encode.
    #[error("no frames selected from {0}")]
    NoFrames(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Image decoding or encoding error.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Errors returned by libtorch.
    #[error(transparent)]
    Torch(#[from] tch::TchError),

    /// Video decoding error.
    #[cfg(feature = "opencv")]
    #[error(transparent)]
    Video(#[from] opencv::Error),
}

impl StyleError {
    pub fn shape_context(&self, layer: usize) -> Self {
        match self {
            StyleError::Shape(error) => StyleError::Shape(format!("layer {layer}: {error}")),
            StyleError::Config(error) => StyleError::Config(format!("layer {layer}: {error}")),
            other => StyleError::Config(format!("layer {layer}: {other}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, StyleError>;
