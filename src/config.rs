//! Construction and run parameters.
use std::convert::TryFrom;
use std::path::PathBuf;

use tch::{Device, Kind};

use crate::error::StyleError;

/// Floating point precision of the feature extractor weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    F32,
    F16,
}

impl Precision {
    pub fn kind(self) -> Kind {
        match self {
            Precision::F32 => Kind::Float,
            Precision::F16 => Kind::Half,
        }
    }
}

impl TryFrom<u32> for Precision {
    type Error = StyleError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            32 => Ok(Precision::F32),
            16 => Ok(Precision::F16),
            other => Err(StyleError::Config(format!(
                "float type should be either 32 or 16, got {other}"
            ))),
        }
    }
}

/// VGG-16 channel widths for each of the five convolution stages.
pub const VGG16_STAGE_CHANNELS: [i64; 5] = [64, 128, 256, 512, 512];

/// Parameters used to build the SSD300 backbone and the feature extractor.
#[derive(Debug, Clone)]
pub struct BackboneConfig {
    /// Pre-trained backbone weights (`.ot` or `.safetensors`). Random
    /// initialization is kept when unset.
    pub weights: Option<PathBuf>,
    /// Number of detector classes, only checked for consistency.
    pub n_classes: i64,
    pub precision: Precision,
    /// Output channels of the five VGG stages, shared by both topologies.
    pub stage_channels: [i64; 5],
    /// Width of the dilated `conv6`/`conv7` layers closing the backbone.
    pub fc_channels: i64,
    pub device: Device,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        BackboneConfig {
            weights: None,
            n_classes: 21,
            precision: Precision::F32,
            stage_channels: VGG16_STAGE_CHANNELS,
            fc_channels: 1024,
            device: Device::Cpu,
        }
    }
}

impl BackboneConfig {
    pub fn validate(&self) -> Result<(), StyleError> {
        if self.n_classes < 1 {
            return Err(StyleError::Config(format!(
                "number of classes must be positive, got {}",
                self.n_classes
            )));
        }
        if let Some(c) = self.stage_channels.iter().chain([&self.fc_channels]).find(|&&c| c < 1) {
            return Err(StyleError::Config(format!("invalid channel count {c}")));
        }
        if let Some(weights) = &self.weights {
            if !weights.is_file() {
                return Err(StyleError::MissingFile(weights.clone()));
            }
        }
        Ok(())
    }
}

/// Relative weights of the two loss terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossWeights {
    pub style: f64,
    pub content: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        LossWeights { style: 1.0, content: 1e-30 }
    }
}

/// What to do when the generated image stops being finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Divergence {
    /// Keep iterating, the clamp still runs on the degenerate image.
    #[default]
    Ignore,
    /// Abort the run with [`StyleError::Diverged`].
    Fail,
}

/// Parameters for a single optimization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    pub epochs: usize,
    pub weights: LossWeights,
    pub divergence: Divergence,
    /// Display an epoch progress bar on stderr.
    pub progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            epochs: 1,
            weights: LossWeights::default(),
            divergence: Divergence::Ignore,
            progress: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_selector() {
        assert_eq!(Precision::try_from(32).unwrap(), Precision::F32);
        assert_eq!(Precision::try_from(16).unwrap(), Precision::F16);
        assert!(matches!(Precision::try_from(64), Err(StyleError::Config(_))));
        assert_eq!(Precision::F16.kind(), Kind::Half);
    }

    #[test]
    fn missing_weights_file() {
        let cfg = BackboneConfig {
            weights: Some(PathBuf::from("/nonexistent/ssd300.ot")),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(StyleError::MissingFile(_))));
        let cfg = BackboneConfig { n_classes: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(StyleError::Config(_))));
        assert!(BackboneConfig::default().validate().is_ok());
    }
}
