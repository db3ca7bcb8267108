//! Neural style transfer with a VGG-16 feature extractor whose weights are
//! taken from the backbone of an SSD300 object detector.
//!
//! A [`FeatureExtractor`] is built once by transplanting and freezing the
//! backbone weights. Each run then optimizes a copy of the content image so
//! that the Gram matrices of its early activations match the ones of the
//! style image.
pub mod config;
pub use config::{BackboneConfig, Divergence, LossWeights, Precision, RunConfig};

mod error;
pub use error::{Result, StyleError};

pub mod nn;

pub mod vision;

pub mod transplant;

pub mod extractor;
pub use extractor::{ExtractorBuilder, FeatureExtractor};

pub mod stats;

pub mod loss;

pub mod optimize;
pub use optimize::{RunState, StyleRun, Stylized};

pub mod overlay;

pub mod driver;
pub use driver::{FrameRange, ImageJob, StyleTransfer, VideoJob};
