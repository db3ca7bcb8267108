//! Frozen convolution layers and the optimizers driving the generated image.
pub mod layer;
pub use layer::{Layer, LayerSpec};

pub mod optimizer;
pub use optimizer::{Adam, ImageOptimizer, Sgd};
