//! VGG-16 feature stack truncated after its fifth stage.
//!
//! The layer order mirrors the VGG-16 feature extractor: each stage contains
//! multiple 3x3 convolutions followed by a single max-pool layer. There is no
//! classifier head, the network is only used to produce activations.
use crate::nn::{layer, Layer, LayerSpec};
use tch::nn;

// Number of convolutions in each of the five stages.
const STAGE_DEPTHS: [usize; 5] = [2, 2, 3, 3, 3];

/// Layer descriptors for VGG-16 up to and including the stage 5 max-pool.
///
/// With the default widths this yields 18 layers: `conv1_1`, `conv1_2`,
/// `pool1`, ..., `conv5_3`, `pool5`.
pub fn until_stage5(stage_channels: [i64; 5]) -> Vec<LayerSpec> {
    let mut specs = vec![];
    for (&depth, &channels) in STAGE_DEPTHS.iter().zip(stage_channels.iter()) {
        specs.extend(std::iter::repeat(LayerSpec::conv3(channels)).take(depth));
        specs.push(LayerSpec::pool2());
    }
    specs
}

pub fn vgg16_until_stage5(p: &nn::Path, stage_channels: [i64; 5]) -> Vec<Layer> {
    layer::build(&(p / "features"), &until_stage5(stage_channels), 3)
}
