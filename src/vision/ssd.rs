//! The VGG-16 backbone of an SSD300 detector, used as a weight source.
//!
//! Only the convolutional backbone is materialized, split in the two
//! sequential sub-stacks the detector reads its feature maps from. The
//! detection heads are not built: a weight file holding a complete detector
//! can still be loaded as its extra entries are ignored. Variables are named
//! `base.<i>.weight`, `base.<i>.bias`, `extra.<i>.weight`, `extra.<i>.bias`.
use tch::nn::{self, VarStore};
use tch::Tensor;
use tracing::info;

use crate::config::BackboneConfig;
use crate::error::{Result, StyleError};
use crate::nn::{layer, Layer, LayerSpec};
use crate::transplant::{StackId, WeightSource};

/// Layer descriptors of the two SSD300 backbone sub-stacks.
pub fn ssd300_stacks(stage_channels: [i64; 5], fc_channels: i64) -> [Vec<LayerSpec>; 2] {
    let [c1, c2, c3, c4, c5] = stage_channels;
    let conv3 = LayerSpec::conv3;
    // pool3 rounds up so that conv4_3 yields 38x38 maps for a 300x300 input.
    let pool3 = LayerSpec::MaxPool { ksize: 2, stride: 2, padding: 0, ceil_mode: true };
    let base = vec![
        conv3(c1),
        conv3(c1),
        LayerSpec::pool2(),
        conv3(c2),
        conv3(c2),
        LayerSpec::pool2(),
        conv3(c3),
        conv3(c3),
        conv3(c3),
        pool3,
        conv3(c4),
        conv3(c4),
        conv3(c4),
    ];
    let extra = vec![
        LayerSpec::pool2(),
        conv3(c5),
        conv3(c5),
        conv3(c5),
        LayerSpec::MaxPool { ksize: 3, stride: 1, padding: 1, ceil_mode: false },
        LayerSpec::Conv { out_channels: fc_channels, ksize: 3, stride: 1, padding: 6, dilation: 6 },
        LayerSpec::Conv { out_channels: fc_channels, ksize: 1, stride: 1, padding: 0, dilation: 1 },
    ];
    [base, extra]
}

#[derive(Debug)]
pub struct SsdBackbone {
    base: Vec<Layer>,
    extra: Vec<Layer>,
    n_classes: i64,
    // Owns the parameters referenced by the layers.
    _vs: VarStore,
}

impl SsdBackbone {
    /// Builds the backbone and loads the configured weight file, if any.
    pub fn new(cfg: &BackboneConfig) -> Result<SsdBackbone> {
        cfg.validate()?;
        let mut vs = VarStore::new(cfg.device);
        let [base, extra] = ssd300_vgg(&vs.root(), cfg.stage_channels, cfg.fc_channels);
        vs.set_kind(cfg.precision.kind());
        match &cfg.weights {
            Some(weights) => {
                vs.load(weights)?;
                info!(path = %weights.display(), "loaded ssd300 backbone weights");
            }
            None => info!("no backbone weights given, keeping random initialization"),
        }
        Ok(SsdBackbone { base, extra, n_classes: cfg.n_classes, _vs: vs })
    }

    pub fn n_classes(&self) -> i64 {
        self.n_classes
    }

    fn stack(&self, stack: StackId) -> &[Layer] {
        match stack {
            StackId::Base => &self.base,
            StackId::Extra => &self.extra,
        }
    }
}

impl WeightSource for SsdBackbone {
    fn stack_len(&self, stack: StackId) -> usize {
        self.stack(stack).len()
    }

    fn layer_params(&self, stack: StackId, layer: usize) -> Result<Vec<Tensor>> {
        let layers = self.stack(stack);
        let layer = layers.get(layer).ok_or_else(|| {
            StyleError::Config(format!("no layer {layer} in {stack:?}, it has {}", layers.len()))
        })?;
        Ok(layer.params().into_iter().map(|t| t.shallow_clone()).collect())
    }
}

/// A weight source built from in-memory layers, mainly handy to feed
/// hand-made parameters to a transplant.
#[derive(Debug)]
pub struct LayerStacks {
    pub base: Vec<Vec<Tensor>>,
    pub extra: Vec<Vec<Tensor>>,
}

impl WeightSource for LayerStacks {
    fn stack_len(&self, stack: StackId) -> usize {
        match stack {
            StackId::Base => self.base.len(),
            StackId::Extra => self.extra.len(),
        }
    }

    fn layer_params(&self, stack: StackId, layer: usize) -> Result<Vec<Tensor>> {
        let layers = match stack {
            StackId::Base => &self.base,
            StackId::Extra => &self.extra,
        };
        layers
            .get(layer)
            .map(|params| params.iter().map(|t| t.shallow_clone()).collect())
            .ok_or_else(|| StyleError::Config(format!("no layer {layer} in {stack:?}")))
    }
}

pub fn ssd300_vgg(p: &nn::Path, stage_channels: [i64; 5], fc_channels: i64) -> [Vec<Layer>; 2] {
    let [base_specs, extra_specs] = ssd300_stacks(stage_channels, fc_channels);
    let c_base = base_specs.iter().fold(3, |c, spec| spec.out_channels(c));
    let base = layer::build(&(p / "base"), &base_specs, 3);
    let extra = layer::build(&(p / "extra"), &extra_specs, c_base);
    [base, extra]
}
