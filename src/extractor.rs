//! Forward-only VGG feature extractor with frozen, transplanted weights.
use tch::nn::{Module, VarStore};
use tch::{Device, Kind, Tensor};
use tracing::{debug, info};

use crate::config::BackboneConfig;
use crate::error::{Result, StyleError};
use crate::nn::Layer;
use crate::transplant::{Transplant, WeightSource};
use crate::vision::ssd::SsdBackbone;
use crate::vision::vgg;

/// Spatial resolution expected by the extractor, inputs are `(1, 300, 300, 3)`.
pub const INPUT_SIZE: i64 = 300;

/// Number of style taps, the activations entering layers 1 to 6.
pub const STYLE_TAPS: usize = 6;

/// Activations captured for one input image, all laid out as `(1, H, W, C)`.
#[derive(Debug)]
pub struct Activations {
    pub style: Vec<Tensor>,
    pub content: Tensor,
}

/// Builds a [`FeatureExtractor`] by transplanting weights into a fresh
/// VGG-16 stage 5 topology.
#[derive(Debug, Clone, Default)]
pub struct ExtractorBuilder {
    cfg: BackboneConfig,
}

impl ExtractorBuilder {
    pub fn new(cfg: BackboneConfig) -> ExtractorBuilder {
        ExtractorBuilder { cfg }
    }

    /// Builds the SSD300 backbone described by the configuration, copies its
    /// weights and drops it.
    pub fn build(self) -> Result<FeatureExtractor> {
        let backbone = SsdBackbone::new(&self.cfg)?;
        debug!(n_classes = backbone.n_classes(), "ssd300 backbone built");
        self.transplant_from(&backbone)
    }

    /// Copies the weights of `source` into the extractor and freezes them.
    ///
    /// Every layer shape is checked before any weight gets copied.
    pub fn transplant_from<S: WeightSource + ?Sized>(self, source: &S) -> Result<FeatureExtractor> {
        let cfg = self.cfg;
        let kind = cfg.precision.kind();
        let mut vs = VarStore::new(cfg.device);
        let mut layers = vgg::vgg16_until_stage5(&vs.root(), cfg.stage_channels);
        if layers.len() <= STYLE_TAPS + 2 {
            return Err(StyleError::Config(format!(
                "the extractor needs more than {} layers, got {}",
                STYLE_TAPS + 2,
                layers.len()
            )));
        }
        vs.set_kind(kind);
        let plan = Transplant::check(source, &layers)?;
        debug!(layers = plan.len(), "layer shapes match the weight source");
        plan.apply(&mut layers)?;
        vs.freeze();
        info!(layers = layers.len(), ?kind, "feature extractor ready");
        Ok(FeatureExtractor { layers, kind, device: cfg.device, _vs: vs })
    }
}

#[derive(Debug)]
pub struct FeatureExtractor {
    layers: Vec<Layer>,
    kind: Kind,
    device: Device,
    _vs: VarStore,
}

impl FeatureExtractor {
    pub fn builder(cfg: BackboneConfig) -> ExtractorBuilder {
        ExtractorBuilder::new(cfg)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Index of the layer whose input is the content activation.
    pub fn content_tap(&self) -> usize {
        self.layers.len() - 2
    }

    /// Runs the frozen network on an image with values in `[0, 255]`.
    ///
    /// Gradients only flow back to `image`, the weights never require them.
    pub fn activations(&self, image: &Tensor) -> Result<Activations> {
        let size = image.size();
        if size != [1, INPUT_SIZE, INPUT_SIZE, 3] {
            return Err(StyleError::Shape(format!(
                "expected a (1, {INPUT_SIZE}, {INPUT_SIZE}, 3) image, got {size:?}"
            )));
        }
        let xs = image.to_device(self.device).to_kind(self.kind) / 255.0;
        let mut xs = xs.permute([0, 3, 1, 2]);
        let mut style = Vec::with_capacity(STYLE_TAPS);
        for (index, layer) in self.layers[..self.content_tap()].iter().enumerate() {
            if (1..=STYLE_TAPS).contains(&index) {
                style.push(xs.permute([0, 2, 3, 1]));
            }
            xs = layer.forward(&xs);
        }
        Ok(Activations { style, content: xs.permute([0, 2, 3, 1]) })
    }
}
