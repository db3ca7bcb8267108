//! Layer descriptors and the frozen convolution/pooling layers built from them.
use tch::{nn, nn::Module, Tensor};

/// Static description of one layer of a convolutional stack.
///
/// Convolutions always carry a ReLU activation, matching the VGG family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSpec {
    Conv { out_channels: i64, ksize: i64, stride: i64, padding: i64, dilation: i64 },
    MaxPool { ksize: i64, stride: i64, padding: i64, ceil_mode: bool },
}

impl LayerSpec {
    /// A 3x3 same-padding convolution.
    pub fn conv3(out_channels: i64) -> LayerSpec {
        LayerSpec::Conv { out_channels, ksize: 3, stride: 1, padding: 1, dilation: 1 }
    }

    /// A 2x2 max-pool halving the spatial resolution.
    pub fn pool2() -> LayerSpec {
        LayerSpec::MaxPool { ksize: 2, stride: 2, padding: 0, ceil_mode: false }
    }

    /// Number of channels produced given `c_in` input channels.
    pub fn out_channels(&self, c_in: i64) -> i64 {
        match *self {
            LayerSpec::Conv { out_channels, .. } => out_channels,
            LayerSpec::MaxPool { .. } => c_in,
        }
    }
}

#[derive(Debug)]
pub enum Layer {
    Conv(nn::Conv2D),
    MaxPool { ksize: i64, stride: i64, padding: i64, ceil_mode: bool },
}

impl Layer {
    fn new(p: nn::Path, spec: LayerSpec, c_in: i64) -> Layer {
        match spec {
            LayerSpec::Conv { out_channels, ksize, stride, padding, dilation } => {
                let cfg = nn::ConvConfig { stride, padding, dilation, ..Default::default() };
                Layer::Conv(nn::conv2d(p, c_in, out_channels, ksize, cfg))
            }
            LayerSpec::MaxPool { ksize, stride, padding, ceil_mode } => {
                Layer::MaxPool { ksize, stride, padding, ceil_mode }
            }
        }
    }

    /// The layer parameters, kernel first then bias. Empty for pooling layers.
    pub fn params(&self) -> Vec<&Tensor> {
        match self {
            Layer::Conv(conv) => std::iter::once(&conv.ws).chain(conv.bs.as_ref()).collect(),
            Layer::MaxPool { .. } => vec![],
        }
    }

    pub fn params_mut(&mut self) -> Vec<&mut Tensor> {
        match self {
            Layer::Conv(conv) => std::iter::once(&mut conv.ws).chain(conv.bs.as_mut()).collect(),
            Layer::MaxPool { .. } => vec![],
        }
    }

    pub fn param_shapes(&self) -> Vec<Vec<i64>> {
        self.params().iter().map(|t| t.size()).collect()
    }
}

impl Module for Layer {
    fn forward(&self, xs: &Tensor) -> Tensor {
        match self {
            Layer::Conv(conv) => xs.apply(conv).relu(),
            Layer::MaxPool { ksize, stride, padding, ceil_mode } => xs.max_pool2d(
                [*ksize, *ksize],
                [*stride, *stride],
                [*padding, *padding],
                [1, 1],
                *ceil_mode,
            ),
        }
    }
}

/// Builds the layers described by `specs`, registering the convolution
/// parameters under `p / <index>`.
pub fn build(p: &nn::Path, specs: &[LayerSpec], c_in: i64) -> Vec<Layer> {
    let mut c_in = c_in;
    let mut layers = Vec::with_capacity(specs.len());
    for (index, &spec) in specs.iter().enumerate() {
        layers.push(Layer::new(p / index.to_string(), spec, c_in));
        c_in = spec.out_channels(c_in);
    }
    layers
}
