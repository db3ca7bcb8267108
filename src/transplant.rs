//! Copies pre-trained convolution weights from a detector backbone into the
//! feature extractor topology.
//!
//! The transplant happens in two phases. [`Transplant::check`] resolves every
//! target layer to its source layer and compares parameter shapes, failing
//! before anything is written. [`Transplant::apply`] then copies the values.
use tch::{no_grad, Tensor};

use crate::error::{Result, StyleError};
use crate::nn::Layer;

/// Number of layers in the first backbone sub-stack (`conv1_1` to `conv4_3`).
pub const BASE_STACK_LEN: usize = 13;

/// The two sequential sub-stacks of the SSD300 VGG backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackId {
    /// Layers feeding the first detection head, up to `conv4_3`.
    Base,
    /// `pool4` onwards.
    Extra,
}

/// Maps a target layer index to its source sub-stack and layer index.
///
/// This is a fixed property of the two topologies: the VGG stage 5 stack
/// lines up with the backbone's base stack for its first 13 layers and
/// continues into the extra stack.
pub fn map_index(index: usize) -> (StackId, usize) {
    if index < BASE_STACK_LEN {
        (StackId::Base, index)
    } else {
        (StackId::Extra, index - BASE_STACK_LEN)
    }
}

/// A read-only source of pre-trained layer parameters.
pub trait WeightSource {
    /// Number of layers in a sub-stack.
    fn stack_len(&self, stack: StackId) -> usize;

    /// The parameters of a layer, kernel first then bias.
    fn layer_params(&self, stack: StackId, layer: usize) -> Result<Vec<Tensor>>;
}

/// A validated plan of per-layer copies.
#[derive(Debug)]
pub struct Transplant {
    sources: Vec<Vec<Tensor>>,
}

impl Transplant {
    /// Resolves and shape-checks the source of every target layer.
    pub fn check<S: WeightSource + ?Sized>(source: &S, target: &[Layer]) -> Result<Transplant> {
        let mut sources = Vec::with_capacity(target.len());
        for (index, layer) in target.iter().enumerate() {
            let (stack, src_index) = map_index(index);
            if src_index >= source.stack_len(stack) {
                return Err(StyleError::Config(format!(
                    "target layer {index} maps to {stack:?}[{src_index}] which does not exist"
                )));
            }
            let params = source.layer_params(stack, src_index)?;
            let src_shapes: Vec<Vec<i64>> = params.iter().map(|t| t.size()).collect();
            let dst_shapes = layer.param_shapes();
            if src_shapes != dst_shapes {
                return Err(StyleError::Shape(format!(
                    "expected {dst_shapes:?}, {stack:?}[{src_index}] has {src_shapes:?}"
                ))
                .shape_context(index));
            }
            sources.push(params);
        }
        Ok(Transplant { sources })
    }

    /// Number of layers covered by the plan.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Copies the checked parameters into `target`, layer by layer.
    pub fn apply(self, target: &mut [Layer]) -> Result<()> {
        if target.len() != self.sources.len() {
            return Err(StyleError::Config(format!(
                "transplant was checked for {} layers, got {}",
                self.sources.len(),
                target.len()
            )));
        }
        no_grad(|| -> Result<()> {
            for (layer, params) in target.iter_mut().zip(self.sources.iter()) {
                for (dst, src) in layer.params_mut().into_iter().zip(params.iter()) {
                    dst.f_copy_(src)?;
                }
            }
            Ok(())
        })
    }
}
