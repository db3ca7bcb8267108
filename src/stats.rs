//! Second order statistics of the style activations.
use tch::{Kind, Tensor};

use crate::error::Result;
use crate::extractor::Activations;

/// Gram matrix of a `(B, H, W, C)` activation, averaged over spatial positions.
///
/// Returns a `(B, C, C)` tensor holding the channel co-activations.
pub fn gram(activation: &Tensor) -> Result<Tensor> {
    let (b, h, w, c) = activation.size4()?;
    let m = activation.to_kind(Kind::Float).reshape([b, h * w, c]);
    let g = m.transpose(1, 2).matmul(&m);
    Ok(g / (h * w) as f64)
}

/// Style and content features of one image.
#[derive(Debug)]
pub struct Features {
    /// One Gram matrix per style tap.
    pub style: Vec<Tensor>,
    /// The raw content activation.
    pub content: Tensor,
}

impl Features {
    /// Detaches the features so they can serve as fixed targets.
    pub fn detach(&self) -> Features {
        Features {
            style: self.style.iter().map(Tensor::detach).collect(),
            content: self.content.detach(),
        }
    }
}

/// Turns the style activations into Gram matrices, the content activation
/// passes through.
pub fn encode(activations: Activations) -> Result<Features> {
    let style = activations.style.iter().map(gram).collect::<Result<Vec<_>>>()?;
    Ok(Features { style, content: activations.content.to_kind(Kind::Float) })
}
