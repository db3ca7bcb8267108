//! Style and content loss terms.
use tch::{Kind, Reduction, Tensor};

use crate::config::LossWeights;
use crate::error::{Result, StyleError};
use crate::stats::Features;

/// Sum over the style layers of the mean squared Gram matrix difference.
pub fn style_loss(generated: &[Tensor], targets: &[Tensor]) -> Result<Tensor> {
    if generated.len() != targets.len() {
        return Err(StyleError::Shape(format!(
            "{} generated gram matrices for {} targets",
            generated.len(),
            targets.len()
        )));
    }
    let losses = generated
        .iter()
        .zip(targets)
        .map(|(g, t)| g.f_mse_loss(t, Reduction::Mean))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(match losses.split_first() {
        Some((first, rest)) => rest.iter().fold(first.shallow_clone(), |acc, l| acc + l),
        None => Tensor::from(0f32).to_device(targets_device(targets)),
    })
}

fn targets_device(targets: &[Tensor]) -> tch::Device {
    targets.first().map_or(tch::Device::Cpu, Tensor::device)
}

/// Half the summed squared difference of the content activations.
pub fn content_loss(generated: &Tensor, target: &Tensor) -> Result<Tensor> {
    if generated.size() != target.size() {
        return Err(StyleError::Shape(format!(
            "content activation {:?} does not match target {:?}",
            generated.size(),
            target.size()
        )));
    }
    Ok((generated - target).square().sum(Kind::Float) * 0.5)
}

/// Weighted sum of the style and content losses.
pub fn total_loss(
    weights: &LossWeights,
    generated: &Features,
    targets: &Features,
) -> Result<Tensor> {
    let style = style_loss(&generated.style, &targets.style)?;
    let content = content_loss(&generated.content, &targets.content)?;
    Ok(style * weights.style + content * weights.content)
}
