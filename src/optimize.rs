//! The iterative optimization turning a content image into a stylized one.
use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, no_grad, Kind, Tensor};
use tracing::{debug, warn};

use crate::config::{Divergence, RunConfig};
use crate::error::{Result, StyleError};
use crate::extractor::FeatureExtractor;
use crate::loss::total_loss;
use crate::nn::ImageOptimizer;
use crate::stats::{encode, Features};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Targets computed, the generated image equals the content image.
    Initialized,
    /// `epoch` iterations have been applied so far.
    Iterating { epoch: usize },
    Done,
}

/// Result of a complete run.
#[derive(Debug)]
pub struct Stylized {
    /// The generated image before the first iteration and after each one.
    pub snapshots: Vec<Tensor>,
    /// Loss value computed at each iteration.
    pub losses: Vec<f64>,
}

impl Stylized {
    /// The final generated image.
    pub fn last(&self) -> Option<&Tensor> {
        self.snapshots.last()
    }
}

fn features(extractor: &FeatureExtractor, image: &Tensor) -> Result<Features> {
    encode(extractor.activations(image)?)
}

/// One optimization run over a fresh copy of the content image.
#[derive(Debug)]
pub struct StyleRun<'a> {
    extractor: &'a FeatureExtractor,
    targets: Features,
    generated: Tensor,
    cfg: RunConfig,
    state: RunState,
    snapshots: Vec<Tensor>,
    losses: Vec<f64>,
    // Holds the generated image variable.
    _vs: nn::VarStore,
}

impl<'a> StyleRun<'a> {
    /// Computes the style targets from `style_image`, the content target from
    /// `content_image`, and starts from a copy of the content image.
    pub fn new(
        extractor: &'a FeatureExtractor,
        style_image: &Tensor,
        content_image: &Tensor,
        cfg: RunConfig,
    ) -> Result<StyleRun<'a>> {
        let (style_targets, content_target) = no_grad(|| -> Result<_> {
            let style = features(extractor, style_image)?.style;
            let content = features(extractor, content_image)?.content;
            Ok((style, content))
        })?;
        let targets = Features { style: style_targets, content: content_target }.detach();

        let vs = nn::VarStore::new(extractor.device());
        let content = content_image.to_kind(Kind::Float).to_device(extractor.device());
        let generated = vs.root().var_copy("img", &content);
        let mut snapshots = Vec::with_capacity(cfg.epochs + 1);
        snapshots.push(content.copy());
        Ok(StyleRun {
            extractor,
            targets,
            generated,
            cfg,
            state: RunState::Initialized,
            snapshots,
            losses: Vec::with_capacity(cfg.epochs),
            _vs: vs,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn generated(&self) -> &Tensor {
        &self.generated
    }

    pub fn snapshots(&self) -> &[Tensor] {
        &self.snapshots
    }

    fn epoch(&self) -> usize {
        match self.state {
            RunState::Initialized => 0,
            RunState::Iterating { epoch } => epoch,
            RunState::Done => self.cfg.epochs,
        }
    }

    /// Applies one iteration and returns the loss computed before the update.
    pub fn step<O: ImageOptimizer + ?Sized>(&mut self, opt: &mut O) -> Result<f64> {
        let epoch = self.epoch();
        if self.state == RunState::Done || epoch >= self.cfg.epochs {
            self.state = RunState::Done;
            return Err(StyleError::Config(format!("run already completed {epoch} epochs")));
        }
        let current = features(self.extractor, &self.generated)?;
        let loss = total_loss(&self.cfg.weights, &current, &self.targets)?;
        let loss_value = f64::try_from(&loss)?;
        let grad = Tensor::f_run_backward(&[&loss], &[&self.generated], false, false)?
            .pop()
            .ok_or_else(|| StyleError::Config("no gradient for the generated image".to_string()))?;
        opt.apply_gradients(&mut [(grad, &mut self.generated)])?;

        if !loss_value.is_finite() || !is_finite(&self.generated)? {
            match self.cfg.divergence {
                Divergence::Fail => return Err(StyleError::Diverged { epoch }),
                Divergence::Ignore => {
                    warn!(epoch, loss = loss_value, "generated image is not finite")
                }
            }
        }
        no_grad(|| {
            let _ = self.generated.clamp_(0.0, 255.0);
        });
        self.snapshots.push(self.generated.detach().copy());
        self.losses.push(loss_value);
        debug!(epoch, loss = loss_value, "style transfer step");

        let epoch = epoch + 1;
        self.state = if epoch == self.cfg.epochs {
            RunState::Done
        } else {
            RunState::Iterating { epoch }
        };
        Ok(loss_value)
    }

    /// Runs every remaining iteration and returns the collected snapshots.
    pub fn run<O: ImageOptimizer + ?Sized>(mut self, opt: &mut O) -> Result<Stylized> {
        opt.reset();
        let pb = if self.cfg.progress {
            let pb = ProgressBar::new(self.cfg.epochs as u64);
            pb.set_style(ProgressStyle::default_bar());
            pb
        } else {
            ProgressBar::hidden()
        };
        if self.cfg.epochs == 0 {
            self.state = RunState::Done;
        }
        while self.state != RunState::Done {
            let loss = self.step(opt)?;
            pb.set_message(format!("{loss:.4e}"));
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(Stylized { snapshots: self.snapshots, losses: self.losses })
    }
}

fn is_finite(t: &Tensor) -> Result<bool> {
    let peak = f64::try_from(t.detach().abs().max())?;
    Ok(peak.is_finite())
}
