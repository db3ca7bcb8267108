//! Gradient-descent optimizers updating explicit variables in place.
//!
//! Unlike `tch::nn::Optimizer` these do not own a variable store: the caller
//! hands over `(gradient, variable)` pairs at each step, so that one optimizer
//! instance can be reused across runs that each create a fresh variable.
use tch::{no_grad, Tensor};

use crate::error::{Result, StyleError};

pub trait ImageOptimizer {
    /// Applies one update step to every variable using its gradient.
    fn apply_gradients(&mut self, grads_and_vars: &mut [(Tensor, &mut Tensor)]) -> Result<()>;

    /// Drops any per-variable state, called before a new run starts.
    fn reset(&mut self) {}
}

impl<T: ImageOptimizer + ?Sized> ImageOptimizer for Box<T> {
    fn apply_gradients(&mut self, grads_and_vars: &mut [(Tensor, &mut Tensor)]) -> Result<()> {
        (**self).apply_gradients(grads_and_vars)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Stochastic gradient descent with optional momentum.
#[derive(Debug)]
pub struct Sgd {
    pub lr: f64,
    pub momentum: f64,
    velocities: Vec<Tensor>,
}

impl Sgd {
    pub fn new(lr: f64, momentum: f64) -> Sgd {
        Sgd { lr, momentum, velocities: vec![] }
    }
}

impl ImageOptimizer for Sgd {
    fn apply_gradients(&mut self, grads_and_vars: &mut [(Tensor, &mut Tensor)]) -> Result<()> {
        if self.velocities.is_empty() && self.momentum != 0. {
            self.velocities = grads_and_vars.iter().map(|(g, _)| g.zeros_like()).collect();
        }
        no_grad(|| -> Result<()> {
            for (index, (grad, var)) in grads_and_vars.iter_mut().enumerate() {
                if self.momentum == 0. {
                    **var -= &*grad * self.lr;
                    continue;
                }
                let velocity = self.velocities.get_mut(index).ok_or_else(|| {
                    StyleError::Config(format!("sgd received an unknown variable {index}"))
                })?;
                *velocity *= self.momentum;
                *velocity -= &*grad * self.lr;
                **var += &*velocity;
            }
            Ok(())
        })
    }

    fn reset(&mut self) {
        self.velocities.clear()
    }
}

/// Buffer of first/second order moment for the Adam optimizer
#[derive(Debug)]
struct Buffer {
    first_moment: Tensor,
    second_moment: Tensor,
    idx: i32,
}

impl Buffer {
    fn new(like: &Tensor) -> Buffer {
        Buffer { first_moment: like.zeros_like(), second_moment: like.zeros_like(), idx: 1 }
    }

    // Return and increment the timestep
    fn inc(&mut self) -> i32 {
        let old_val = self.idx;
        self.idx += 1;
        old_val
    }
}

/// Adam optimizer, defaults follow Keras.
#[derive(Debug)]
pub struct Adam {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    buffers: Vec<Buffer>,
}

impl Adam {
    pub fn new(lr: f64) -> Adam {
        Adam { lr, beta1: 0.9, beta2: 0.999, eps: 1e-7, buffers: vec![] }
    }
}

impl ImageOptimizer for Adam {
    fn apply_gradients(&mut self, grads_and_vars: &mut [(Tensor, &mut Tensor)]) -> Result<()> {
        if self.buffers.is_empty() {
            self.buffers = grads_and_vars.iter().map(|(g, _)| Buffer::new(g)).collect();
        }
        if self.buffers.len() != grads_and_vars.len() {
            return Err(StyleError::Config(format!(
                "adam was set up for {} variables, got {}",
                self.buffers.len(),
                grads_and_vars.len()
            )));
        }
        no_grad(|| {
            for ((grad, var), buffer) in grads_and_vars.iter_mut().zip(&mut self.buffers) {
                let step = buffer.inc();
                let bias_correction1 = 1.0 - self.beta1.powi(step);
                let bias_correction2 = 1.0 - self.beta2.powi(step);

                buffer.first_moment *= self.beta1;
                buffer.first_moment += &*grad * (1.0 - self.beta1);
                buffer.second_moment *= self.beta2;
                let scaled_grad = &*grad * (1.0 - self.beta2).sqrt();
                let _ = buffer.second_moment.addcmul_(&scaled_grad, &scaled_grad);

                // -lr * m_t / (1-b_1^t)
                let part1 = &buffer.first_moment * (-self.lr / bias_correction1);
                // sqrt(v_t / (1-b_2^t)) + eps
                let part2 = (&buffer.second_moment / bias_correction2).sqrt() + self.eps;
                let _ = var.addcdiv_(&part1, &part2);
            }
        });
        Ok(())
    }

    fn reset(&mut self) {
        self.buffers.clear()
    }
}
