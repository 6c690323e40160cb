//! Diagonal Gaussian distribution over continuous actions.
use anyhow::Result;
use candle_core::Tensor;
use std::f64::consts::{E, PI};

/// Lower bound of [`DiagGauss::likelihood`].
pub const MIN_LIKELIHOOD: f64 = 1e-5;

/// Diagonal Gaussian distribution over `d`-dimensional actions.
///
/// Distributions are given as probability records, tensors whose last axis
/// is the concatenation of the mean and the standard deviation of each action
/// dimension, so the width is `2d`. Records are either `(batch, 2d)` or
/// `(batch, time, 2d)`. In the latter case the time axis is folded into the
/// batch axis for the computation and the output keeps the leading
/// `(batch, time)` axes.
///
/// Standard deviations must be positive. Width mismatches are programming
/// errors and panic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagGauss {
    d: usize,
}

impl DiagGauss {
    /// Creates a distribution over `action_dim`-dimensional actions.
    pub fn new(action_dim: usize) -> Self {
        Self { d: action_dim }
    }

    /// Dimension of actions.
    pub fn action_dim(&self) -> usize {
        self.d
    }

    /// Folds the time axis of a 3-D tensor into the batch axis.
    ///
    /// Returns the leading axes to be restored with [`unfold`].
    fn fold(&self, x: &Tensor, width: usize) -> Result<(Tensor, Option<(usize, usize)>)> {
        match *x.dims() {
            [b, t, w] => {
                assert_eq!(w, width, "last axis must have width {}", width);
                Ok((x.reshape((b * t, w))?, Some((b, t))))
            }
            [_, w] => {
                assert_eq!(w, width, "last axis must have width {}", width);
                Ok((x.clone(), None))
            }
            _ => panic!("expected a 2-D or 3-D tensor, got {:?}", x.dims()),
        }
    }

    fn split(&self, prob: &Tensor) -> Result<(Tensor, Tensor)> {
        let mean = prob.narrow(1, 0, self.d)?;
        let std = prob.narrow(1, self.d, self.d)?;
        Ok((mean, std))
    }

    /// Log density of actions `a`.
    ///
    /// The output is `(batch, 1)`, or `(batch, time, 1)` for 3-D inputs.
    pub fn log_likelihood(&self, a: &Tensor, prob: &Tensor) -> Result<Tensor> {
        let (prob, lead) = self.fold(prob, 2 * self.d)?;
        let (a, _) = self.fold(a, self.d)?;
        let (mean, std) = self.split(&prob)?;

        let z = a.sub(&mean)?.div(&std)?;
        let log_norm = 0.5 * (2.0 * PI).ln() * self.d as f64;
        let ll = z
            .sqr()?
            .sum_keepdim(1)?
            .affine(-0.5, -log_norm)?
            .sub(&std.log()?.sum_keepdim(1)?)?;

        unfold(ll, lead)
    }

    /// Density of actions `a`, floored at [`MIN_LIKELIHOOD`].
    ///
    /// The output has the shape of [`DiagGauss::log_likelihood`].
    pub fn likelihood(&self, a: &Tensor, prob: &Tensor) -> Result<Tensor> {
        Ok(self.log_likelihood(a, prob)?.exp()?.maximum(MIN_LIKELIHOOD)?)
    }

    /// KL divergence `KL(prob0 || prob1)`.
    ///
    /// The output is `(batch,)`, or `(batch, time)` for 3-D inputs.
    pub fn kl(&self, prob0: &Tensor, prob1: &Tensor) -> Result<Tensor> {
        let (prob0, lead) = self.fold(prob0, 2 * self.d)?;
        let (prob1, _) = self.fold(prob1, 2 * self.d)?;
        let (mean0, std0) = self.split(&prob0)?;
        let (mean1, std1) = self.split(&prob1)?;

        let log_ratio = std1.div(&std0)?.log()?.sum(1)?;
        let num = std0.sqr()?.add(&mean0.sub(&mean1)?.sqr()?)?;
        let den = std1.sqr()?.affine(2.0, 0.0)?;
        let kl = log_ratio
            .add(&num.div(&den)?.sum(1)?)?
            .affine(1.0, -0.5 * self.d as f64)?;

        unfold(kl, lead)
    }

    /// Differential entropy.
    ///
    /// The output is `(batch,)`, or `(batch, time)` for 3-D inputs.
    pub fn entropy(&self, prob: &Tensor) -> Result<Tensor> {
        let (prob, lead) = self.fold(prob, 2 * self.d)?;
        let (_, std) = self.split(&prob)?;
        let c = 0.5 * (2.0 * PI * E).ln() * self.d as f64;
        let h = std.log()?.sum(1)?.affine(1.0, c)?;

        unfold(h, lead)
    }

    /// Samples actions, `mean + std * eps` with `eps ~ N(0, 1)`.
    ///
    /// The output is `(batch, d)`, or `(batch, time, d)` for 3-D inputs.
    pub fn sample(&self, prob: &Tensor) -> Result<Tensor> {
        let (prob, lead) = self.fold(prob, 2 * self.d)?;
        let (mean, std) = self.split(&prob)?;
        let eps = mean.randn_like(0., 1.)?;
        let a = std.mul(&eps)?.add(&mean)?;

        unfold(a, lead)
    }

    /// Returns the mode of the distribution, the mean.
    ///
    /// The output is `(batch, d)`, or `(batch, time, d)` for 3-D inputs.
    pub fn max_prob(&self, prob: &Tensor) -> Result<Tensor> {
        let (prob, lead) = self.fold(prob, 2 * self.d)?;
        let (mean, _) = self.split(&prob)?;

        unfold(mean.contiguous()?, lead)
    }
}

/// Restores the leading axes folded by [`DiagGauss::fold`].
fn unfold(x: Tensor, lead: Option<(usize, usize)>) -> Result<Tensor> {
    match lead {
        None => Ok(x),
        Some((b, t)) => {
            let mut shape = vec![b, t];
            shape.extend_from_slice(&x.dims()[1..]);
            Ok(x.reshape(shape)?)
        }
    }
}
