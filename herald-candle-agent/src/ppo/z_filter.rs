//! Observation filter normalizing with running statistics.
use crate::error::PpoError;
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Init, VarMap};
use log::trace;

/// Initial count, also the initial sum of squares per dimension.
const EPS: f64 = 1e-2;

/// Prefix of the names of the variables of [`ZFilter`].
pub(super) const PREFIX: &str = "z_filter";

/// Running-statistics normalizer of observations.
///
/// The sum, the sum of squares and the count of observations are variables of
/// the model's [`VarMap`], so they are serialized and synchronized with the
/// other parameters. Before the first update the mean is 0 and the standard
/// deviation is 1.
pub struct ZFilter {
    obs_dim: usize,
    varmap: VarMap,
    running_sum: Tensor,
    running_sumsq: Tensor,
    count: Tensor,
}

fn name(var: &str) -> String {
    format!("{}.{}", PREFIX, var)
}

impl ZFilter {
    /// Creates the variables of the filter in `varmap`.
    pub fn build(varmap: &VarMap, obs_dim: usize, device: &Device) -> Result<Self> {
        let get = |shape: usize, var: &str, init: f64| {
            varmap.get(shape, &name(var), Init::Const(init), DType::F32, device)
        };
        let running_sum = get(obs_dim, "running_sum", 0.)?;
        let running_sumsq = get(obs_dim, "running_sumsq", EPS)?;
        let count = get(1, "count", EPS)?;

        Ok(Self {
            obs_dim,
            varmap: varmap.clone(),
            running_sum,
            running_sumsq,
            count,
        })
    }

    /// Mean and standard deviation of the observations seen so far.
    pub fn stats(&self) -> Result<(Tensor, Tensor)> {
        let mean = self.running_sum.broadcast_div(&self.count)?;
        let var = self
            .running_sumsq
            .broadcast_div(&self.count)?
            .sub(&mean.sqr()?)?
            .maximum(1e-8)?;
        Ok((mean.detach(), var.sqrt()?.detach()))
    }

    /// Normalizes observations, `clamp((x - mean) / (std + 1e-5), -5, 5)`.
    ///
    /// The last axis of `obs` is the observation.
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        let (mean, std) = self.stats()?;
        let xs = obs
            .broadcast_sub(&mean)?
            .broadcast_div(&std.affine(1.0, 1e-5)?)?;
        Ok(xs.clamp(-5.0, 5.0)?)
    }

    /// Adds a batch of observations to the statistics.
    ///
    /// `obs` may have any number of leading axes.
    pub fn update(&mut self, obs: &Tensor) -> Result<()> {
        assert_eq!(
            obs.dims().last(),
            Some(&self.obs_dim),
            "last axis of observations must be {}",
            self.obs_dim
        );
        let n = obs.elem_count() / self.obs_dim;
        let obs = obs
            .detach()
            .to_device(self.running_sum.device())?
            .to_dtype(DType::F32)?
            .reshape((n, self.obs_dim))?;

        let sum = self.running_sum.add(&obs.sum(0)?)?;
        let sumsq = self.running_sumsq.add(&obs.sqr()?.sum(0)?)?;
        let count = self.count.affine(1.0, n as f64)?;

        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("variable map lock poisoned"))?;
        let updates = [("running_sum", sum), ("running_sumsq", sumsq), ("count", count)];
        for (var, value) in updates.iter() {
            let name = name(var);
            vars.get(&name)
                .ok_or_else(|| PpoError::MissingParameter(name.clone()))?
                .set(value)?;
        }
        trace!("Updated observation filter with {} observations", n);

        Ok(())
    }
}
