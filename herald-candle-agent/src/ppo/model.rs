//! Policy/value model of PPO.
use super::{
    z_filter::{self, ZFilter},
    DiagGauss, PpoModelConfig, RecurrentState, RnnStem,
};
use crate::{
    error::PpoError,
    mlp::{Mlp, MlpConfig},
    model::SubModel1,
    util::{copy_vars, NamedTensors},
    Activation,
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Init, VarBuilder, VarMap};
use herald_ps::ParameterSerialize;
use log::{debug, info};

/// Actor and critic of a PPO agent.
///
/// Observations are optionally normalized by a [`ZFilter`], then go through
/// the recurrent stem if it is enabled, then through one of two heads. The
/// actor head outputs a probability record of a [`DiagGauss`], the critic
/// head a value estimate. Whether the model is recurrent is fixed at
/// construction.
///
/// All variables live in a single [`VarMap`]: `actor.*`, `critic.*`, `rnn.*`
/// and `z_filter.*`.
pub struct PpoModel {
    config: PpoModelConfig,
    device: Device,
    varmap: VarMap,
    rnn: Option<RnnStem>,
    actor: Mlp,
    log_std: Tensor,
    critic: Mlp,
    z_filter: Option<ZFilter>,
}

impl PpoModel {
    /// Builds a model on CPU, or on a CUDA device if `use_accelerator` is set
    /// and one is available.
    pub fn build(config: PpoModelConfig) -> Result<Self> {
        let device = match config.use_accelerator {
            true => Device::cuda_if_available(0)?,
            false => Device::Cpu,
        };
        Self::build_on(config, device)
    }

    /// Builds a model on the given device.
    pub fn build_on(config: PpoModelConfig, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let in_dim = config.head_in_dim();

        let rnn = match config.recurrent.enabled {
            true => Some(RnnStem::build(vb.pp("rnn"), config.obs_dim, &config.recurrent)?),
            false => None,
        };
        let actor = {
            let mlp_config = MlpConfig::new(
                in_dim,
                config.actor_units.clone(),
                config.action_dim,
                Activation::None,
            );
            Mlp::build(vb.pp("actor"), mlp_config)?
        };
        let log_std = vb.pp("actor").get_with_hints(
            (1, config.action_dim),
            "log_std",
            Init::Const(config.init_log_std),
        )?;
        let critic = {
            let mlp_config = MlpConfig::new(in_dim, config.critic_units.clone(), 1, Activation::None);
            Mlp::build(vb.pp("critic"), mlp_config)?
        };
        let z_filter = match config.use_observation_filter {
            true => Some(ZFilter::build(&varmap, config.obs_dim, &device)?),
            false => None,
        };
        info!(
            "Built PPO model, obs_dim {}, action_dim {}, recurrent {}, observation filter {}, device {:?}",
            config.obs_dim,
            config.action_dim,
            config.recurrent.enabled,
            config.use_observation_filter,
            device
        );

        Ok(Self {
            config,
            device,
            varmap,
            rnn,
            actor,
            log_std,
            critic,
            z_filter,
        })
    }

    /// Configuration of the model.
    pub fn config(&self) -> &PpoModelConfig {
        &self.config
    }

    /// Device of the variables.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Variables of the model.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Distribution of the probability records output by the actor.
    pub fn dist(&self) -> DiagGauss {
        DiagGauss::new(self.config.action_dim)
    }

    /// Returns `true` if the model has the recurrent stem.
    pub fn is_recurrent(&self) -> bool {
        self.rnn.is_some()
    }

    /// All-zero recurrent state for `batch` sequences, `None` for a
    /// feed-forward model.
    pub fn zero_state(&self, batch: usize) -> Result<Option<RecurrentState>> {
        match &self.rnn {
            None => Ok(None),
            Some(rnn) => Ok(Some(RecurrentState::zeros(
                rnn.num_layers(),
                batch,
                rnn.hidden_size(),
                &self.device,
            )?)),
        }
    }

    fn filter(&self, obs: &Tensor) -> Result<Tensor> {
        let obs = obs.to_device(&self.device)?.to_dtype(DType::F32)?;
        match &self.z_filter {
            None => Ok(obs),
            Some(z_filter) => z_filter.forward(&obs),
        }
    }

    /// Runs the recurrent stem and folds the time axis into the batch axis.
    fn stem(
        &self,
        rnn: &RnnStem,
        obs: &Tensor,
        state: Option<&RecurrentState>,
    ) -> Result<(Tensor, (usize, usize), RecurrentState)> {
        assert_eq!(
            obs.rank(),
            3,
            "recurrent model expects (batch, time, obs_dim) observations, got {:?}",
            obs.dims()
        );
        let (xs, state) = rnn.forward(obs, state)?;
        let (b, t, h) = xs.dims3()?;
        Ok((xs.reshape((b * t, h))?, (b, t), state))
    }

    fn actor_head(&self, xs: &Tensor) -> Result<Tensor> {
        let mean = self.actor.forward(xs)?;
        let std = self.log_std.exp()?.broadcast_as(mean.shape())?;
        Ok(Tensor::cat(&[&mean, &std], D::Minus1)?)
    }

    /// Probability records of actions.
    ///
    /// A recurrent model takes `(batch, time, obs_dim)` observations and
    /// returns `(batch, time, 2 * action_dim)`; a feed-forward model takes
    /// `(batch, obs_dim)` and returns `(batch, 2 * action_dim)`. `state` is
    /// the initial recurrent state, zero if `None`; it is ignored by a
    /// feed-forward model.
    ///
    /// Panics if a recurrent model gets observations that are not 3-D.
    pub fn forward_actor(&self, obs: &Tensor, state: Option<&RecurrentState>) -> Result<Tensor> {
        let obs = self.filter(obs)?;
        match &self.rnn {
            None => self.actor_head(&obs),
            Some(rnn) => {
                let (xs, (b, t), _) = self.stem(rnn, &obs, state)?;
                let prob = self.actor_head(&xs)?;
                Ok(prob.reshape((b, t, 2 * self.config.action_dim))?)
            }
        }
    }

    /// Value estimates, `(batch, time, 1)` for a recurrent model and
    /// `(batch, 1)` otherwise.
    ///
    /// Panics if a recurrent model gets observations that are not 3-D.
    pub fn forward_critic(&self, obs: &Tensor, state: Option<&RecurrentState>) -> Result<Tensor> {
        let obs = self.filter(obs)?;
        match &self.rnn {
            None => self.critic.forward(&obs),
            Some(rnn) => {
                let (xs, (b, t), _) = self.stem(rnn, &obs, state)?;
                Ok(self.critic.forward(&xs)?.reshape((b, t, 1))?)
            }
        }
    }

    /// Single-step actor for interacting with an environment.
    ///
    /// A recurrent model takes one observation of any shape with `obs_dim`
    /// elements, runs one step from `state` and returns the `(1, 2 *
    /// action_dim)` probability record with the next state. The returned
    /// state is detached, so keeping it over a long rollout does not keep the
    /// computations of earlier steps alive.
    ///
    /// A feed-forward model returns the probability records of a batch of
    /// observations, or of a single observation given as a 1-D tensor, and
    /// no state.
    pub fn forward_actor_with_state(
        &self,
        obs: &Tensor,
        state: Option<&RecurrentState>,
    ) -> Result<(Tensor, Option<RecurrentState>)> {
        let obs_dim = self.config.obs_dim;
        match &self.rnn {
            None => {
                let obs = match obs.rank() {
                    1 => obs.reshape((1, obs_dim))?,
                    _ => obs.clone(),
                };
                Ok((self.forward_actor(&obs, None)?, None))
            }
            Some(rnn) => {
                assert_eq!(
                    obs.elem_count(),
                    obs_dim,
                    "single-step forward takes one observation, got {:?}",
                    obs.dims()
                );
                let obs = self.filter(&obs.reshape((1, 1, obs_dim))?)?;
                let (xs, _, state) = self.stem(rnn, &obs, state)?;
                let prob = self.actor_head(&xs)?;
                Ok((prob, Some(state.detach())))
            }
        }
    }

    /// Overwrites all variables with those of `other`.
    ///
    /// The two models must have the same structure.
    pub fn sync_parameters_from(&mut self, other: &Self) -> Result<()> {
        let n = copy_vars(&self.varmap, &other.varmap, |_| true)?;
        debug!("Synchronized {} variables", n);
        Ok(())
    }

    /// Overwrites the observation filter statistics with those of `other`.
    ///
    /// Does nothing if this model has no observation filter.
    pub fn sync_filter_from(&mut self, other: &Self) -> Result<()> {
        if self.z_filter.is_some() {
            let prefix = format!("{}.", z_filter::PREFIX);
            copy_vars(&self.varmap, &other.varmap, |name| name.starts_with(&prefix))?;
        }
        Ok(())
    }

    /// Adds observations to the statistics of the observation filter.
    ///
    /// Fails with [`PpoError::ObservationFilterDisabled`] if the model was
    /// built without the filter.
    pub fn update_observation_filter(&mut self, obs: &Tensor) -> Result<()> {
        match &mut self.z_filter {
            None => Err(PpoError::ObservationFilterDisabled.into()),
            Some(z_filter) => z_filter.update(obs),
        }
    }
}

impl ParameterSerialize for PpoModel {
    fn parameters_to_binary(&self) -> Result<Vec<u8>> {
        NamedTensors::copy_from(&self.varmap)?.to_bytes()
    }

    fn binary_to_parameters(&mut self, binary: &[u8]) -> Result<()> {
        NamedTensors::from_bytes(binary)?.copy_to(&self.varmap)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ppo::RecurrentConfig;

    fn obs(dims: &[usize]) -> Tensor {
        Tensor::randn(0f32, 1f32, dims, &Device::Cpu).unwrap()
    }

    fn to_vec(t: &Tensor) -> Vec<f32> {
        t.flatten_all().unwrap().to_vec1().unwrap()
    }

    fn recurrent_config() -> PpoModelConfig {
        PpoModelConfig::new(4, 2)
            .recurrent(RecurrentConfig::lstm(8, 2))
            .use_observation_filter(true)
            .actor_units(vec![16])
            .critic_units(vec![16])
    }

    #[test]
    fn test_feed_forward_shapes() -> Result<()> {
        let model = PpoModel::build(PpoModelConfig::new(4, 2).init_log_std(-0.5))?;
        assert!(!model.is_recurrent());
        assert!(model.zero_state(1)?.is_none());

        let prob = model.forward_actor(&obs(&[5, 4]), None)?;
        assert_eq!(prob.dims(), &[5, 4]);
        // The std block is exp(init_log_std) everywhere.
        for std in to_vec(&prob.narrow(1, 2, 2)?) {
            assert!((std - (-0.5f32).exp()).abs() < 1e-6);
        }
        assert_eq!(model.forward_critic(&obs(&[5, 4]), None)?.dims(), &[5, 1]);

        let (prob, state) = model.forward_actor_with_state(&obs(&[4]), None)?;
        assert_eq!(prob.dims(), &[1, 4]);
        assert!(state.is_none());
        Ok(())
    }

    #[test]
    fn test_recurrent_shapes() -> Result<()> {
        let model = PpoModel::build(recurrent_config())?;
        assert!(model.is_recurrent());

        assert_eq!(model.forward_actor(&obs(&[3, 5, 4]), None)?.dims(), &[3, 5, 4]);
        assert_eq!(model.forward_critic(&obs(&[3, 5, 4]), None)?.dims(), &[3, 5, 1]);

        let state = model.zero_state(1)?;
        let (prob, state) = model.forward_actor_with_state(&obs(&[1, 4]), state.as_ref())?;
        assert_eq!(prob.dims(), &[1, 4]);
        let state = state.unwrap();
        assert_eq!(state.hidden.dims(), &[2, 1, 8]);
        assert_eq!(state.cell.dims(), &[2, 1, 8]);
        Ok(())
    }

    #[test]
    fn test_single_steps_match_sequence() -> Result<()> {
        let model = PpoModel::build(recurrent_config())?;
        let seq = obs(&[1, 6, 4]);
        let prob_seq = to_vec(&model.forward_actor(&seq, None)?);

        let mut state = None;
        let mut prob_steps = vec![];
        for t in 0..6 {
            let (prob, next) = model.forward_actor_with_state(&seq.narrow(1, t, 1)?, state.as_ref())?;
            prob_steps.extend(to_vec(&prob));
            state = next;
        }
        for (a, b) in prob_seq.iter().zip(prob_steps.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_returned_state_is_detached() -> Result<()> {
        let model = PpoModel::build(recurrent_config())?;
        let weight = model
            .varmap()
            .data()
            .lock()
            .unwrap()
            .get("rnn.weight_ih_l0")
            .unwrap()
            .as_tensor()
            .clone();
        let rnn = model.rnn.as_ref().unwrap();

        // The state computed inside the model depends on the weights.
        let (_, _, state) = model.stem(rnn, &obs(&[1, 1, 4]), None)?;
        let grads = state.hidden.sum_all()?.backward()?;
        assert!(grads.get(&weight).is_some());

        // The state handed out does not, even after many steps.
        let mut state = None;
        for _ in 0..100 {
            state = model.forward_actor_with_state(&obs(&[4]), state.as_ref())?.1;
        }
        let state = state.unwrap();
        let grads = state.hidden.add(&state.cell)?.sum_all()?.backward()?;
        assert!(grads.get(&weight).is_none());
        Ok(())
    }

    #[test]
    #[should_panic]
    fn test_recurrent_model_rejects_2d_observations() {
        let model = PpoModel::build(recurrent_config()).unwrap();
        let _ = model.forward_actor(&obs(&[3, 4]), None);
    }

    #[test]
    #[should_panic]
    fn test_single_step_rejects_batches() {
        let model = PpoModel::build(recurrent_config()).unwrap();
        let _ = model.forward_actor_with_state(&obs(&[2, 4]), None);
    }

    #[test]
    fn test_sync_parameters_from() -> Result<()> {
        let mut model1 = PpoModel::build(recurrent_config())?;
        let mut model2 = PpoModel::build(recurrent_config().init_log_std(0.3))?;
        model2.update_observation_filter(&obs(&[10, 4]))?;
        let x = obs(&[2, 3, 4]);
        assert_ne!(
            to_vec(&model1.forward_actor(&x, None)?),
            to_vec(&model2.forward_actor(&x, None)?)
        );

        model1.sync_parameters_from(&model2)?;
        assert_eq!(
            to_vec(&model1.forward_actor(&x, None)?),
            to_vec(&model2.forward_actor(&x, None)?)
        );
        assert_eq!(
            to_vec(&model1.forward_critic(&x, None)?),
            to_vec(&model2.forward_critic(&x, None)?)
        );

        // Copied, not shared
        let binary2 = model2.parameters_to_binary()?;
        model1.update_observation_filter(&obs(&[10, 4]))?;
        assert_eq!(model2.parameters_to_binary()?, binary2);
        assert_ne!(model1.parameters_to_binary()?, binary2);
        Ok(())
    }

    #[test]
    fn test_failed_sync_keeps_parameters() -> Result<()> {
        let mut model1 = PpoModel::build(recurrent_config())?;
        let model2 = PpoModel::build(recurrent_config().use_observation_filter(false))?;
        let before = model1.parameters_to_binary()?;

        let err = model1.sync_parameters_from(&model2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PpoError>(),
            Some(PpoError::MissingParameter(name)) if name.starts_with("z_filter.")
        ));
        assert_eq!(model1.parameters_to_binary()?, before);
        Ok(())
    }

    #[test]
    fn test_sync_filter_from() -> Result<()> {
        let config = PpoModelConfig::new(3, 1).use_observation_filter(true);
        let mut model1 = PpoModel::build(config.clone())?;
        let mut model2 = PpoModel::build(config.init_log_std(0.0))?;
        model2.update_observation_filter(&(obs(&[20, 3]) * 3.0)?)?;
        let x = obs(&[4, 3]);
        let critic_before = to_vec(&model1.forward_critic(&x, None)?);

        model1.sync_filter_from(&model2)?;
        let nt1 = NamedTensors::copy_from(model1.varmap())?;
        let nt2 = NamedTensors::copy_from(model2.varmap())?;
        for (name, value) in nt1.named_tensors.iter() {
            if name.starts_with("z_filter.") {
                assert_eq!(Some(value), nt2.named_tensors.get(name));
            } else {
                assert_ne!(Some(value), nt2.named_tensors.get(name));
            }
        }
        // Same heads, different normalization
        assert_ne!(to_vec(&model1.forward_critic(&x, None)?), critic_before);
        Ok(())
    }

    #[test]
    fn test_observation_filter_disabled() -> Result<()> {
        let mut model = PpoModel::build(PpoModelConfig::new(3, 1))?;
        let err = model
            .update_observation_filter(&obs(&[2, 3]))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PpoError>(),
            Some(&PpoError::ObservationFilterDisabled)
        );

        // A model without the filter ignores the filter of others.
        let other = PpoModel::build(PpoModelConfig::new(3, 1).use_observation_filter(true))?;
        model.sync_filter_from(&other)?;
        Ok(())
    }

    #[test]
    fn test_parameters_roundtrip_through_binary() -> Result<()> {
        let mut model1 = PpoModel::build(recurrent_config())?;
        model1.update_observation_filter(&obs(&[8, 4]))?;
        let mut model2 = PpoModel::build(recurrent_config())?;

        let binary = model1.parameters_to_binary()?;
        model2.binary_to_parameters(&binary)?;
        assert_eq!(model2.parameters_to_binary()?, binary);

        let x = obs(&[1, 2, 4]);
        assert_eq!(
            to_vec(&model1.forward_actor(&x, None)?),
            to_vec(&model2.forward_actor(&x, None)?)
        );

        // Different structure
        let mut model3 = PpoModel::build(PpoModelConfig::new(4, 2))?;
        assert!(model3.binary_to_parameters(&binary).is_err());
        Ok(())
    }
}
