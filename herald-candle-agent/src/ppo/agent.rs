//! PPO agent acting in an environment.
use super::{DiagGauss, PpoAgentConfig, PpoModel, RecurrentState};
use anyhow::Result;
use candle_core::{Device, Tensor};
use herald_core::{Agent, AgentMode, Configurable, Env, Policy};
use herald_ps::ParameterSerialize;
use log::trace;
use std::marker::PhantomData;

/// Agent selecting actions with a [`PpoModel`].
///
/// A recurrent agent carries the state of the recurrent stem from one step to
/// the next within an episode and drops it on [`Agent::reset_episode`].
/// Actions are the mean of the action distribution in
/// [`AgentMode::EvalDeterministic`] and samples of it otherwise.
pub struct PpoAgent<E>
where
    E: Env,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
{
    model: PpoModel,
    dist: DiagGauss,
    mode: AgentMode,
    state: Option<RecurrentState>,
    phantom: PhantomData<E>,
}

impl<E> PpoAgent<E>
where
    E: Env,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
{
    /// Wraps a model.
    pub fn new(model: PpoModel, mode: AgentMode) -> Self {
        let dist = model.dist();
        Self {
            model,
            dist,
            mode,
            state: None,
            phantom: PhantomData,
        }
    }

    /// The model.
    pub fn model(&self) -> &PpoModel {
        &self.model
    }

    /// The model, mutably.
    pub fn model_mut(&mut self) -> &mut PpoModel {
        &mut self.model
    }

    /// Recurrent state carried to the next step.
    pub fn state(&self) -> Option<&RecurrentState> {
        self.state.as_ref()
    }
}

impl<E> Policy<E> for PpoAgent<E>
where
    E: Env,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
{
    fn sample(&mut self, obs: &E::Obs) -> Result<E::Act> {
        let obs: Tensor = obs.clone().into();
        let (prob, state) = self
            .model
            .forward_actor_with_state(&obs, self.state.as_ref())?;
        self.state = state;

        let act = match self.mode.is_deterministic() {
            true => self.dist.max_prob(&prob)?,
            false => self.dist.sample(&prob)?,
        };
        trace!("act {:?}", act);
        Ok(act.to_device(&Device::Cpu)?.into())
    }
}

impl<E> Agent<E> for PpoAgent<E>
where
    E: Env,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
{
    fn set_mode(&mut self, mode: AgentMode) {
        self.mode = mode;
    }

    fn mode(&self) -> AgentMode {
        self.mode
    }

    fn reset_episode(&mut self) {
        self.state = None;
    }
}

impl<E> Configurable for PpoAgent<E>
where
    E: Env,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
{
    type Config = PpoAgentConfig;

    fn build(config: Self::Config) -> Result<Self> {
        Ok(Self::new(PpoModel::build(config.model)?, config.mode))
    }
}

impl<E> ParameterSerialize for PpoAgent<E>
where
    E: Env,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
{
    fn parameters_to_binary(&self) -> Result<Vec<u8>> {
        self.model.parameters_to_binary()
    }

    fn binary_to_parameters(&mut self, binary: &[u8]) -> Result<()> {
        self.model.binary_to_parameters(binary)
    }
}
