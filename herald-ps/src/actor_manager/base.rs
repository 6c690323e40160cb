use super::ActorManagerConfig;
use crate::{ParameterClient, ParameterSerialize, PubSub, Rollout, RolloutConfig, RolloutStat};
use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use herald_core::{record::NullRecorder, Agent, Configurable, Env};
use log::{info, warn};
use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

/// Runs a number of [`Rollout`]s, each on its own thread.
///
/// Every actor builds its own environment and agent, and pulls parameters
/// from the shared [`PubSub`] channel through its own [`ParameterClient`].
/// Actors do not share anything else.
pub struct ActorManager<E, A>
where
    E: Env,
    A: Agent<E> + Configurable + ParameterSerialize,
{
    /// Configurations of agents, one for each actor.
    agent_configs: Vec<A::Config>,

    /// Configuration of [`Env`].
    env_config: E::Config,

    rollout_config: RolloutConfig,
    env_seed_base: i64,

    /// Name of the broadcaster to listen to.
    name: String,
    channel: Arc<dyn PubSub>,

    /// Thread handles.
    threads: Vec<JoinHandle<()>>,

    /// Flag to stop actors.
    stop: Arc<Mutex<bool>>,

    /// Stats sent by actor threads when their loop ends.
    stat_sender: Sender<(usize, Result<RolloutStat>)>,
    stat_receiver: Receiver<(usize, Result<RolloutStat>)>,

    phantom: PhantomData<(E, A)>,
}

impl<E, A> ActorManager<E, A>
where
    E: Env + 'static,
    A: Agent<E> + Configurable + ParameterSerialize + 'static,
    A::Config: Send + 'static,
    E::Config: Send + 'static,
{
    /// Builds an [`ActorManager`].
    ///
    /// `agent_configs` must have `config.n_actors` elements. They must share
    /// the structure of the model, while exploration settings may differ.
    pub fn build(
        config: &ActorManagerConfig,
        agent_configs: &[A::Config],
        env_config: &E::Config,
        name: impl Into<String>,
        channel: Arc<dyn PubSub>,
        stop: Arc<Mutex<bool>>,
    ) -> Result<Self> {
        if agent_configs.len() != config.n_actors {
            return Err(anyhow!(
                "{} agent configs given for {} actors",
                agent_configs.len(),
                config.n_actors
            ));
        }
        let (stat_sender, stat_receiver) = unbounded();

        Ok(Self {
            agent_configs: agent_configs.to_vec(),
            env_config: env_config.clone(),
            rollout_config: config.rollout.clone(),
            env_seed_base: config.env_seed_base,
            name: name.into(),
            channel,
            threads: vec![],
            stop,
            stat_sender,
            stat_receiver,
            phantom: PhantomData,
        })
    }

    /// Spawns the actor threads.
    ///
    /// `guard_init_env` prevents simultaneous initialization of environments.
    pub fn run(&mut self, guard_init_env: Arc<Mutex<bool>>) {
        for (id, agent_config) in self.agent_configs.iter().cloned().enumerate() {
            let env_config = self.env_config.clone();
            let rollout_config = self.rollout_config.clone();
            let seed = self.env_seed_base + id as i64;
            let client = ParameterClient::new(self.name.clone(), self.channel.clone());
            let stop = self.stop.clone();
            let guard = guard_init_env.clone();
            let sender = self.stat_sender.clone();

            let handle = std::thread::spawn(move || {
                let result = Self::run_actor(
                    id,
                    agent_config,
                    env_config,
                    seed,
                    rollout_config,
                    client,
                    stop,
                    guard,
                );
                if let Err(e) = &result {
                    warn!("Actor {} failed: {}", id, e);
                }
                // The receiver lives as long as the manager.
                let _ = sender.send((id, result));
            });
            self.threads.push(handle);
            info!("Starts actor thread {}", id);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_actor(
        id: usize,
        agent_config: A::Config,
        env_config: E::Config,
        seed: i64,
        rollout_config: RolloutConfig,
        client: ParameterClient,
        stop: Arc<Mutex<bool>>,
        guard_init_env: Arc<Mutex<bool>>,
    ) -> Result<RolloutStat> {
        let mut env = {
            let _guard = guard_init_env
                .lock()
                .map_err(|_| anyhow!("env initialization guard poisoned"))?;
            E::build(&env_config, seed)?
        };
        let mut agent = A::build(agent_config)?;
        let mut recorder = NullRecorder::new();

        Rollout::<E, A>::new(id, rollout_config, client, stop).run(
            &mut env,
            &mut agent,
            &mut recorder,
        )
    }

    /// Stops actor threads.
    pub fn stop(&self) {
        if let Ok(mut stop) = self.stop.lock() {
            *stop = true;
        }
    }

    /// Waits until all actors finish and returns their stats, ordered by actor id.
    ///
    /// Fails with the error of the first actor that failed.
    pub fn join(self) -> Result<Vec<RolloutStat>> {
        let n_threads = self.threads.len();
        for h in self.threads {
            h.join().map_err(|_| anyhow!("an actor thread panicked"))?;
        }
        info!("Joined {} actor threads", n_threads);

        let mut results = self.stat_receiver.try_iter().collect::<Vec<_>>();
        results.sort_by_key(|(id, _)| *id);
        results.into_iter().map(|(_, stat)| stat).collect()
    }

    /// Stops and joins actors.
    pub fn stop_and_join(self) -> Result<Vec<RolloutStat>> {
        self.stop();
        self.join()
    }
}
