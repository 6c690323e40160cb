use super::{RolloutConfig, RolloutStat};
use crate::{ParameterClient, ParameterSerialize};
use anyhow::Result;
use herald_core::{
    record::{Record, RecordValue, Recorder},
    Agent, Env,
};
use log::{debug, info};
use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
    time::SystemTime,
};

/// Drives one agent against one environment.
///
/// Parameters are pulled from the broadcaster when the loop starts and every
/// time an episode ends, right before the environment is reset. Within an
/// episode the agent keeps the parameters it started with.
pub struct Rollout<E, A>
where
    E: Env,
    A: Agent<E> + ParameterSerialize,
{
    id: usize,
    config: RolloutConfig,
    client: ParameterClient,

    /// Stops the loop if this flag is set to `true`.
    stop: Arc<Mutex<bool>>,

    phantom: PhantomData<(E, A)>,
}

impl<E, A> Rollout<E, A>
where
    E: Env,
    A: Agent<E> + ParameterSerialize,
{
    /// Constructs a [`Rollout`].
    pub fn new(
        id: usize,
        config: RolloutConfig,
        client: ParameterClient,
        stop: Arc<Mutex<bool>>,
    ) -> Self {
        Self {
            id,
            config,
            client,
            stop,
            phantom: PhantomData,
        }
    }

    fn is_stopped(&self) -> bool {
        // A poisoned flag means another thread panicked; stop as well.
        self.stop.lock().map(|stop| *stop).unwrap_or(true)
    }

    /// Pulls newer parameters, if any. Returns `true` if they were adopted.
    fn refresh(&mut self, agent: &mut A) -> Result<bool> {
        match self.client.pull(agent)? {
            Some(info) => {
                debug!(
                    "Actor {} adopted parameters version {} ({})",
                    self.id, info.version, info.message
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs the loop until the stop flag is set or a limit in
    /// [`RolloutConfig`] is reached.
    ///
    /// A record is written to `recorder` at the end of every episode.
    pub fn run<R: Recorder>(
        &mut self,
        env: &mut E,
        agent: &mut A,
        recorder: &mut R,
    ) -> Result<RolloutStat> {
        let time = SystemTime::now();
        let mut stat = RolloutStat::default();

        agent.set_mode(self.config.mode);
        if self.config.wait_initial_params {
            let held = self.client.info().cloned();
            let info = self.client.wait_and_pull(agent, self.config.pull_timeout())?;
            if held.as_ref() != Some(&info) {
                stat.param_updates += 1;
            }
        } else if self.refresh(agent)? {
            stat.param_updates += 1;
        }
        info!(
            "Actor {} starts with parameters {:?}",
            self.id,
            self.client.info().map(|info| info.version)
        );

        let (mut obs, _) = env.reset()?;
        agent.reset_episode();
        let mut episode_return = 0f32;
        let mut episode_length = 0usize;

        loop {
            if self.is_stopped() {
                break;
            }

            let act = agent.sample(&obs)?;
            let step = env.step(&act)?;
            episode_return += step.reward;
            episode_length += 1;
            stat.env_steps += 1;

            if step.is_done() {
                stat.episodes += 1;
                let version = self.client.info().map(|info| info.version);
                recorder.write(Record::from_slice(&[
                    ("episode", RecordValue::Scalar(stat.episodes as f32)),
                    ("episode_return", RecordValue::Scalar(episode_return)),
                    ("episode_length", RecordValue::Scalar(episode_length as f32)),
                    (
                        "param_version",
                        RecordValue::Scalar(version.unwrap_or(0) as f32),
                    ),
                ]));
                info!(
                    "Actor {}, episode {}, return {}, length {}, parameters {:?}",
                    self.id, stat.episodes, episode_return, episode_length, version
                );

                if self.refresh(agent)? {
                    stat.param_updates += 1;
                }
                if let Some(max_episodes) = self.config.max_episodes {
                    if stat.episodes >= max_episodes {
                        break;
                    }
                }

                obs = env.reset()?.0;
                agent.reset_episode();
                episode_return = 0.0;
                episode_length = 0;
            } else {
                obs = step.obs;
            }

            if let Some(max_env_steps) = self.config.max_env_steps {
                if stat.env_steps >= max_env_steps {
                    break;
                }
            }
        }

        stat.last_version = self.client.info().map(|info| info.version);
        stat.duration = time.elapsed()?;
        info!("Actor {} stopped after {} env steps", self.id, stat.env_steps);

        Ok(stat)
    }
}
