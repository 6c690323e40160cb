use anyhow::{anyhow, Result};
use herald_core::{
    record::{BufferedRecorder, Record},
    Act, Agent, AgentMode, Configurable, Env, Obs, Policy, Step,
};
use herald_ps::{
    error::PsError, ActorManager, ActorManagerConfig, Broadcaster, BroadcasterConfig,
    MemoryChannel, ParameterClient, ParameterSerialize, PubSub, Rollout, RolloutConfig,
};
use std::{
    convert::TryInto,
    sync::{Arc, Mutex},
    time::Duration,
};
use test_log::test;

#[derive(Clone, Debug)]
struct CountObs(f32);

impl Obs for CountObs {}

#[derive(Clone, Debug)]
struct GainAct(f32);

impl Act for GainAct {}

/// Episodes of fixed length; the reward is the action.
struct CountdownEnv {
    episode_len: usize,
    t: usize,
    on_done: Option<Box<dyn FnMut()>>,
}

impl Env for CountdownEnv {
    type Config = usize;
    type Obs = CountObs;
    type Act = GainAct;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            episode_len: *config,
            t: 0,
            on_done: None,
        })
    }

    fn reset(&mut self) -> Result<(CountObs, ())> {
        self.t = 0;
        Ok((CountObs(0.0), ()))
    }

    fn step(&mut self, a: &GainAct) -> Result<Step<Self>> {
        self.t += 1;
        let done = self.t >= self.episode_len;
        if done {
            if let Some(on_done) = self.on_done.as_mut() {
                on_done();
            }
        }
        Ok(Step::new(CountObs(self.t as f32), a.0, done, false, ()))
    }
}

/// Acts with a constant action equal to its only parameter.
#[derive(Clone)]
struct GainAgent {
    gain: f32,
    mode: AgentMode,
}

impl Policy<CountdownEnv> for GainAgent {
    fn sample(&mut self, _obs: &CountObs) -> Result<GainAct> {
        Ok(GainAct(self.gain))
    }
}

impl Agent<CountdownEnv> for GainAgent {
    fn set_mode(&mut self, mode: AgentMode) {
        self.mode = mode;
    }

    fn mode(&self) -> AgentMode {
        self.mode
    }
}

impl Configurable for GainAgent {
    type Config = f32;

    fn build(config: f32) -> Result<Self> {
        Ok(Self {
            gain: config,
            mode: AgentMode::default(),
        })
    }
}

impl ParameterSerialize for GainAgent {
    fn parameters_to_binary(&self) -> Result<Vec<u8>> {
        Ok(self.gain.to_le_bytes().to_vec())
    }

    fn binary_to_parameters(&mut self, binary: &[u8]) -> Result<()> {
        let bytes: [u8; 4] = binary
            .try_into()
            .map_err(|_| anyhow!("expected 4 bytes, got {}", binary.len()))?;
        self.gain = f32::from_le_bytes(bytes);
        Ok(())
    }
}

fn channel() -> Arc<dyn PubSub> {
    MemoryChannel::shared()
}

fn episode_returns(recorder: &BufferedRecorder) -> Vec<f32> {
    recorder
        .iter()
        .map(|r: &Record| r.get_scalar("episode_return").unwrap())
        .collect()
}

#[test]
fn test_broadcast_then_pull() -> Result<()> {
    let channel = channel();
    let broadcaster = Broadcaster::build(&BroadcasterConfig::default().debug(true), channel.clone());
    let learner = GainAgent::build(2.5)?;
    let mut actor = GainAgent::build(0.0)?;
    let mut client = ParameterClient::new("ps", channel);

    assert!(client.pull(&mut actor)?.is_none());
    assert_eq!(broadcaster.broadcast(&learner, "opt_steps=10")?, 1);

    let info = client.pull(&mut actor)?.unwrap();
    assert_eq!(info.version, 1);
    assert_eq!(info.message, "opt_steps=10");
    assert_eq!(actor.gain, 2.5);

    // Nothing newer
    assert!(client.pull(&mut actor)?.is_none());
    assert_eq!(client.info().unwrap().version, 1);
    Ok(())
}

#[test]
fn test_late_subscriber_sees_latest_only() -> Result<()> {
    let channel = channel();
    let broadcaster = Broadcaster::build(&BroadcasterConfig::default(), channel.clone());
    for gain in &[1.0f32, 2.0, 3.0] {
        broadcaster.broadcast(&GainAgent::build(*gain)?, format!("gain={}", gain))?;
    }

    let mut actor = GainAgent::build(0.0)?;
    let mut client = ParameterClient::new("ps", channel);
    let info = client.pull(&mut actor)?.unwrap();
    assert_eq!(info.version, 3);
    assert_eq!(info.message, "gain=3");
    assert_eq!(actor.gain, 3.0);
    Ok(())
}

#[test]
fn test_broadcasters_are_keyed_by_name() -> Result<()> {
    let channel = channel();
    let b1 = Broadcaster::build(&BroadcasterConfig::default().name("a"), channel.clone());
    let b2 = Broadcaster::build(&BroadcasterConfig::default().name("b"), channel.clone());
    b1.broadcast(&GainAgent::build(1.0)?, "")?;
    b2.broadcast(&GainAgent::build(2.0)?, "")?;

    let mut actor = GainAgent::build(0.0)?;
    ParameterClient::new("b", channel).pull(&mut actor)?;
    assert_eq!(actor.gain, 2.0);
    Ok(())
}

#[test]
fn test_wait_and_pull_times_out() -> Result<()> {
    let mut actor = GainAgent::build(0.0)?;
    let mut client = ParameterClient::new("ps", channel());
    let err = client
        .wait_and_pull(&mut actor, Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PsError>(),
        Some(PsError::Timeout { .. })
    ));
    Ok(())
}

#[test]
fn test_client_follows_rebuilt_broadcaster() -> Result<()> {
    let channel = channel();
    let b1 = Broadcaster::build(&BroadcasterConfig::default(), channel.clone());
    for gain in &[1.0f32, 2.0, 3.0] {
        b1.broadcast(&GainAgent::build(*gain)?, "")?;
    }
    let mut actor = GainAgent::build(0.0)?;
    let mut client = ParameterClient::new("ps", channel.clone());
    assert_eq!(client.pull(&mut actor)?.unwrap().version, 3);

    // A restarted learner publishes under the same name from version 1.
    let b2 = Broadcaster::build(&BroadcasterConfig::default(), channel);
    assert_ne!(b1.epoch(), b2.epoch());
    assert_eq!(b2.broadcast(&GainAgent::build(42.0)?, "restarted")?, 1);

    let info = client.pull(&mut actor)?.unwrap();
    assert_eq!(info.epoch, b2.epoch());
    assert_eq!(info.version, 1);
    assert_eq!(info.message, "restarted");
    assert_eq!(actor.gain, 42.0);
    assert!(client.pull(&mut actor)?.is_none());
    Ok(())
}

#[test]
fn test_concurrent_broadcasts_keep_latest_version() -> Result<()> {
    let channel = channel();
    let broadcaster = Arc::new(Broadcaster::build(
        &BroadcasterConfig::default(),
        channel.clone(),
    ));

    let handles = (0..8)
        .map(|i| {
            let broadcaster = broadcaster.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    broadcaster
                        .broadcast(&GainAgent::build(i as f32).unwrap(), "")
                        .unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for h in handles {
        h.join().unwrap();
    }

    let payload = ParameterClient::new("ps", channel).fetch()?.unwrap();
    assert_eq!(broadcaster.version(), 400);
    assert_eq!(payload.version, 400);
    assert_eq!(payload.epoch, broadcaster.epoch());
    Ok(())
}

#[test]
fn test_rollout_refreshes_after_every_episode() -> Result<()> {
    let channel = channel();
    let broadcaster = Arc::new(Broadcaster::build(
        &BroadcasterConfig::default(),
        channel.clone(),
    ));
    broadcaster.broadcast(&GainAgent::build(1.0)?, "initial")?;

    // The learner publishes new parameters whenever an episode ends.
    let mut env = CountdownEnv::build(&3, 0)?;
    {
        let broadcaster = broadcaster.clone();
        let mut gain = 1.0;
        env.on_done = Some(Box::new(move || {
            gain += 1.0;
            broadcaster
                .broadcast(&GainAgent { gain, mode: AgentMode::Training }, "")
                .unwrap();
        }));
    }

    let mut agent = GainAgent::build(0.0)?;
    let config = RolloutConfig::default()
        .mode(AgentMode::EvalDeterministic)
        .max_episodes(3);
    let stop = Arc::new(Mutex::new(false));
    let mut recorder = BufferedRecorder::new();
    let stat = Rollout::new(0, config, ParameterClient::new("ps", channel), stop)
        .run(&mut env, &mut agent, &mut recorder)?;

    assert_eq!(agent.mode(), AgentMode::EvalDeterministic);
    assert_eq!(stat.episodes, 3);
    assert_eq!(stat.env_steps, 9);
    assert_eq!(stat.param_updates, 4);
    assert_eq!(stat.last_version, Some(4));

    // Every episode runs with the parameters of the previous refresh.
    assert_eq!(episode_returns(&recorder), vec![3.0, 6.0, 9.0]);
    let versions = recorder
        .iter()
        .map(|r| r.get_scalar("param_version").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(versions, vec![1.0, 2.0, 3.0]);
    Ok(())
}

#[test]
fn test_rollout_without_published_parameters() -> Result<()> {
    let mut env = CountdownEnv::build(&2, 0)?;
    let mut agent = GainAgent::build(0.5)?;
    let config = RolloutConfig::default()
        .wait_initial_params(false)
        .max_env_steps(5);
    let stop = Arc::new(Mutex::new(false));
    let mut recorder = BufferedRecorder::new();
    let stat = Rollout::new(0, config, ParameterClient::new("ps", channel()), stop)
        .run(&mut env, &mut agent, &mut recorder)?;

    // Keeps its own parameters and runs stale
    assert_eq!(stat.env_steps, 5);
    assert_eq!(stat.episodes, 2);
    assert_eq!(stat.param_updates, 0);
    assert_eq!(stat.last_version, None);
    assert_eq!(episode_returns(&recorder), vec![1.0, 1.0]);
    Ok(())
}

#[test]
fn test_rollout_stops_on_flag() -> Result<()> {
    let channel = channel();
    Broadcaster::build(&BroadcasterConfig::default(), channel.clone())
        .broadcast(&GainAgent::build(1.0)?, "")?;
    let mut env = CountdownEnv::build(&10, 0)?;
    let mut agent = GainAgent::build(0.0)?;
    let stop = Arc::new(Mutex::new(true));
    let stat = Rollout::new(0, RolloutConfig::default(), ParameterClient::new("ps", channel), stop)
        .run(&mut env, &mut agent, &mut BufferedRecorder::new())?;
    assert_eq!(stat.env_steps, 0);
    Ok(())
}

#[test]
fn test_rollout_counts_only_adopted_parameters() -> Result<()> {
    let channel = channel();
    Broadcaster::build(&BroadcasterConfig::default(), channel.clone())
        .broadcast(&GainAgent::build(1.0)?, "")?;

    // The client already holds the only published version.
    let mut agent = GainAgent::build(0.0)?;
    let mut client = ParameterClient::new("ps", channel);
    client.pull(&mut agent)?;

    let mut env = CountdownEnv::build(&2, 0)?;
    let config = RolloutConfig::default().max_episodes(1);
    let stop = Arc::new(Mutex::new(false));
    let stat = Rollout::new(0, config, client, stop)
        .run(&mut env, &mut agent, &mut BufferedRecorder::new())?;

    assert_eq!(stat.episodes, 1);
    assert_eq!(stat.param_updates, 0);
    assert_eq!(stat.last_version, Some(1));
    assert_eq!(agent.gain, 1.0);
    Ok(())
}

#[test]
fn test_actor_manager() -> Result<()> {
    type ActorManager_ = ActorManager<CountdownEnv, GainAgent>;

    let channel = channel();
    let broadcaster = Broadcaster::build(&BroadcasterConfig::default(), channel.clone());
    let stop = Arc::new(Mutex::new(false));
    let guard_init_env = Arc::new(Mutex::new(true));
    let config = ActorManagerConfig::new(2)
        .rollout(RolloutConfig::default().pull_timeout_ms(10_000));

    let mut actors = ActorManager_::build(
        &config,
        &[0.0, 0.0],
        &4,
        broadcaster.name(),
        channel,
        stop,
    )?;
    actors.run(guard_init_env);

    // Actors block until the first parameters arrive.
    std::thread::sleep(Duration::from_millis(50));
    broadcaster.broadcast(&GainAgent::build(1.0)?, "first")?;
    std::thread::sleep(Duration::from_millis(50));
    broadcaster.broadcast(&GainAgent::build(2.0)?, "second")?;
    std::thread::sleep(Duration::from_millis(50));

    let stats = actors.stop_and_join()?;
    assert_eq!(stats.len(), 2);
    for stat in stats.iter() {
        assert!(stat.env_steps > 0);
        assert!(stat.episodes > 0);
        assert_eq!(stat.last_version, Some(2));
    }
    Ok(())
}

#[test]
fn test_actor_manager_rejects_config_mismatch() {
    let result = ActorManager::<CountdownEnv, GainAgent>::build(
        &ActorManagerConfig::new(3),
        &[0.0],
        &4,
        "ps",
        channel(),
        Arc::new(Mutex::new(false)),
    );
    assert!(result.is_err());
}
