use std::time::Duration;

/// Stats of the loop in each [`Rollout`](crate::Rollout).
#[derive(Clone, Debug, Default)]
pub struct RolloutStat {
    /// The number of steps for interaction between agent and env.
    pub env_steps: usize,

    /// The number of finished episodes.
    pub episodes: usize,

    /// The number of times newer parameters were adopted.
    pub param_updates: usize,

    /// Version of the parameters in use when the loop stopped.
    pub last_version: Option<u64>,

    /// Duration of the loop.
    pub duration: Duration,
}

/// Returns a formatted string of the set of [`RolloutStat`] for reporting.
pub fn rollout_stats_fmt(stats: &[RolloutStat]) -> String {
    let mut s = "actor id, env steps, episodes, param updates, steps per sec\n".to_string();
    for (i, stat) in stats.iter().enumerate() {
        let n = stat.env_steps;
        let d = stat.duration.as_secs_f32();
        let p = if d > 0.0 { (n as f32) / d } else { 0.0 };
        s += format!(
            "{}, {}, {}, {}, {}\n",
            i, n, stat.episodes, stat.param_updates, p
        )
        .as_str();
    }
    s
}
