use std::{env, str::FromStr, time::Duration};

use http::StatusCode;
use hyper::Uri;

use crate::health::DEFAULT_MAX_FAIL_COUNT;

/// Runtime knobs, built once from the environment and passed into the
/// components that need them. No ambient globals.
#[derive(Debug, Clone)]
pub struct Config {
    pub probe_target: Uri,
    pub probe_expected: StatusCode,
    pub probe_timeout: Duration,
    pub job_timeout: Duration,
    pub max_fail_count: i32,
    pub workers: usize,
    pub queue_depth: usize,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let probe_target = env::var("PROBE_TARGET")
            .unwrap_or("http://www.gstatic.com/generate_204".into())
            .parse()
            .expect("Invalid probe target");
        let probe_expected = StatusCode::from_u16(env_or("PROBE_EXPECTED_STATUS", 204))
            .expect("Invalid probe status");

        Self {
            probe_target,
            probe_expected,
            probe_timeout: Duration::from_secs(env_or("PROBE_TIMEOUT_SECS", 10)),
            job_timeout: Duration::from_secs(env_or("HEALTH_JOB_TIMEOUT_SECS", 30)),
            max_fail_count: env_or("MAX_FAIL_COUNT", DEFAULT_MAX_FAIL_COUNT),
            workers: env_or("HEALTH_WORKERS", 4),
            queue_depth: env_or("HEALTH_QUEUE_DEPTH", 256),
            sweep_interval: Duration::from_secs(env_or("SWEEP_INTERVAL_SECS", 300)),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
