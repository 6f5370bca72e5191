use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    /// Period of the predictions lock sweep.
    pub lock_sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_sweep_interval_secs: env::var("LOCK_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300), // 5 minutes
        }
    }
}
