//! Bounded polling for long-running remote operations

use crate::error::HardenError;
use std::thread;
use std::time::Duration;

/// Interval and upper bound for [`wait_until`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            timeout: Duration::from_secs(1800),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Probe until it reports completion or the timeout is exceeded
///
/// Elapsed time is counted in whole intervals, not wall clock. Exceeding the
/// timeout is a stop condition for the current topic.
pub fn wait_until<F>(config: &PollConfig, what: &str, mut probe: F) -> Result<(), HardenError>
where
    F: FnMut() -> Result<bool, HardenError>,
{
    let mut waited = Duration::ZERO;
    loop {
        if probe()? {
            return Ok(());
        }
        if waited >= config.timeout {
            return Err(HardenError::stop(format!(
                "{what} timeout reached after {}s",
                config.timeout.as_secs()
            )));
        }
        log::debug!("{what}: not finished, waiting {:?}", config.interval);
        thread::sleep(config.interval);
        waited += config.interval.max(Duration::from_millis(1));
    }
}
