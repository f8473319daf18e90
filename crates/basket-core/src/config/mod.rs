//! Sync tuning shared by every host.
//!
//! Defaults run a cycle every 30 seconds.
//! Hosts may overlay `BASKET_*` environment variables on top of them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_INTERVAL_SECS: u64 = 30;
const DEFAULT_PULL_SKEW_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PUSH_CONCURRENCY: usize = 4;

const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_PULL_SKEW: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MAX_PUSH_CONCURRENCY: usize = 64;

/// Timing and fan-out knobs for the sync orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Delay between the end of one cycle and the start of the next
    pub interval: Duration,
    /// How far before the last watermark each pull starts looking
    pub pull_skew: Duration,
    /// Upper bound for a single remote request
    pub request_timeout: Duration,
    /// Pushes allowed in flight at once
    pub push_concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            pull_skew: Duration::from_secs(DEFAULT_PULL_SKEW_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            push_concurrency: DEFAULT_PUSH_CONCURRENCY,
        }
    }
}

impl SyncSettings {
    /// Defaults overlaid with `BASKET_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup; unparsable values are ignored.
    #[must_use]
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secs) = read_number::<u64>(&lookup, "BASKET_SYNC_INTERVAL_SECS") {
            self.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_number::<u64>(&lookup, "BASKET_PULL_SKEW_SECS") {
            self.pull_skew = Duration::from_secs(secs);
        }
        if let Some(secs) = read_number::<u64>(&lookup, "BASKET_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(count) = read_number::<usize>(&lookup, "BASKET_PUSH_CONCURRENCY") {
            self.push_concurrency = count;
        }
        self.clamped()
    }

    /// Bring every knob into a usable range.
    ///
    /// Interval and skew stay within a day, requests within ten minutes,
    /// and between 1 and 64 pushes run at once.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.interval = self.interval.clamp(Duration::from_secs(1), MAX_INTERVAL);
        self.pull_skew = self.pull_skew.min(MAX_PULL_SKEW);
        self.request_timeout = self
            .request_timeout
            .clamp(Duration::from_secs(1), MAX_REQUEST_TIMEOUT);
        self.push_concurrency = self.push_concurrency.clamp(1, MAX_PUSH_CONCURRENCY);
        self
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

fn read_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!("Ignoring invalid {key}={raw:?}");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_sync_every_thirty_seconds() {
        let settings = SyncSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.pull_skew, Duration::from_secs(5));
        assert_eq!(settings.push_concurrency, 4);
    }

    #[test]
    fn overlay_reads_valid_values() {
        let settings = SyncSettings::default().overlay(lookup(&[
            ("BASKET_SYNC_INTERVAL_SECS", "90"),
            ("BASKET_PULL_SKEW_SECS", "0"),
            ("BASKET_PUSH_CONCURRENCY", " 8 "),
        ]));
        assert_eq!(settings.interval, Duration::from_secs(90));
        assert_eq!(settings.pull_skew, Duration::ZERO);
        assert_eq!(settings.push_concurrency, 8);
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn overlay_ignores_garbage_and_clamps() {
        let settings = SyncSettings::default().overlay(lookup(&[
            ("BASKET_SYNC_INTERVAL_SECS", "0"),
            ("BASKET_REQUEST_TIMEOUT_SECS", "soon"),
            ("BASKET_PUSH_CONCURRENCY", "0"),
        ]));
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.push_concurrency, 1);
    }

    #[test]
    fn overlay_caps_huge_values() {
        let max = u64::MAX.to_string();
        let settings = SyncSettings::default().overlay(lookup(&[
            ("BASKET_SYNC_INTERVAL_SECS", max.as_str()),
            ("BASKET_PULL_SKEW_SECS", max.as_str()),
            ("BASKET_REQUEST_TIMEOUT_SECS", max.as_str()),
            ("BASKET_PUSH_CONCURRENCY", "100000"),
        ]));
        assert_eq!(settings.interval, Duration::from_secs(86_400));
        assert_eq!(settings.pull_skew, Duration::from_secs(86_400));
        assert_eq!(settings.request_timeout, Duration::from_secs(600));
        assert_eq!(settings.push_concurrency, 64);
    }
}
