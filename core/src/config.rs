// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::definitions::Region;
use crate::errors::ConfigError;

pub const ENV_SLOT_COUNT: &str = "SITMON_SLOT_COUNT";
pub const ENV_FAILOVER_DELAY_MS: &str = "SITMON_FAILOVER_DELAY_MS";
pub const ENV_REFRESH_INTERVAL_MS: &str = "SITMON_REFRESH_INTERVAL_MS";
pub const ENV_UNMUTE_VOLUME: &str = "SITMON_UNMUTE_VOLUME";
pub const ENV_INITIAL_REGION: &str = "SITMON_INITIAL_REGION";

/// Tunables of the slot supervisors.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Number of display slots; also the minimum pool size requested from the resolver.
    pub slot_count: usize,
    /// Wait between a playback error and the automatic advance to the next candidate.
    pub failover_delay: Duration,
    /// Periodic re-attach of every slot; `None` disables it.
    pub refresh_interval: Option<Duration>,
    /// Volume passed to the player when a slot becomes audible.
    pub unmute_volume: u8,
    /// Capacity of the dashboard event broadcast channel.
    pub event_capacity: usize,
    pub initial_region: Region,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            slot_count: 4,
            failover_delay: Duration::from_secs(1),
            refresh_interval: Some(Duration::from_secs(300)),
            unmute_volume: 100,
            event_capacity: 100,
            initial_region: Region::Global,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigDocument {
    slot_count: Option<usize>,
    failover_delay_ms: Option<u64>,
    /// 0 disables periodic refresh.
    refresh_interval_ms: Option<u64>,
    unmute_volume: Option<u8>,
    event_capacity: Option<usize>,
    initial_region: Option<Region>,
}

impl SupervisorConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDocument = serde_json::from_str(json)?;
        let mut config = Self::default();
        if let Some(v) = doc.slot_count {
            config.slot_count = v;
        }
        if let Some(v) = doc.failover_delay_ms {
            config.failover_delay = Duration::from_millis(v);
        }
        if let Some(v) = doc.refresh_interval_ms {
            config.refresh_interval = refresh_from_millis(v);
        }
        if let Some(v) = doc.unmute_volume {
            config.unmute_volume = v;
        }
        if let Some(v) = doc.event_capacity {
            config.event_capacity = v;
        }
        if let Some(v) = doc.initial_region {
            config.initial_region = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        debug!("Loading supervisor config from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    /// Applies `SITMON_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = lookup(ENV_SLOT_COUNT) {
            self.slot_count = parse_env(ENV_SLOT_COUNT, v)?;
        }
        if let Some(v) = lookup(ENV_FAILOVER_DELAY_MS) {
            self.failover_delay = Duration::from_millis(parse_env(ENV_FAILOVER_DELAY_MS, v)?);
        }
        if let Some(v) = lookup(ENV_REFRESH_INTERVAL_MS) {
            self.refresh_interval = refresh_from_millis(parse_env(ENV_REFRESH_INTERVAL_MS, v)?);
        }
        if let Some(v) = lookup(ENV_UNMUTE_VOLUME) {
            self.unmute_volume = parse_env(ENV_UNMUTE_VOLUME, v)?;
        }
        if let Some(v) = lookup(ENV_INITIAL_REGION) {
            self.initial_region = parse_env(ENV_INITIAL_REGION, v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_count == 0 {
            return Err(ConfigError::NoSlots);
        }
        if self.failover_delay.is_zero() {
            return Err(ConfigError::ZeroFailoverDelay);
        }
        if self.unmute_volume > 100 {
            return Err(ConfigError::VolumeOutOfRange(self.unmute_volume));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        if self.refresh_interval.is_some_and(|period| period.is_zero()) {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        Ok(())
    }
}

fn refresh_from_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv { key, value })
}
