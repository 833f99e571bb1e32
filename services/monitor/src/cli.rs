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

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use sitmon_core::{Region, SupervisorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the log level (RUST_LOG takes precedence)
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Supervisor config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stream catalog file (JSON); the built-in news line-up is used otherwise
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Region shown at startup
    #[arg(short, long)]
    pub region: Option<Region>,

    /// Number of display slots
    #[arg(short, long)]
    pub slots: Option<usize>,

    /// Delay before failing over to the next candidate, in milliseconds
    #[arg(long)]
    pub failover_delay_ms: Option<u64>,

    /// Stream ids the simulated players treat as offline
    #[arg(long = "dead", value_name = "STREAM_ID")]
    pub dead_streams: Vec<String>,

    /// Simulated time for a stream to start playing, in milliseconds
    #[arg(long, default_value_t = 300)]
    pub load_time_ms: u64,
}

impl Cli {
    /// Applies command line overrides on top of a file/environment config.
    pub fn apply_overrides(&self, mut config: SupervisorConfig) -> SupervisorConfig {
        if let Some(region) = self.region {
            config.initial_region = region;
        }
        if let Some(slots) = self.slots {
            config.slot_count = slots;
        }
        if let Some(ms) = self.failover_delay_ms {
            config.failover_delay = Duration::from_millis(ms);
        }
        config
    }
}
