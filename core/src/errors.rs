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

use thiserror::Error;

use crate::definitions::{Region, SlotIndex, StreamId};

/// Catalog misconfiguration. Always a startup-time error.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog declares no regions")]
    NoRegions,

    #[error("Region {0} has no streams")]
    EmptyRegion(Region),

    #[error("Region {0} is declared more than once")]
    DuplicateRegion(Region),

    #[error("Region global is derived and cannot be declared")]
    GlobalDeclared,

    #[error("Stream {id} is declared under {declared} but describes itself as {actual}")]
    RegionMismatch {
        id: StreamId,
        declared: Region,
        actual: Region,
    },

    #[error("Malformed catalog document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Slot count must be at least 1")]
    NoSlots,

    #[error("Failover delay must be greater than zero")]
    ZeroFailoverDelay,

    #[error("Unmute volume {0} is out of range 0..=100")]
    VolumeOutOfRange(u8),

    #[error("Event capacity must be at least 1")]
    ZeroEventCapacity,

    #[error("Refresh interval must be greater than zero; leave it unset to disable refresh")]
    ZeroRefreshInterval,

    #[error("Invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors returned to callers of the supervisor for invalid requests.
/// Playback failures never surface here.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("Slot {0} does not exist")]
    UnknownSlot(SlotIndex),

    #[error("Candidate {index} is out of range for slot {slot} (pool has {pool_len})")]
    CandidateOutOfRange {
        slot: SlotIndex,
        index: usize,
        pool_len: usize,
    },

    #[error("Slot {0} is disposed")]
    Disposed(SlotIndex),

    #[error("Supervisor is stopped")]
    Stopped,
}
