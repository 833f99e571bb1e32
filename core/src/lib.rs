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

pub mod definitions;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod player;
pub mod player_events;
pub mod pool_resolver;
pub mod slot_supervisor;
pub mod audio_exclusivity;

mod orchestrator;
mod service;

pub use definitions::{Region, SlotIndex, StreamDescriptor, StreamId};
pub use catalog::RegionCatalog;
pub use config::SupervisorConfig;
pub use errors::{CatalogError, ConfigError, SupervisorError};
pub use player::{EmbedPlayer, Player, PlayerError, PlayerEventSink, PlayerFactory};
pub use player_events::{DashboardEvent, Generation, SlotSignal};
pub use pool_resolver::resolve_pool;
pub use slot_supervisor::{SlotPhase, SlotSnapshot, SlotSupervisor};
pub use audio_exclusivity::AudioExclusivityController;

pub use orchestrator::{DashboardCommand, Orchestrator, OrchestratorHandle};
pub use service::{spawn_service, MultiServiceHandle, ServiceHandle, StopHandle};
