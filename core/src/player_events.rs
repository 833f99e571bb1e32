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

use crate::definitions::{SlotIndex, StreamDescriptor};

/// Per-slot attach counter. Every re-attach gets a new value so callbacks of an
/// abandoned candidate can be told apart from the live one.
pub type Generation = u64;

/// Identifies one scheduled failover within a slot.
pub type TimerId = u64;

/// Signals flowing into the orchestrator loop from players and failover timers.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotSignal {
    /// The player attached for `generation` started playing.
    PlayerReady { slot: SlotIndex, generation: Generation },

    /// The player attached for `generation` reported a playback failure.
    PlayerError { slot: SlotIndex, generation: Generation, info: String },

    /// A failover timer scheduled while `generation` was live has elapsed.
    FailoverDue { slot: SlotIndex, generation: Generation, timer: TimerId },
}

impl SlotSignal {
    pub fn slot(&self) -> SlotIndex {
        match self {
            SlotSignal::PlayerReady { slot, .. }
            | SlotSignal::PlayerError { slot, .. }
            | SlotSignal::FailoverDue { slot, .. } => *slot,
        }
    }
}

/// Events published by the orchestrator for the dashboard shell (labels, audio indicator).
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// A slot attached a candidate; the label should show this stream.
    NowShowing { slot: SlotIndex, stream: StreamDescriptor },

    /// The audible slot changed. `None` means every slot is muted.
    AudioChanged { active: Option<SlotIndex> },
}
