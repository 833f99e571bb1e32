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

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::definitions::SlotIndex;
use crate::player_events::{Generation, SlotSignal};

#[derive(Error, Debug, PartialEq, Clone)]
pub enum PlayerError {
    #[error("Feature not supported")]
    FeatureNotSupported,

    #[error("Source rejected: {0}")]
    SourceRejected(String),

    #[error("Player destroyed")]
    Destroyed,
}

/// Channel a player uses to report on the candidate it was attached to.
///
/// A sink is bound to one slot and one generation; events sent through a sink
/// of an abandoned generation reach the supervisor and are discarded there.
#[derive(Clone, Debug)]
pub struct PlayerEventSink {
    slot: SlotIndex,
    generation: Generation,
    tx: UnboundedSender<SlotSignal>,
}

impl PlayerEventSink {
    pub fn new(slot: SlotIndex, generation: Generation, tx: UnboundedSender<SlotSignal>) -> Self {
        Self { slot, generation, tx }
    }

    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn ready(&self) {
        self.send(SlotSignal::PlayerReady { slot: self.slot, generation: self.generation });
    }

    pub fn error(&self, info: impl Into<String>) {
        self.send(SlotSignal::PlayerError {
            slot: self.slot,
            generation: self.generation,
            info: info.into(),
        });
    }

    fn send(&self, signal: SlotSignal) {
        if self.tx.send(signal).is_err() {
            debug!("Slot {} signal dropped; supervisor is gone", self.slot);
        }
    }
}

/// Embeddable player capability driving one slot.
///
/// The supervisor does not know what transport sits behind it. `attach` starts
/// loading a source and returns; the outcome is reported later through `sink`.
#[async_trait]
pub trait EmbedPlayer: Send + Sync {
    async fn attach(&self, source_locator: &str, sink: PlayerEventSink) -> Result<(), PlayerError>;

    async fn mute(&self) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }

    async fn unmute(&self, _volume: u8) -> Result<(), PlayerError> {
        Err(PlayerError::FeatureNotSupported)
    }

    async fn destroy(&self) -> Result<(), PlayerError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Player {
    player_impl: Arc<dyn EmbedPlayer + Sync + Send>,
}

impl Player {
    pub fn new(player_impl: Arc<dyn EmbedPlayer + Sync + Send>) -> Self {
        Self { player_impl }
    }
}

#[async_trait]
impl EmbedPlayer for Player {
    async fn attach(&self, source_locator: &str, sink: PlayerEventSink) -> Result<(), PlayerError> {
        self.player_impl.attach(source_locator, sink).await
    }
    async fn mute(&self) -> Result<(), PlayerError> {
        self.player_impl.mute().await
    }
    async fn unmute(&self, volume: u8) -> Result<(), PlayerError> {
        self.player_impl.unmute(volume).await
    }
    async fn destroy(&self) -> Result<(), PlayerError> {
        self.player_impl.destroy().await
    }
}

/// Creates the player instance backing a slot.
pub trait PlayerFactory: Send + Sync {
    fn create_player(&self, slot: SlotIndex) -> Player;
}

impl<F> PlayerFactory for F
where
    F: Fn(SlotIndex) -> Player + Send + Sync,
{
    fn create_player(&self, slot: SlotIndex) -> Player {
        self(slot)
    }
}
