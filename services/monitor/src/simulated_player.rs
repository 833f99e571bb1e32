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

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use sitmon_core::{EmbedPlayer, Player, PlayerError, PlayerEventSink, SlotIndex};
use tokio::task::JoinHandle;

/// Stand-in for an embedded video player: "loads" a source for a while, then
/// reports ready, or an error when the source is marked offline.
pub struct SimulatedPlayer {
    slot: SlotIndex,
    dead_sources: Arc<HashSet<String>>,
    load_time: Duration,
    sink: Mutex<Option<PlayerEventSink>>,
    loading: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl SimulatedPlayer {
    pub fn new(slot: SlotIndex, dead_sources: Arc<HashSet<String>>, load_time: Duration) -> Self {
        Self {
            slot,
            dead_sources,
            load_time,
            sink: Mutex::new(None),
            loading: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Reports a playback error for whatever is currently attached.
    pub fn fail(&self) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => {
                sink.error("forced failure");
                true
            }
            None => false,
        }
    }

    fn stop_loading(&self) {
        if let Some(task) = self.loading.lock().unwrap().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl EmbedPlayer for SimulatedPlayer {
    async fn attach(&self, source_locator: &str, sink: PlayerEventSink) -> Result<(), PlayerError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(PlayerError::Destroyed);
        }
        self.stop_loading();
        debug!("Player {} loading {}", self.slot, source_locator);

        let offline = self.dead_sources.contains(source_locator);
        let load_time = self.load_time;
        let reporter = sink.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(load_time).await;
            if offline {
                reporter.error("stream offline");
            } else {
                reporter.ready();
            }
        });

        *self.sink.lock().unwrap() = Some(sink);
        *self.loading.lock().unwrap() = Some(task);
        Ok(())
    }

    async fn mute(&self) -> Result<(), PlayerError> {
        debug!("Player {} muted", self.slot);
        Ok(())
    }

    async fn unmute(&self, volume: u8) -> Result<(), PlayerError> {
        info!("Player {} unmuted at volume {}", self.slot, volume);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), PlayerError> {
        self.destroyed.store(true, Ordering::SeqCst);
        self.stop_loading();
        self.sink.lock().unwrap().take();
        Ok(())
    }
}

/// Keeps the players created for each slot so the console can poke them.
#[derive(Clone, Default)]
pub struct PlayerRegistry {
    players: Arc<Mutex<Vec<Arc<SimulatedPlayer>>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self, dead_sources: HashSet<String>, load_time: Duration) -> impl Fn(SlotIndex) -> Player + Send + Sync + 'static {
        let players = self.players.clone();
        let dead_sources = Arc::new(dead_sources);
        move |slot| {
            let player = Arc::new(SimulatedPlayer::new(slot, dead_sources.clone(), load_time));
            players.lock().unwrap().push(player.clone());
            Player::new(player)
        }
    }

    pub fn get(&self, slot: SlotIndex) -> Option<Arc<SimulatedPlayer>> {
        self.players.lock().unwrap().iter().find(|p| p.slot == slot).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitmon_core::{PlayerFactory, SlotSignal};
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn reports_ready_or_offline_after_load_time() {
        let dead = Arc::new(HashSet::from(["down".to_string()]));
        let player = SimulatedPlayer::new(1, dead, Duration::from_millis(300));
        let (tx, mut rx) = mpsc::unbounded_channel();

        player.attach("up", PlayerEventSink::new(1, 1, tx.clone())).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(rx.recv().await, Some(SlotSignal::PlayerReady { slot: 1, generation: 1 }));

        player.attach("down", PlayerEventSink::new(1, 2, tx)).await.unwrap();
        assert!(matches!(rx.recv().await, Some(SlotSignal::PlayerError { generation: 2, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn reattach_abandons_the_previous_load() {
        let player = SimulatedPlayer::new(0, Arc::new(HashSet::new()), Duration::from_millis(300));
        let (tx, mut rx) = mpsc::unbounded_channel();

        player.attach("first", PlayerEventSink::new(0, 1, tx.clone())).await.unwrap();
        player.attach("second", PlayerEventSink::new(0, 2, tx)).await.unwrap();
        assert_eq!(rx.recv().await, Some(SlotSignal::PlayerReady { slot: 0, generation: 2 }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_player_refuses_new_sources() {
        let player = SimulatedPlayer::new(2, Arc::new(HashSet::new()), Duration::from_millis(300));
        let (tx, mut rx) = mpsc::unbounded_channel();

        player.attach("up", PlayerEventSink::new(2, 1, tx.clone())).await.unwrap();
        player.destroy().await.unwrap();
        assert_eq!(player.attach("up", PlayerEventSink::new(2, 2, tx)).await, Err(PlayerError::Destroyed));
        assert!(!player.fail());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn registry_tracks_players_by_slot() {
        let registry = PlayerRegistry::new();
        let factory = registry.factory(HashSet::new(), Duration::from_millis(1));
        let _ = factory.create_player(0);
        let _ = factory.create_player(3);
        assert!(registry.get(3).is_some());
        assert!(registry.get(1).is_none());
        assert!(!registry.get(0).unwrap().fail());
    }
}
