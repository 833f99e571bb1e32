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
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::audio_exclusivity::AudioExclusivityController;
use crate::catalog::RegionCatalog;
use crate::config::SupervisorConfig;
use crate::definitions::{Region, SlotIndex, StreamDescriptor};
use crate::errors::SupervisorError;
use crate::player::{EmbedPlayer, Player, PlayerEventSink};
use crate::player_events::{DashboardEvent, Generation, SlotSignal, TimerId};
use crate::pool_resolver::resolve_pool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    /// A candidate is attached and loading.
    Initializing,
    /// The attached candidate is playing.
    Ready,
    /// The attached candidate failed; an advance is scheduled.
    Failed,
    Disposed,
}

/// Collaborators and tunables shared by every slot of a dashboard.
#[derive(Clone)]
pub struct SlotContext {
    pub catalog: Arc<RegionCatalog>,
    pub audio: Arc<AudioExclusivityController>,
    pub signal_tx: UnboundedSender<SlotSignal>,
    pub events_tx: broadcast::Sender<DashboardEvent>,
    pub failover_delay: Duration,
    pub unmute_volume: u8,
    /// Pool size requested from the resolver, normally the slot count.
    pub minimum_pool_size: usize,
}

impl SlotContext {
    pub fn from_config(
        config: &SupervisorConfig,
        catalog: Arc<RegionCatalog>,
        audio: Arc<AudioExclusivityController>,
        signal_tx: UnboundedSender<SlotSignal>,
        events_tx: broadcast::Sender<DashboardEvent>,
    ) -> Self {
        Self {
            catalog,
            audio,
            signal_tx,
            events_tx,
            failover_delay: config.failover_delay,
            unmute_volume: config.unmute_volume,
            minimum_pool_size: config.slot_count,
        }
    }
}

/// Point-in-time view of a slot, for labels, status output and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSnapshot {
    pub slot: SlotIndex,
    pub region: Region,
    pub phase: SlotPhase,
    pub cursor: usize,
    pub current: Option<StreamDescriptor>,
    pub pool: Vec<String>,
    pub generation: Generation,
    pub failure_count: u64,
    pub failover_pending: bool,
    pub audible: bool,
}

struct PendingFailover {
    timer: TimerId,
    handle: JoinHandle<()>,
}

/// Supervises the live stream shown in one display slot.
///
/// Owns the slot's candidate pool and cursor, attaches the player to the
/// current candidate and advances through the pool when playback fails. All
/// methods are expected to run on a single task; nothing here is shared.
pub struct SlotSupervisor {
    slot_index: SlotIndex,
    player: Player,
    ctx: SlotContext,

    region: Region,
    candidate_pool: Vec<StreamDescriptor>,
    candidate_cursor: usize,
    phase: SlotPhase,
    generation: Generation,
    next_timer: TimerId,
    pending_failover: Option<PendingFailover>,
    failure_count: u64,
}

impl SlotSupervisor {
    /// Resolves the pool for `region`, places the cursor at `slot_index mod pool_len`
    /// so neighbouring slots start on distinct streams, and attaches the player.
    pub async fn mount(slot_index: SlotIndex, region: Region, player: Player, ctx: SlotContext) -> Self {
        let mut supervisor = Self {
            slot_index,
            player,
            ctx,
            region,
            candidate_pool: Vec::new(),
            candidate_cursor: 0,
            phase: SlotPhase::Initializing,
            generation: 0,
            next_timer: 0,
            pending_failover: None,
            failure_count: 0,
        };
        supervisor.load_pool(region);
        debug!("Slot {} mounted on {} with {} candidates", slot_index, region, supervisor.candidate_pool.len());
        supervisor.attach_current().await;
        supervisor
    }

    pub fn slot_index(&self) -> SlotIndex {
        self.slot_index
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn phase(&self) -> SlotPhase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.candidate_cursor
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    pub fn candidate_pool(&self) -> &[StreamDescriptor] {
        &self.candidate_pool
    }

    pub fn current_stream(&self) -> Option<&StreamDescriptor> {
        self.candidate_pool.get(self.candidate_cursor)
    }

    pub fn has_pending_failover(&self) -> bool {
        self.pending_failover.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.phase == SlotPhase::Disposed
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            slot: self.slot_index,
            region: self.region,
            phase: self.phase,
            cursor: self.candidate_cursor,
            current: self.current_stream().cloned(),
            pool: self.candidate_pool.iter().map(|s| s.id.clone()).collect(),
            generation: self.generation,
            failure_count: self.failure_count,
            failover_pending: self.has_pending_failover(),
            audible: self.ctx.audio.is_audible(self.slot_index),
        }
    }

    /// Routes a player or timer signal addressed to this slot.
    pub async fn handle_signal(&mut self, signal: SlotSignal) {
        match signal {
            SlotSignal::PlayerReady { generation, .. } => self.on_player_ready(generation).await,
            SlotSignal::PlayerError { generation, info, .. } => self.on_player_error(generation, &info),
            SlotSignal::FailoverDue { generation, timer, .. } => self.on_failover_due(generation, timer).await,
        }
    }

    pub async fn on_player_ready(&mut self, generation: Generation) {
        if self.is_stale(generation, "ready") {
            return;
        }
        match self.phase {
            SlotPhase::Initializing => {
                self.phase = SlotPhase::Ready;
                if let Some(stream) = self.current_stream() {
                    info!("Slot {} playing {}", self.slot_index, stream.display_name);
                }
                self.apply_audio().await;
            }
            SlotPhase::Ready => self.apply_audio().await,
            SlotPhase::Failed => {
                debug!("Slot {} ignoring ready after failure; failover already scheduled", self.slot_index);
            }
            SlotPhase::Disposed => {}
        }
    }

    pub fn on_player_error(&mut self, generation: Generation, info: &str) {
        if self.is_stale(generation, "error") {
            return;
        }
        if let Some(stream) = self.current_stream() {
            warn!("Slot {} playback of {} failed: {}", self.slot_index, stream.id, info);
        }
        self.fail();
    }

    pub async fn on_failover_due(&mut self, generation: Generation, timer: TimerId) {
        if self.is_stale(generation, "failover") {
            return;
        }
        if !matches!(&self.pending_failover, Some(pending) if pending.timer == timer) {
            debug!("Slot {} ignoring superseded failover timer {}", self.slot_index, timer);
            return;
        }
        self.pending_failover = None;
        self.advance();
        self.attach_current().await;
    }

    /// User-requested "next": advances immediately, dropping any scheduled failover.
    pub async fn manual_cycle(&mut self) -> Result<(), SupervisorError> {
        self.ensure_live()?;
        self.cancel_failover();
        self.advance();
        self.attach_current().await;
        Ok(())
    }

    /// User-requested explicit pick of a pool entry.
    pub async fn select_candidate(&mut self, index: usize) -> Result<(), SupervisorError> {
        self.ensure_live()?;
        if index >= self.candidate_pool.len() {
            return Err(SupervisorError::CandidateOutOfRange {
                slot: self.slot_index,
                index,
                pool_len: self.candidate_pool.len(),
            });
        }
        self.cancel_failover();
        self.candidate_cursor = index;
        self.attach_current().await;
        Ok(())
    }

    pub async fn region_changed(&mut self, region: Region) {
        if self.is_disposed() {
            return;
        }
        self.cancel_failover();
        self.load_pool(region);
        debug!("Slot {} switched to {} with {} candidates", self.slot_index, region, self.candidate_pool.len());
        self.attach_current().await;
    }

    /// Re-attaches the current candidate so a stream that came back online is picked up.
    pub async fn refresh(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.attach_current().await;
    }

    /// Re-evaluates audibility against the exclusivity controller. Safe to call redundantly.
    pub async fn apply_audio(&self) {
        if self.is_disposed() {
            return;
        }
        let result = if self.ctx.audio.is_audible(self.slot_index) {
            self.player.unmute(self.ctx.unmute_volume).await
        } else {
            self.player.mute().await
        };
        if let Err(e) = result {
            debug!("Slot {} could not apply audio state: {}", self.slot_index, e);
        }
    }

    pub async fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.cancel_failover();
        self.generation += 1;
        self.phase = SlotPhase::Disposed;
        if let Err(e) = self.player.destroy().await {
            warn!("Slot {} player destroy failed: {}", self.slot_index, e);
        }
        debug!("Slot {} disposed", self.slot_index);
    }

    fn load_pool(&mut self, region: Region) {
        self.region = region;
        self.candidate_pool = resolve_pool(&self.ctx.catalog, region, self.ctx.minimum_pool_size);
        self.candidate_cursor = wrap(self.slot_index, self.candidate_pool.len());
    }

    fn advance(&mut self) {
        self.candidate_cursor = wrap(self.candidate_cursor + 1, self.candidate_pool.len());
    }

    /// Starts a new generation on the current candidate.
    async fn attach_current(&mut self) {
        self.cancel_failover();
        self.generation += 1;
        self.phase = SlotPhase::Initializing;

        let Some(stream) = self.current_stream().cloned() else {
            error!("Slot {} has an empty candidate pool for {}", self.slot_index, self.region);
            return;
        };
        info!(
            "Slot {} attaching {} ({}/{}) generation {}",
            self.slot_index,
            stream.display_name,
            self.candidate_cursor + 1,
            self.candidate_pool.len(),
            self.generation
        );

        let source_locator = stream.source_locator.clone();
        let _ = self.ctx.events_tx.send(DashboardEvent::NowShowing { slot: self.slot_index, stream });

        let sink = PlayerEventSink::new(self.slot_index, self.generation, self.ctx.signal_tx.clone());
        if let Err(e) = self.player.attach(&source_locator, sink).await {
            warn!("Slot {} attach failed: {}", self.slot_index, e);
            self.fail();
        }
    }

    fn fail(&mut self) {
        self.phase = SlotPhase::Failed;
        self.failure_count += 1;
        self.schedule_failover();
    }

    /// Replaces any pending failover with a fresh one, so a burst of errors yields one advance.
    fn schedule_failover(&mut self) {
        self.cancel_failover();
        self.next_timer += 1;
        let timer = self.next_timer;
        let slot = self.slot_index;
        let generation = self.generation;
        let delay = self.ctx.failover_delay;
        let tx = self.ctx.signal_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SlotSignal::FailoverDue { slot, generation, timer });
        });
        debug!("Slot {} failover {} scheduled in {:?}", slot, timer, delay);
        self.pending_failover = Some(PendingFailover { timer, handle });
    }

    fn cancel_failover(&mut self) {
        if let Some(pending) = self.pending_failover.take() {
            pending.handle.abort();
            debug!("Slot {} failover {} cancelled", self.slot_index, pending.timer);
        }
    }

    fn is_stale(&self, generation: Generation, what: &str) -> bool {
        if self.is_disposed() || generation != self.generation {
            debug!(
                "Slot {} discarding stale {} (generation {}, live {})",
                self.slot_index, what, generation, self.generation
            );
            return true;
        }
        false
    }

    fn ensure_live(&self) -> Result<(), SupervisorError> {
        if self.is_disposed() {
            return Err(SupervisorError::Disposed(self.slot_index));
        }
        Ok(())
    }
}

impl Drop for SlotSupervisor {
    fn drop(&mut self) {
        self.cancel_failover();
    }
}

fn wrap(index: usize, len: usize) -> usize {
    if len == 0 { 0 } else { index % len }
}
