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

use log::{debug, info, warn};
use tokio::select;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::audio_exclusivity::AudioExclusivityController;
use crate::catalog::RegionCatalog;
use crate::config::SupervisorConfig;
use crate::definitions::{Region, SlotIndex};
use crate::errors::{ConfigError, SupervisorError};
use crate::player::PlayerFactory;
use crate::player_events::{DashboardEvent, SlotSignal};
use crate::service::{spawn_service, ServiceHandle, StopHandle};
use crate::slot_supervisor::{SlotContext, SlotSnapshot, SlotSupervisor};

type Reply<T> = oneshot::Sender<Result<T, SupervisorError>>;

/// Requests from the dashboard shell, executed on the orchestrator task.
#[derive(Debug)]
pub enum DashboardCommand {
    RegionChanged { region: Region, reply: Reply<()> },
    ManualCycle { slot: SlotIndex, reply: Reply<()> },
    SelectCandidate { slot: SlotIndex, index: usize, reply: Reply<()> },
    Snapshot { reply: Reply<Vec<SlotSnapshot>> },
}

/// Handle to control a running orchestrator task.
pub struct OrchestratorHandle {
    service: ServiceHandle,
    command_tx: mpsc::Sender<DashboardCommand>,
    audio: Arc<AudioExclusivityController>,
    events_tx: broadcast::Sender<DashboardEvent>,
    slot_count: usize,
}

impl OrchestratorHandle {
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events_tx.subscribe()
    }

    /// Switches every slot to `region`; returns once all slots re-attached.
    pub async fn region_changed(&self, region: Region) -> Result<(), SupervisorError> {
        self.request(|reply| DashboardCommand::RegionChanged { region, reply }).await
    }

    pub async fn manual_cycle(&self, slot: SlotIndex) -> Result<(), SupervisorError> {
        self.check_slot(slot)?;
        self.request(|reply| DashboardCommand::ManualCycle { slot, reply }).await
    }

    pub async fn select_candidate(&self, slot: SlotIndex, index: usize) -> Result<(), SupervisorError> {
        self.check_slot(slot)?;
        self.request(|reply| DashboardCommand::SelectCandidate { slot, index, reply }).await
    }

    pub async fn snapshot(&self) -> Result<Vec<SlotSnapshot>, SupervisorError> {
        self.request(|reply| DashboardCommand::Snapshot { reply }).await
    }

    /// Makes `slot` the only audible slot.
    pub fn activate_audio(&self, slot: SlotIndex) -> Result<(), SupervisorError> {
        self.check_slot(slot)?;
        self.audio.activate(slot);
        Ok(())
    }

    pub fn toggle_audio(&self, slot: SlotIndex) -> Result<(), SupervisorError> {
        self.check_slot(slot)?;
        self.audio.toggle(slot);
        Ok(())
    }

    pub fn deactivate_all(&self) {
        self.audio.deactivate_all();
    }

    pub fn is_running(&self) -> bool {
        !self.service.is_finished()
    }

    /// Stops the loop; every slot is disposed before this returns.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        self.service.shutdown().await
    }

    fn check_slot(&self, slot: SlotIndex) -> Result<(), SupervisorError> {
        if slot >= self.slot_count {
            return Err(SupervisorError::UnknownSlot(slot));
        }
        Ok(())
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> DashboardCommand) -> Result<T, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx.send(build(reply)).await.map_err(|_| SupervisorError::Stopped)?;
        rx.await.map_err(|_| SupervisorError::Stopped)?
    }
}

/// Owns every slot supervisor of a dashboard and runs them on one task.
///
/// Player signals, failover timers, user commands, audio exclusivity changes
/// and the periodic refresh are all serialized through a single `select!`
/// loop, so slot state is only ever touched by that task.
pub struct Orchestrator {
    config: SupervisorConfig,
    catalog: Arc<RegionCatalog>,
    audio: Arc<AudioExclusivityController>,
    player_factory: Arc<dyn PlayerFactory>,
    events_tx: broadcast::Sender<DashboardEvent>,
}

impl Orchestrator {
    pub fn new(
        config: SupervisorConfig,
        catalog: Arc<RegionCatalog>,
        audio: Arc<AudioExclusivityController>,
        player_factory: impl PlayerFactory + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events_tx, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            config,
            catalog,
            audio,
            player_factory: Arc::new(player_factory),
            events_tx,
        })
    }

    /// Subscribe before [`run`](Self::run) to observe the initial attach of every slot.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events_tx.subscribe()
    }

    /// Spawn the orchestrator event loop in background and return a handle.
    pub fn run(self) -> OrchestratorHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let handle_audio = self.audio.clone();
        let handle_events = self.events_tx.clone();
        let slot_count = self.config.slot_count;

        let service = spawn_service(move |stop| async move {
            let event_loop = self.mount().await;
            event_loop.run(stop, command_rx).await;
        });

        OrchestratorHandle {
            service,
            command_tx,
            audio: handle_audio,
            events_tx: handle_events,
            slot_count,
        }
    }

    async fn mount(self) -> EventLoop {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let audio_rx = self.audio.subscribe();
        let ctx = SlotContext::from_config(
            &self.config,
            self.catalog.clone(),
            self.audio.clone(),
            signal_tx,
            self.events_tx.clone(),
        );

        let region = self.config.initial_region;
        info!("Mounting {} slots on {}", self.config.slot_count, region);
        let mut slots = Vec::with_capacity(self.config.slot_count);
        for slot in 0..self.config.slot_count {
            let player = self.player_factory.create_player(slot);
            slots.push(SlotSupervisor::mount(slot, region, player, ctx.clone()).await);
        }

        EventLoop {
            slots,
            signal_rx,
            audio_rx,
            events_tx: self.events_tx,
            refresh_interval: self.config.refresh_interval,
        }
    }
}

struct EventLoop {
    slots: Vec<SlotSupervisor>,
    signal_rx: mpsc::UnboundedReceiver<SlotSignal>,
    audio_rx: watch::Receiver<Option<SlotIndex>>,
    events_tx: broadcast::Sender<DashboardEvent>,
    refresh_interval: Option<Duration>,
}

impl EventLoop {
    async fn run(mut self, mut stop: StopHandle, mut command_rx: mpsc::Receiver<DashboardCommand>) {
        let mut refresh = self.refresh_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            select! {
                biased;
                _ = stop.signaled() => {
                    info!("Orchestrator shutdown requested");
                    break;
                }
                Some(signal) = self.signal_rx.recv() => {
                    self.on_slot_signal(signal).await;
                }
                command = command_rx.recv() => {
                    match command {
                        Some(command) => self.on_command(command).await,
                        None => {
                            info!("Command channel closed; stopping orchestrator");
                            break;
                        }
                    }
                }
                changed = self.audio_rx.changed() => {
                    if changed.is_err() {
                        warn!("Audio exclusivity controller dropped; stopping orchestrator");
                        break;
                    }
                    self.on_audio_changed().await;
                }
                _ = next_refresh(&mut refresh) => {
                    self.on_refresh().await;
                }
            }
        }

        for slot in &mut self.slots {
            slot.dispose().await;
        }
        info!("Orchestrator stopped");
    }

    async fn on_slot_signal(&mut self, signal: SlotSignal) {
        let index = signal.slot();
        match self.slots.get_mut(index) {
            Some(slot) => slot.handle_signal(signal).await,
            None => warn!("Signal for unknown slot {}: {:?}", index, signal),
        }
    }

    async fn on_command(&mut self, command: DashboardCommand) {
        match command {
            DashboardCommand::RegionChanged { region, reply } => {
                info!("Region changed to {}", region);
                for slot in &mut self.slots {
                    slot.region_changed(region).await;
                }
                let _ = reply.send(Ok(()));
            }
            DashboardCommand::ManualCycle { slot, reply } => {
                let result = match self.slots.get_mut(slot) {
                    Some(supervisor) => supervisor.manual_cycle().await,
                    None => Err(SupervisorError::UnknownSlot(slot)),
                };
                let _ = reply.send(result);
            }
            DashboardCommand::SelectCandidate { slot, index, reply } => {
                let result = match self.slots.get_mut(slot) {
                    Some(supervisor) => supervisor.select_candidate(index).await,
                    None => Err(SupervisorError::UnknownSlot(slot)),
                };
                let _ = reply.send(result);
            }
            DashboardCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.slots.iter().map(SlotSupervisor::snapshot).collect()));
            }
        }
    }

    async fn on_audio_changed(&mut self) {
        let active = *self.audio_rx.borrow_and_update();
        debug!("Applying audio exclusivity, active slot {:?}", active);
        for slot in &self.slots {
            slot.apply_audio().await;
        }
        let _ = self.events_tx.send(DashboardEvent::AudioChanged { active });
    }

    async fn on_refresh(&mut self) {
        debug!("Refreshing {} slots", self.slots.len());
        for slot in &mut self.slots {
            slot.refresh().await;
        }
    }
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::StreamDescriptor;
    use crate::player::{EmbedPlayer, Player, PlayerError, PlayerEventSink};
    use crate::slot_supervisor::SlotPhase;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::sleep;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Attach(String),
        Mute,
        Unmute(u8),
        Destroy,
    }

    #[derive(Default)]
    struct MockPlayer {
        calls: Mutex<Vec<Call>>,
        sink: Mutex<Option<PlayerEventSink>>,
    }

    impl MockPlayer {
        fn take(&self) -> Vec<Call> { std::mem::take(&mut self.calls.lock().unwrap()) }
        fn sink(&self) -> PlayerEventSink { self.sink.lock().unwrap().clone().unwrap() }
        fn unmuted(&self) -> Option<bool> {
            self.calls.lock().unwrap().iter().rev().find_map(|c| match c {
                Call::Mute => Some(false),
                Call::Unmute(_) => Some(true),
                _ => None,
            })
        }
    }

    #[async_trait]
    impl EmbedPlayer for MockPlayer {
        async fn attach(&self, source_locator: &str, sink: PlayerEventSink) -> Result<(), PlayerError> {
            self.calls.lock().unwrap().push(Call::Attach(source_locator.to_string()));
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }
        async fn mute(&self) -> Result<(), PlayerError> {
            self.calls.lock().unwrap().push(Call::Mute);
            Ok(())
        }
        async fn unmute(&self, volume: u8) -> Result<(), PlayerError> {
            self.calls.lock().unwrap().push(Call::Unmute(volume));
            Ok(())
        }
        async fn destroy(&self) -> Result<(), PlayerError> {
            self.calls.lock().unwrap().push(Call::Destroy);
            Ok(())
        }
    }

    type Players = Arc<Mutex<Vec<Arc<MockPlayer>>>>;

    fn catalog() -> Arc<RegionCatalog> {
        let s = |id: &str, region| StreamDescriptor::new(id, id, id, region);
        Arc::new(
            RegionCatalog::new(vec![
                (Region::Europe, vec![s("a", Region::Europe), s("b", Region::Europe), s("c", Region::Europe), s("d", Region::Europe), s("e", Region::Europe)]),
                (Region::Asia, vec![s("f", Region::Asia), s("g", Region::Asia)]),
            ])
            .unwrap(),
        )
    }

    fn config() -> SupervisorConfig {
        SupervisorConfig {
            failover_delay: Duration::from_millis(500),
            refresh_interval: None,
            initial_region: Region::Europe,
            ..Default::default()
        }
    }

    // Helper to build the orchestrator with recording players
    fn build_orchestrator(config: SupervisorConfig) -> (Orchestrator, Players) {
        let players: Players = Arc::new(Mutex::new(Vec::new()));
        let registry = players.clone();
        let factory = move |_slot: SlotIndex| {
            let player = Arc::new(MockPlayer::default());
            registry.lock().unwrap().push(player.clone());
            Player::new(player)
        };
        let audio = Arc::new(AudioExclusivityController::new());
        let orch = Orchestrator::new(config, catalog(), audio, factory).unwrap();
        (orch, players)
    }

    fn player(players: &Players, slot: usize) -> Arc<MockPlayer> {
        players.lock().unwrap()[slot].clone()
    }

    async fn short_wait() { sleep(Duration::from_millis(10)).await }

    #[tokio::test(start_paused = true)]
    async fn mount_attaches_distinct_streams_and_publishes_labels() {
        let (orch, players) = build_orchestrator(config());
        let mut events = orch.subscribe();
        let handle = orch.run();
        short_wait().await;

        let mut shown = Vec::new();
        while let Ok(DashboardEvent::NowShowing { slot, stream }) = events.try_recv() {
            shown.push((slot, stream.id));
        }
        assert_eq!(shown, [(0, "a".into()), (1, "b".into()), (2, "c".into()), (3, "d".into())]);
        assert_eq!(player(&players, 3).take(), [Call::Attach("d".into())]);
        let _ = handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn player_error_fails_over_through_the_loop() {
        let (orch, players) = build_orchestrator(config());
        let handle = orch.run();
        short_wait().await;
        let p1 = player(&players, 1);
        p1.take();

        let sink = p1.sink();
        for _ in 0..5 {
            sink.error("stalled");
            sleep(Duration::from_millis(20)).await;
        }
        sleep(Duration::from_millis(1000)).await;

        assert_eq!(p1.take(), [Call::Attach("c".into())]);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot[1].cursor, 2);
        assert_eq!(snapshot[1].failure_count, 5);
        assert_eq!(snapshot[1].phase, SlotPhase::Initializing);
        let _ = handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ready_applies_current_audio_state() {
        let (orch, players) = build_orchestrator(config());
        let handle = orch.run();
        short_wait().await;

        handle.activate_audio(2).unwrap();
        short_wait().await;
        for slot in 0..4 {
            player(&players, slot).sink().ready();
        }
        short_wait().await;

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.iter().all(|s| s.phase == SlotPhase::Ready));
        for slot in 0..4 {
            assert_eq!(player(&players, slot).unmuted(), Some(slot == 2));
        }
        let _ = handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn last_activation_wins_across_slots() {
        let (orch, players) = build_orchestrator(config());
        let mut events = orch.subscribe();
        let handle = orch.run();
        short_wait().await;

        handle.activate_audio(2).unwrap();
        short_wait().await;
        handle.activate_audio(0).unwrap();
        short_wait().await;

        assert_eq!(player(&players, 0).unmuted(), Some(true));
        assert_eq!(player(&players, 2).unmuted(), Some(false));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.iter().filter(|s| s.audible).count(), 1);
        assert!(snapshot[0].audible);

        let mut audio_events = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let DashboardEvent::AudioChanged { active } = event {
                audio_events.push(active);
            }
        }
        assert_eq!(audio_events, [Some(2), Some(0)]);

        handle.deactivate_all();
        short_wait().await;
        assert!(handle.snapshot().await.unwrap().iter().all(|s| !s.audible));
        let _ = handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn region_change_rebuilds_pools_and_ignores_stale_ready() {
        let (orch, players) = build_orchestrator(config());
        let handle = orch.run();
        short_wait().await;
        let old_sink = player(&players, 0).sink();

        handle.region_changed(Region::Asia).await.unwrap();
        old_sink.ready();
        short_wait().await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot[0].pool, ["f", "g", "a", "b"]);
        assert_eq!(snapshot[0].phase, SlotPhase::Initializing);
        assert_eq!(snapshot[0].generation, 2);
        let current: Vec<_> = snapshot.iter().map(|s| s.current.clone().unwrap().id).collect();
        assert_eq!(current, ["f", "g", "a", "b"]);
        let _ = handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn user_commands_validate_slots_and_candidates() {
        let (orch, _players) = build_orchestrator(config());
        let handle = orch.run();
        short_wait().await;

        assert_eq!(handle.manual_cycle(9).await, Err(SupervisorError::UnknownSlot(9)));
        assert_eq!(handle.activate_audio(4), Err(SupervisorError::UnknownSlot(4)));
        assert_eq!(
            handle.select_candidate(0, 7).await,
            Err(SupervisorError::CandidateOutOfRange { slot: 0, index: 7, pool_len: 5 })
        );

        handle.manual_cycle(3).await.unwrap();
        handle.select_candidate(0, 4).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot[3].cursor, 4);
        assert_eq!(snapshot[0].cursor, 4);
        let _ = handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_refresh_reattaches_every_slot() {
        let (orch, players) = build_orchestrator(SupervisorConfig {
            refresh_interval: Some(Duration::from_secs(300)),
            ..config()
        });
        let handle = orch.run();
        short_wait().await;
        for slot in 0..4 {
            player(&players, slot).take();
        }

        sleep(Duration::from_secs(301)).await;
        for slot in 0..4 {
            assert_eq!(player(&players, slot).take().len(), 1);
        }
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.iter().all(|s| s.generation == 2));
        let _ = handle.shutdown().await;
    }

    #[test]
    fn zero_refresh_period_is_refused_at_construction() {
        let config = SupervisorConfig { refresh_interval: Some(Duration::ZERO), ..config() };
        let factory = |_slot: SlotIndex| Player::new(Arc::new(MockPlayer::default()));
        let result = Orchestrator::new(config, catalog(), Arc::new(AudioExclusivityController::new()), factory);
        assert!(matches!(result, Err(ConfigError::ZeroRefreshInterval)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disposes_every_slot() {
        let (orch, players) = build_orchestrator(config());
        let handle = orch.run();
        short_wait().await;
        handle.shutdown().await.unwrap();

        for slot in 0..4 {
            assert_eq!(player(&players, slot).take().last(), Some(&Call::Destroy));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_shutdown_report_stopped() {
        let (orch, _players) = build_orchestrator(config());
        let handle = orch.run();
        short_wait().await;
        let tx = handle.command_tx.clone();
        handle.shutdown().await.unwrap();

        let (reply, rx) = oneshot::channel();
        assert!(tx.send(DashboardCommand::Snapshot { reply }).await.is_err());
        assert!(rx.await.is_err());
    }
}
