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

// Example showing how to wire RegionCatalog + AudioExclusivityController + Orchestrator
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use sitmon_core::{
    AudioExclusivityController, DashboardEvent, EmbedPlayer, Orchestrator, Player, PlayerError, PlayerEventSink,
    Region, RegionCatalog, SlotIndex, SupervisorConfig,
};

/// Plays everything except Al Jazeera, which always errors out.
struct DemoPlayer(SlotIndex);

#[async_trait]
impl EmbedPlayer for DemoPlayer {
    async fn attach(&self, source_locator: &str, sink: PlayerEventSink) -> Result<(), PlayerError> {
        info!("slot {} attaching {}", self.0, source_locator);
        let broken = source_locator.contains("gCNeDWCI0vo");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if broken {
                sink.error("embedding disabled");
            } else {
                sink.ready();
            }
        });
        Ok(())
    }

    async fn mute(&self) -> Result<(), PlayerError> {
        Ok(())
    }

    async fn unmute(&self, volume: u8) -> Result<(), PlayerError> {
        info!("slot {} audible at {}", self.0, volume);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = SupervisorConfig { initial_region: Region::MiddleEast, ..Default::default() };
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(RegionCatalog::builtin()),
        Arc::new(AudioExclusivityController::new()),
        |slot: SlotIndex| Player::new(Arc::new(DemoPlayer(slot))),
    )?;
    let mut events = orchestrator.subscribe();
    let handle = orchestrator.run();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let DashboardEvent::NowShowing { slot, stream } = event {
                info!("slot {} now showing {}", slot, stream.display_name);
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.activate_audio(1)?;
    handle.region_changed(Region::Asia).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    for slot in handle.snapshot().await? {
        info!("{:?}", slot);
    }

    info!("Orchestrator example running; press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    handle.shutdown().await?;
    Ok(())
}
