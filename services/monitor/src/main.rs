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

mod cli;
mod console;
mod simulated_player;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use sitmon_core::{
    spawn_service, AudioExclusivityController, DashboardEvent, MultiServiceHandle, Orchestrator, RegionCatalog,
    SupervisorConfig,
};
use tokio::io::BufReader;
use tokio::select;
use tokio::sync::broadcast;

use crate::cli::Cli;
use crate::console::ConsoleExit;
use crate::simulated_player::PlayerRegistry;

fn load_catalog(cli: &Cli) -> anyhow::Result<RegionCatalog> {
    match &cli.catalog {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read catalog {}", path.display()))?;
            RegionCatalog::from_json_str(&json).with_context(|| format!("invalid catalog {}", path.display()))
        }
        None => Ok(RegionCatalog::builtin()),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SupervisorConfig> {
    let config = match &cli.config {
        Some(path) => SupervisorConfig::from_file(path)?,
        None => SupervisorConfig::default(),
    };
    Ok(cli.apply_overrides(config.apply_env()?))
}

fn dead_locators(cli: &Cli, catalog: &RegionCatalog) -> HashSet<String> {
    cli.dead_streams
        .iter()
        .filter_map(|id| match catalog.get(id) {
            Some(stream) => Some(stream.source_locator.clone()),
            None => {
                warn!("Unknown stream id {}, ignoring", id);
                None
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let catalog = load_catalog(&cli)?;
    let config = load_config(&cli)?;
    info!("Starting {} slots on {}, failover after {:?}", config.slot_count, config.initial_region, config.failover_delay);

    let players = PlayerRegistry::new();
    let factory = players.factory(dead_locators(&cli, &catalog), Duration::from_millis(cli.load_time_ms));
    let catalog = Arc::new(catalog);
    let orchestrator = Orchestrator::new(config, catalog.clone(), Arc::new(AudioExclusivityController::new()), factory)?;

    let mut events = orchestrator.subscribe();
    let handle = orchestrator.run();

    let mut services = MultiServiceHandle::new();
    services.add(spawn_service(move |mut stop| async move {
        loop {
            select! {
                _ = stop.signaled() => break,
                event = events.recv() => match event {
                    Ok(DashboardEvent::NowShowing { slot, stream }) => println!("slot {}: {}", slot, stream.display_name),
                    Ok(DashboardEvent::AudioChanged { active: Some(slot) }) => println!("audio on slot {}", slot),
                    Ok(DashboardEvent::AudioChanged { active: None }) => println!("all slots muted"),
                    Err(broadcast::error::RecvError::Lagged(missed)) => warn!("Missed {} dashboard events", missed),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }));

    println!("{}", console::HELP);
    let exit = select! {
        result = console::run_console(BufReader::new(tokio::io::stdin()), &handle, &players, &catalog) => Some(result?),
        _ = tokio::signal::ctrl_c() => None,
    };
    if exit == Some(ConsoleExit::InputClosed) {
        info!("No console input; running until Ctrl-C");
        tokio::signal::ctrl_c().await?;
    }
    info!("Shutting down");

    handle.shutdown().await?;
    services.shutdown().await?;
    info!("Dashboard stopped");
    Ok(())
}
