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

use anyhow::{anyhow, bail, Context};
use log::{info, warn};
use sitmon_core::{OrchestratorHandle, Region, RegionCatalog, SlotIndex, SlotSnapshot};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::simulated_player::PlayerRegistry;

pub const HELP: &str = "\
commands:
  region <key>            switch every slot to a region
  next <slot>             advance a slot to its next candidate
  select <slot> <index>   show a specific candidate in a slot
  audio <slot>            toggle audio on a slot
  mute                    mute every slot
  fail <slot>             simulate a playback error in a slot
  status                  print every slot
  quit                    stop the dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Region(Region),
    Next(SlotIndex),
    Select(SlotIndex, usize),
    Audio(SlotIndex),
    Mute,
    Fail(SlotIndex),
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses one console line; blank lines yield `None`.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "region" => {
                let key = words.next().ok_or_else(|| anyhow!("region needs a key"))?;
                ConsoleCommand::Region(key.parse().map_err(|e: String| anyhow!(e))?)
            }
            "next" => ConsoleCommand::Next(number(words.next(), "slot")?),
            "select" => ConsoleCommand::Select(number(words.next(), "slot")?, number(words.next(), "index")?),
            "audio" => ConsoleCommand::Audio(number(words.next(), "slot")?),
            "mute" => ConsoleCommand::Mute,
            "fail" => ConsoleCommand::Fail(number(words.next(), "slot")?),
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => bail!("unknown command '{}'", other),
        };
        if let Some(extra) = words.next() {
            bail!("unexpected argument '{}'", extra);
        }
        Ok(Some(command))
    }
}

fn number(word: Option<&str>, what: &str) -> anyhow::Result<usize> {
    let word = word.ok_or_else(|| anyhow!("missing {}", what))?;
    word.parse().with_context(|| format!("invalid {} '{}'", what, word))
}

/// How the console loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    InputClosed,
}

/// Notice for a region the catalog has no streams of its own for.
pub fn undeclared_region_notice(catalog: &RegionCatalog, region: Region) -> Option<String> {
    (!catalog.contains(region)).then(|| format!("Region {} has no streams of its own; every slot borrows from other regions", region))
}

pub fn format_slot(slot: &SlotSnapshot) -> String {
    let showing = slot
        .current
        .as_ref()
        .map(|s| format!("{} ({})", s.display_name, s.id))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "slot {} [{}] {:?} {}/{} {}{} failures={}{}",
        slot.slot,
        slot.region,
        slot.phase,
        slot.cursor,
        slot.pool.len(),
        showing,
        if slot.audible { " (audio)" } else { "" },
        slot.failure_count,
        if slot.failover_pending { " failover pending" } else { "" },
    )
}

/// Reads commands from `input` until `quit` or end of input.
pub async fn run_console(
    input: impl AsyncBufRead + Unpin,
    handle: &OrchestratorHandle,
    players: &PlayerRegistry,
    catalog: &RegionCatalog,
) -> anyhow::Result<ConsoleExit> {
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            info!("Console closed");
            return Ok(ConsoleExit::Quit);
        }
        if let Err(e) = execute(handle, players, catalog, command).await {
            warn!("Command failed: {}", e);
        }
    }
    info!("Console input closed");
    Ok(ConsoleExit::InputClosed)
}

async fn execute(
    handle: &OrchestratorHandle,
    players: &PlayerRegistry,
    catalog: &RegionCatalog,
    command: ConsoleCommand,
) -> anyhow::Result<()> {
    match command {
        ConsoleCommand::Region(region) => {
            if let Some(notice) = undeclared_region_notice(catalog, region) {
                warn!("{}", notice);
            }
            handle.region_changed(region).await?
        }
        ConsoleCommand::Next(slot) => handle.manual_cycle(slot).await?,
        ConsoleCommand::Select(slot, index) => handle.select_candidate(slot, index).await?,
        ConsoleCommand::Audio(slot) => handle.toggle_audio(slot)?,
        ConsoleCommand::Mute => handle.deactivate_all(),
        ConsoleCommand::Fail(slot) => {
            let player = players.get(slot).ok_or_else(|| anyhow!("no player in slot {}", slot))?;
            if !player.fail() {
                bail!("slot {} has nothing attached", slot);
            }
        }
        ConsoleCommand::Status => {
            for slot in handle.snapshot().await? {
                println!("{}", format_slot(&slot));
            }
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
