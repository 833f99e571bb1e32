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

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Geographic scope a stream is filed under.
///
/// `Global` is synthetic: it is never declared in a catalog and always
/// resolves to every declared stream.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    MiddleEast,
    Europe,
    Asia,
    Africa,
    Americas,
    Oceania,
    Global,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::MiddleEast,
        Region::Europe,
        Region::Asia,
        Region::Africa,
        Region::Americas,
        Region::Oceania,
        Region::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::MiddleEast => "middle-east",
            Region::Europe => "europe",
            Region::Asia => "asia",
            Region::Africa => "africa",
            Region::Americas => "americas",
            Region::Oceania => "oceania",
            Region::Global => "global",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('_', "-");
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == key)
            .ok_or_else(|| format!("Invalid region: {}", s))
    }
}

/// Unique stream identifier. Two descriptors carrying the same id are the same stream.
pub type StreamId = String;

/// Immutable description of one live feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub id: StreamId,
    pub display_name: String,
    /// URL or platform video id handed to the embeddable player.
    pub source_locator: String,
    pub region: Region,
}

impl StreamDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, source_locator: impl Into<String>, region: Region) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            source_locator: source_locator.into(),
            region,
        }
    }
}

/// Index of a display slot, `0..slot_count`.
pub type SlotIndex = usize;
