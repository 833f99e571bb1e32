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

use log::debug;
use tokio::sync::watch;

use crate::definitions::SlotIndex;

/// Holds the single audible slot of a dashboard.
///
/// Create one per dashboard and hand it to the orchestrator; every change is
/// published to subscribers, which re-apply mute state to all their slots.
pub struct AudioExclusivityController {
    active_tx: watch::Sender<Option<SlotIndex>>,
}

impl AudioExclusivityController {
    pub fn new() -> Self {
        let (active_tx, _) = watch::channel(None);
        Self { active_tx }
    }

    /// Makes `slot` the only audible slot. Last call wins.
    pub fn activate(&self, slot: SlotIndex) {
        self.set(Some(slot));
    }

    /// Mutes every slot.
    pub fn deactivate_all(&self) {
        self.set(None);
    }

    /// Activates `slot`, or mutes everything if `slot` is already the audible one.
    pub fn toggle(&self, slot: SlotIndex) {
        self.active_tx.send_modify(|active| {
            *active = if *active == Some(slot) { None } else { Some(slot) };
        });
        debug!("Audio toggled on slot {}, active: {:?}", slot, self.active_slot());
    }

    pub fn active_slot(&self) -> Option<SlotIndex> {
        *self.active_tx.borrow()
    }

    pub fn is_audible(&self, slot: SlotIndex) -> bool {
        self.active_slot() == Some(slot)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SlotIndex>> {
        self.active_tx.subscribe()
    }

    fn set(&self, value: Option<SlotIndex>) {
        let changed = self.active_tx.send_if_modified(|active| {
            if *active == value {
                return false;
            }
            *active = value;
            true
        });
        if changed {
            debug!("Active audio slot set to {:?}", value);
        }
    }
}

impl Default for AudioExclusivityController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audible_count(controller: &AudioExclusivityController, slots: usize) -> usize {
        (0..slots).filter(|s| controller.is_audible(*s)).count()
    }

    #[test]
    fn starts_with_every_slot_muted() {
        let controller = AudioExclusivityController::new();
        assert_eq!(controller.active_slot(), None);
        assert_eq!(audible_count(&controller, 4), 0);
    }

    #[test]
    fn last_activate_wins() {
        let controller = AudioExclusivityController::new();
        controller.activate(2);
        controller.activate(0);
        assert!(controller.is_audible(0));
        assert!(!controller.is_audible(2));
    }

    #[test]
    fn at_most_one_slot_audible_for_any_sequence() {
        let controller = AudioExclusivityController::new();
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            match (seed >> 16) % 6 {
                5 => controller.deactivate_all(),
                4 => controller.toggle(((seed >> 8) % 4) as usize),
                n => controller.activate(n as usize),
            }
            assert!(audible_count(&controller, 6) <= 1);
        }
    }

    #[test]
    fn toggle_mutes_the_audible_slot() {
        let controller = AudioExclusivityController::new();
        controller.toggle(1);
        assert!(controller.is_audible(1));
        controller.toggle(1);
        assert_eq!(controller.active_slot(), None);
    }

    #[tokio::test]
    async fn subscribers_are_notified_only_on_change() {
        let controller = AudioExclusivityController::new();
        let mut rx = controller.subscribe();

        controller.activate(3);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(3));

        controller.activate(3);
        assert!(!rx.has_changed().unwrap());

        controller.deactivate_all();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), None);
    }
}
