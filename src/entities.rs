//! Channel → Home Assistant entity bindings
//!
//! Two banks of eight slots, selected by the shift modifier. An empty slot
//! means the channel is not bound and its actions are suppressed.

use crate::config::EntitiesConfig;
use crate::control_mapping::CHANNEL_COUNT;

const SLOTS: usize = CHANNEL_COUNT as usize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityBindings {
    unshifted: [Option<String>; SLOTS],
    shifted: [Option<String>; SLOTS],
    play_toggle: Option<String>,
}

impl EntityBindings {
    /// Build bindings from the `entities` config section
    ///
    /// Channels outside 1-8 are rejected by config validation; any that reach
    /// this point are ignored. Empty identifiers count as unbound.
    pub fn from_config(config: &EntitiesConfig) -> Self {
        let mut bindings = Self::default();
        for (&channel, entity) in &config.unshifted {
            bindings.bind(channel, false, entity);
        }
        for (&channel, entity) in &config.shifted {
            bindings.bind(channel, true, entity);
        }
        bindings.play_toggle = non_empty(&config.play_toggle);
        bindings
    }

    /// Bind `entity` to a 1-based channel in the selected bank
    pub fn bind(&mut self, channel: u8, shift: bool, entity: &str) {
        let Some(index) = slot_index(channel) else {
            return;
        };
        let bank = if shift {
            &mut self.shifted
        } else {
            &mut self.unshifted
        };
        bank[index] = non_empty(entity);
    }

    pub fn with_play_toggle(mut self, entity: &str) -> Self {
        self.play_toggle = non_empty(entity);
        self
    }

    /// Entity bound to `channel` in the bank selected by `shift`
    pub fn resolve(&self, channel: u8, shift: bool) -> Option<&str> {
        let index = slot_index(channel)?;
        let bank = if shift { &self.shifted } else { &self.unshifted };
        bank[index].as_deref()
    }

    /// Switch toggled by the Play button
    pub fn play_toggle(&self) -> Option<&str> {
        self.play_toggle.as_deref()
    }
}

fn slot_index(channel: u8) -> Option<usize> {
    (1..=CHANNEL_COUNT)
        .contains(&channel)
        .then(|| (channel - 1) as usize)
}

fn non_empty(entity: &str) -> Option<String> {
    let entity = entity.trim();
    (!entity.is_empty()).then(|| entity.to_string())
}
