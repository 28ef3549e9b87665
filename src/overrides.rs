// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crate::cue::MAX_CHANNELS;
use crate::playback::error::PlaybackError;

/// Levels typed in by the operator during a transition. An override replaces the snapshot
/// taken at the start of the transition as the channel's starting level.
pub struct Overrides {
    levels: [Option<u8>; MAX_CHANNELS],
}

impl Overrides {
    pub fn new() -> Overrides {
        Overrides {
            levels: [None; MAX_CHANNELS],
        }
    }

    /// Sets the override for a channel.
    pub fn set(&mut self, channel: usize, level: u8) -> Result<(), PlaybackError> {
        let slot = self
            .levels
            .get_mut(channel)
            .ok_or(PlaybackError::ChannelOutOfRange(channel))?;
        *slot = Some(level);
        Ok(())
    }

    /// Gets the override for a channel, if any.
    pub fn get(&self, channel: usize) -> Option<u8> {
        self.levels.get(channel).copied().flatten()
    }

    /// Drops every override.
    pub fn clear(&mut self) {
        self.levels = [None; MAX_CHANNELS];
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Option::is_none)
    }
}

impl Default for Overrides {
    fn default() -> Self {
        Self::new()
    }
}
