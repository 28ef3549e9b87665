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
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cue::{Levels, MAX_CHANNELS};
use crate::output::{DmxSink, Patch, UNIVERSE_SIZE};

/// The live per-channel levels, along with where they go.
///
/// Only one driver writes at a time; the engine guarantees that by serializing drivers. The
/// lock is what lets readers take consistent snapshots while a transition is running.
pub struct LiveFrame {
    levels: RwLock<Levels>,
    patch: Arc<dyn Patch>,
    sink: Arc<dyn DmxSink>,
}

impl LiveFrame {
    pub fn new(patch: Arc<dyn Patch>, sink: Arc<dyn DmxSink>) -> LiveFrame {
        LiveFrame {
            levels: RwLock::new([0; MAX_CHANNELS]),
            patch,
            sink,
        }
    }

    /// A copy of every channel's live level.
    pub fn snapshot(&self) -> Levels {
        *self.levels.read()
    }

    /// The live level of a single channel.
    pub fn level(&self, channel: usize) -> u8 {
        self.levels.read().get(channel).copied().unwrap_or(0)
    }

    /// Computes a level for every patched channel and writes it to the frame and to each of
    /// the channel's outputs. Channels the closure returns None for are left alone. The
    /// closure is called at most once per channel, even when a channel has several outputs.
    pub fn apply<F>(&self, mut compute: F)
    where
        F: FnMut(usize) -> Option<u8>,
    {
        let mut computed: [Option<Option<u8>>; MAX_CHANNELS] = [None; MAX_CHANNELS];
        let mut levels = self.levels.write();

        for universe in self.patch.universes() {
            for output in 0..UNIVERSE_SIZE as u16 {
                let channel = match self.patch.patched_channel(universe, output) {
                    Some(channel) if channel < MAX_CHANNELS => channel,
                    _ => continue,
                };
                let level = *computed[channel].get_or_insert_with(|| compute(channel));
                if let Some(level) = level {
                    levels[channel] = level;
                    self.sink.write_level(universe, output, level);
                }
            }
        }
    }

    /// Writes the exact given levels to every patched channel.
    pub fn apply_levels(&self, target: &Levels) {
        self.apply(|channel| Some(target[channel]));
    }
}
