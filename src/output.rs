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
use std::collections::{BTreeSet, HashMap};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, info, trace};

use crate::cue::MAX_CHANNELS;

/// A DMX universe is 512 outputs.
pub const UNIVERSE_SIZE: usize = 512;

/// Maps universe outputs to logical channels. Consulted on every tick.
pub trait Patch: Send + Sync {
    /// Returns the channel patched to the given universe output, if any.
    fn patched_channel(&self, universe: u16, output: u16) -> Option<usize>;

    /// The universes that have anything patched in them.
    fn universes(&self) -> Vec<u16>;
}

/// Receives computed levels for universe outputs. Writes are fire and forget; the transport
/// behind the sink sends at its own rate.
pub trait DmxSink: Send + Sync {
    fn write_level(&self, universe: u16, output: u16, level: u8);
}

/// Callbacks from the playback engine. Implementations must not call back into the engine.
pub trait Observer: Send + Sync {
    /// Called on every tick of a running transition.
    fn on_tick(&self, _elapsed_ms: f64, _total_time_ms: f64) {}

    /// Called when the active step changes.
    fn on_step_changed(&self, _old_position: usize, _new_position: usize) {}

    /// Called when both manual faders reach full and the crossfade is committed.
    fn on_manual_fader_committed(&self) {}
}

/// A simple in-memory patch.
#[derive(Default)]
pub struct PatchTable {
    outputs: HashMap<(u16, u16), usize>,
}

impl PatchTable {
    pub fn new() -> PatchTable {
        PatchTable::default()
    }

    /// Patches every channel to the same numbered output in the given universe.
    pub fn one_to_one(universe: u16, channels: usize) -> PatchTable {
        let mut patch = PatchTable::new();
        for channel in 0..channels.min(MAX_CHANNELS).min(UNIVERSE_SIZE) {
            patch.outputs.insert((universe, channel as u16), channel);
        }
        patch
    }

    /// Patches a channel to a universe output, replacing anything already there.
    pub fn patch(&mut self, universe: u16, output: u16, channel: usize) {
        self.outputs.insert((universe, output), channel);
    }

    pub fn unpatch(&mut self, universe: u16, output: u16) -> Option<usize> {
        self.outputs.remove(&(universe, output))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Patch for PatchTable {
    fn patched_channel(&self, universe: u16, output: u16) -> Option<usize> {
        self.outputs.get(&(universe, output)).copied()
    }

    fn universes(&self) -> Vec<u16> {
        self.outputs
            .keys()
            .map(|(universe, _)| *universe)
            .collect::<BTreeSet<u16>>()
            .into_iter()
            .collect()
    }
}

/// A sink that keeps the latest level of every output and traces changes.
#[derive(Default)]
pub struct BufferedSink {
    universes: RwLock<HashMap<u16, [u8; UNIVERSE_SIZE]>>,
}

impl BufferedSink {
    pub fn new() -> BufferedSink {
        BufferedSink::default()
    }

    /// Returns a copy of the given universe.
    pub fn universe(&self, universe: u16) -> Option<[u8; UNIVERSE_SIZE]> {
        self.universes.read().get(&universe).copied()
    }

    /// Returns the level of a single output.
    pub fn level(&self, universe: u16, output: u16) -> u8 {
        self.universes
            .read()
            .get(&universe)
            .and_then(|buffer| buffer.get(usize::from(output)).copied())
            .unwrap_or(0)
    }
}

impl DmxSink for BufferedSink {
    fn write_level(&self, universe: u16, output: u16, level: u8) {
        let mut universes = self.universes.write();
        let buffer = universes.entry(universe).or_insert([0; UNIVERSE_SIZE]);
        if let Some(slot) = buffer.get_mut(usize::from(output)) {
            if *slot != level {
                trace!(universe, output, level, "DMX level changed");
                *slot = level;
            }
        }
    }
}

/// Engine events, as forwarded by the [ChannelObserver].
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    Tick { elapsed_ms: f64, total_time_ms: f64 },
    StepChanged { old_position: usize, new_position: usize },
    ManualFaderCommitted,
}

/// Forwards engine callbacks over a channel so that they can be consumed off of the playback
/// thread.
pub struct ChannelObserver {
    sender: Sender<PlaybackEvent>,
}

impl ChannelObserver {
    /// Creates a new observer along with the receiving end of its events.
    pub fn new() -> (ChannelObserver, Receiver<PlaybackEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (ChannelObserver { sender }, receiver)
    }

    fn send(&self, event: PlaybackEvent) {
        // Nobody listening is fine.
        let _ = self.sender.send(event);
    }
}

impl Observer for ChannelObserver {
    fn on_tick(&self, elapsed_ms: f64, total_time_ms: f64) {
        self.send(PlaybackEvent::Tick {
            elapsed_ms,
            total_time_ms,
        });
    }

    fn on_step_changed(&self, old_position: usize, new_position: usize) {
        self.send(PlaybackEvent::StepChanged {
            old_position,
            new_position,
        });
    }

    fn on_manual_fader_committed(&self) {
        self.send(PlaybackEvent::ManualFaderCommitted);
    }
}

/// Logs engine callbacks.
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_tick(&self, elapsed_ms: f64, total_time_ms: f64) {
        trace!(elapsed_ms, total_time_ms, "Tick");
    }

    fn on_step_changed(&self, old_position: usize, new_position: usize) {
        info!(old_position, new_position, "Step changed.");
    }

    fn on_manual_fader_committed(&self) {
        debug!("Manual crossfade committed.");
    }
}

#[cfg(test)]
mod test {
    use super::{
        BufferedSink, ChannelObserver, DmxSink, Observer, Patch, PatchTable, PlaybackEvent,
    };

    #[test]
    fn test_patch_table() {
        let mut patch = PatchTable::new();
        assert!(patch.is_empty());

        patch.patch(2, 10, 0);
        patch.patch(1, 0, 5);
        patch.patch(1, 1, 5);
        assert_eq!(3, patch.len());
        assert_eq!(vec![1, 2], patch.universes());
        assert_eq!(Some(5), patch.patched_channel(1, 1));
        assert_eq!(None, patch.patched_channel(1, 2));

        assert_eq!(Some(5), patch.unpatch(1, 1));
        assert_eq!(None, patch.patched_channel(1, 1));
    }

    #[test]
    fn test_one_to_one() {
        let patch = PatchTable::one_to_one(1, 4);
        assert_eq!(4, patch.len());
        assert_eq!(Some(3), patch.patched_channel(1, 3));
        assert_eq!(None, patch.patched_channel(1, 4));
    }

    #[test]
    fn test_buffered_sink() {
        let sink = BufferedSink::new();
        assert_eq!(None, sink.universe(1));

        sink.write_level(1, 3, 200);
        sink.write_level(1, 600, 10);
        assert_eq!(200, sink.level(1, 3));
        assert_eq!(0, sink.level(1, 4));
        assert_eq!(0, sink.level(2, 3));
        assert_eq!(200, sink.universe(1).unwrap()[3]);
    }

    #[test]
    fn test_channel_observer() {
        let (observer, receiver) = ChannelObserver::new();
        observer.on_tick(50.0, 1000.0);
        observer.on_step_changed(1, 2);
        observer.on_manual_fader_committed();

        assert_eq!(
            vec![
                PlaybackEvent::Tick {
                    elapsed_ms: 50.0,
                    total_time_ms: 1000.0
                },
                PlaybackEvent::StepChanged {
                    old_position: 1,
                    new_position: 2
                },
                PlaybackEvent::ManualFaderCommitted,
            ],
            receiver.try_iter().collect::<Vec<_>>()
        );
    }
}
