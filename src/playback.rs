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
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::crossfade::{Crossfade, Fader};
use crate::cue::Levels;
use crate::output::{DmxSink, Observer, Patch};
use crate::overrides::Overrides;
use crate::playsync::CancelHandle;
use crate::sequence::Sequence;

use self::clock::PauseClock;
use self::error::PlaybackError;
use self::frame::LiveFrame;
use self::worker::{Transition, Worker};

pub mod clock;
pub mod error;
pub mod frame;
mod worker;


pub use self::worker::Outcome;

/// The default time between transition ticks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Whether an automatic transition is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
}

/// State shared between the engine and its worker.
#[derive(Clone)]
pub(crate) struct Shared {
    sequence: Arc<RwLock<Sequence>>,
    frame: Arc<LiveFrame>,
    overrides: Arc<Mutex<Overrides>>,
    observer: Arc<dyn Observer>,
    clock: Arc<PauseClock>,
}

impl Shared {
    /// Completes the move into the next step: writes its exact levels, clears the overrides,
    /// advances the position and tells the observer. Returns the old and new positions.
    fn finalize(&self) -> Result<(usize, usize), PlaybackError> {
        let (old, new) = self.complete(&mut self.sequence.write())?;
        self.observer.on_step_changed(old, new);
        Ok((old, new))
    }

    /// Finalizes the transition out of the given position, unless the sequence has already
    /// moved on from it.
    fn recover(&self, position: usize) -> Result<Option<(usize, usize)>, PlaybackError> {
        let (old, new) = {
            let mut sequence = self.sequence.write();
            if sequence.position() != position {
                return Ok(None);
            }
            self.complete(&mut sequence)?
        };
        self.observer.on_step_changed(old, new);
        Ok(Some((old, new)))
    }

    fn complete(&self, sequence: &mut Sequence) -> Result<(usize, usize), PlaybackError> {
        sequence.check_position()?;
        let target = *sequence.step(sequence.next_position())?.levels();
        self.frame.apply_levels(&target);
        self.overrides.lock().clear();
        Ok(sequence.advance()?)
    }
}

struct GoHandles {
    join: JoinHandle<Result<Outcome, PlaybackError>>,
    cancel: CancelHandle,
}

/// Whatever currently drives the live frame. Every driver goes through this lock, so a Go
/// and the manual faders can never write at the same time.
struct Slot {
    /// The automatic Go worker. There should only be one on here at a time.
    worker: Option<GoHandles>,
    crossfade: Crossfade,
    last_outcome: Option<Outcome>,
}

/// The playback engine for a single sequence.
pub struct Engine {
    shared: Shared,
    tick: Duration,
    slot: Mutex<Slot>,
}

impl Engine {
    /// Creates a new engine. Nothing is output until the first command.
    pub fn new(
        sequence: Sequence,
        patch: Arc<dyn Patch>,
        sink: Arc<dyn DmxSink>,
        observer: Arc<dyn Observer>,
        tick: Duration,
    ) -> Engine {
        Engine {
            shared: Shared {
                sequence: Arc::new(RwLock::new(sequence)),
                frame: Arc::new(LiveFrame::new(patch, sink)),
                overrides: Arc::new(Mutex::new(Overrides::new())),
                observer,
                clock: Arc::new(PauseClock::new()),
            },
            tick,
            slot: Mutex::new(Slot {
                worker: None,
                crossfade: Crossfade::new(),
                last_outcome: None,
            }),
        }
    }

    /// Starts fading from the live levels into the pending step. A transition that is already
    /// running is stopped and joined first.
    pub fn go(&self) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock();
        self.stop_locked(&mut slot);
        self.start_locked(&mut slot)
    }

    /// Jumps to the first cue at or after the given memory number and fades into it.
    pub fn goto(&self, memory: f32) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock();
        self.stop_locked(&mut slot);
        let position = self.shared.sequence.write().goto(memory)?;
        info!(memory, position, "Going to cue.");
        self.start_locked(&mut slot)
    }

    /// Stops any running transition without advancing. Levels stay where they are.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        self.stop_locked(&mut slot);
    }

    /// Freezes the running transition's clock. Returns false if already paused.
    pub fn pause(&self) -> bool {
        let paused = self.shared.clock.pause(Instant::now());
        if paused {
            info!("Playback paused.");
        }
        paused
    }

    /// Unfreezes the clock. Returns false if not paused.
    pub fn resume(&self) -> bool {
        let resumed = self.shared.clock.resume(Instant::now());
        if resumed {
            info!("Playback resumed.");
        }
        resumed
    }

    pub fn is_paused(&self) -> bool {
        self.shared.clock.is_paused()
    }

    pub fn state(&self) -> PlaybackState {
        let mut slot = self.slot.lock();
        Self::reap_finished(&mut slot);
        if slot.worker.is_some() {
            PlaybackState::Running
        } else {
            PlaybackState::Idle
        }
    }

    /// How the most recently finished worker ended. None if it failed or none has finished.
    pub fn last_outcome(&self) -> Option<Outcome> {
        let mut slot = self.slot.lock();
        Self::reap_finished(&mut slot);
        slot.last_outcome
    }

    /// Blocks until the running worker finishes and returns how it ended. Steps with waits
    /// follow on from each other, so this won't return while such a chain keeps going.
    pub fn wait(&self) -> Option<Outcome> {
        let mut slot = self.slot.lock();
        if let Some(handles) = slot.worker.take() {
            slot.last_outcome = Self::join(handles);
        }
        slot.last_outcome
    }

    /// Sets an operator override for a channel. A running transition fades from the override
    /// from its next tick on; otherwise the level is output right away.
    pub fn set_override(&self, channel: usize, level: u8) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock();
        Self::reap_finished(&mut slot);
        self.shared.overrides.lock().set(channel, level)?;
        if slot.worker.is_none() {
            self.shared
                .frame
                .apply(|patched| (patched == channel).then_some(level));
        }
        debug!(channel, level, "Override set.");
        Ok(())
    }

    /// The override for a channel, if any.
    pub fn override_level(&self, channel: usize) -> Option<u8> {
        self.shared.overrides.lock().get(channel)
    }

    /// Moves a manual crossfade fader.
    ///
    /// The first move takes over from any running Go, using the live levels as the starting
    /// point. When both faders are at full the crossfade is committed exactly as if a Go had
    /// completed, but nothing with a wait is followed into.
    pub fn set_fader(&self, fader: Fader, position: u8) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock();
        if !slot.crossfade.is_engaged() {
            self.shared.sequence.read().check_position()?;
            self.cancel_worker(&mut slot);
            self.shared.overrides.lock().clear();
            slot.crossfade.engage(self.shared.frame.snapshot());
            info!(fader = %fader, "Manual crossfade engaged.");
        }
        slot.crossfade.set_position(fader, position);

        let (elapsed_ms, total_time_ms) = {
            let sequence = self.shared.sequence.read();
            let step = sequence.pending()?;
            let overrides = self.shared.overrides.lock();
            let crossfade = &slot.crossfade;
            self.shared.frame.apply(|channel| {
                crossfade.level(fader, channel, step, overrides.get(channel))
            });
            (crossfade.elapsed_ms(fader, step), step.total_time_ms())
        };
        self.shared.observer.on_tick(elapsed_ms, total_time_ms);

        if slot.crossfade.is_complete() {
            let (old, new) = self.shared.finalize()?;
            slot.crossfade.commit();
            self.shared.observer.on_manual_fader_committed();
            info!(
                old_position = old,
                new_position = new,
                "Manual crossfade committed."
            );
        }
        Ok(())
    }

    /// The current position of a manual fader.
    pub fn fader(&self, fader: Fader) -> u8 {
        self.slot.lock().crossfade.position(fader)
    }

    /// Whether the faders are drawn upside down for the current cue.
    pub fn is_inverted(&self) -> bool {
        self.slot.lock().crossfade.is_inverted()
    }

    /// Replaces the levels of the active cue. Output right away when nothing is driving the
    /// frame.
    pub fn update_current_levels(&self, levels: Levels) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock();
        Self::reap_finished(&mut slot);
        self.shared.sequence.write().update_current_levels(levels)?;
        if slot.worker.is_none() && !slot.crossfade.is_engaged() {
            self.shared.frame.apply_levels(&levels);
        }
        Ok(())
    }

    /// The index of the active step.
    pub fn position(&self) -> usize {
        self.shared.sequence.read().position()
    }

    /// A snapshot of the live levels.
    pub fn frame(&self) -> Levels {
        self.shared.frame.snapshot()
    }

    /// The live level of one channel.
    pub fn level(&self, channel: usize) -> u8 {
        self.shared.frame.level(channel)
    }

    /// Runs the given closure against the sequence.
    pub fn with_sequence<R>(&self, f: impl FnOnce(&Sequence) -> R) -> R {
        f(&self.shared.sequence.read())
    }

    fn start_locked(&self, slot: &mut Slot) -> Result<(), PlaybackError> {
        self.shared.clock.resume(Instant::now());
        let transition = Transition::begin(&self.shared)?;

        let cancel = CancelHandle::new();
        let worker = Worker::new(self.shared.clone(), self.tick, cancel.clone());
        let shared = self.shared.clone();
        let join = thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| worker.run(transition)))
                .unwrap_or(Err(PlaybackError::WorkerPanicked));
            if let Err(e) = &result {
                error!(err = %e, "Playback worker failed.");
                if let Some(position) = worker.in_flight() {
                    match shared.recover(position) {
                        Ok(Some((old, new))) => info!(
                            old_position = old,
                            new_position = new,
                            "Finalized the interrupted transition."
                        ),
                        Ok(None) => debug!(position, "Transition was already finalized."),
                        Err(e) => error!(err = %e, "Unable to finalize the pending step."),
                    }
                }
            }
            result
        });

        slot.worker = Some(GoHandles { join, cancel });
        Ok(())
    }

    /// Cancels and joins the worker, and hands the manual faders back.
    fn stop_locked(&self, slot: &mut Slot) {
        self.cancel_worker(slot);
        if slot.crossfade.is_engaged() {
            slot.crossfade.disengage();
            debug!("Manual crossfade disengaged.");
        }
    }

    fn cancel_worker(&self, slot: &mut Slot) {
        if let Some(handles) = slot.worker.take() {
            handles.cancel.cancel();
            slot.last_outcome = Self::join(handles);
        }
    }

    fn reap_finished(slot: &mut Slot) {
        let finished = slot
            .worker
            .as_ref()
            .is_some_and(|handles| handles.join.is_finished());
        if finished {
            if let Some(handles) = slot.worker.take() {
                slot.last_outcome = Self::join(handles);
            }
        }
    }

    fn join(handles: GoHandles) -> Option<Outcome> {
        match handles.join.join() {
            Ok(Ok(outcome)) => Some(outcome),
            // Already logged and recovered from on the worker thread.
            Ok(Err(_)) => None,
            Err(_) => {
                error!("Error joining playback worker.");
                None
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(handles) = self.slot.get_mut().worker.take() {
            handles.cancel.cancel();
            let _ = Self::join(handles);
        }
    }
}
