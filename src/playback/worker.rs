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
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use crate::cue::{Levels, Step};
use crate::interpolate::{channel_level, Phases};
use crate::playsync::CancelHandle;

use super::clock::Stopwatch;
use super::error::PlaybackError;
use super::Shared;

/// How a worker run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The transition (and any steps it followed into) ran to the end.
    Completed,
    /// The transition was stopped before it finished. Levels already written stay.
    Cancelled,
}

/// Everything captured when a transition starts.
pub(super) struct Transition {
    position: usize,
    step: Step,
    phases: Phases,
    baseline: Levels,
    stopwatch: Stopwatch,
    total_time_ms: f64,
}

impl Transition {
    /// Enters the running state for the pending step. The live frame becomes every channel's
    /// starting level, so that a transition interrupted half way is picked up from where it
    /// actually is.
    pub(super) fn begin(shared: &Shared) -> Result<Transition, PlaybackError> {
        let (position, step) = {
            let sequence = shared.sequence.read();
            (sequence.position(), sequence.pending()?.clone())
        };
        shared.overrides.lock().clear();
        let baseline = shared.frame.snapshot();

        Ok(Transition {
            position,
            phases: Phases::from(step.timing()),
            total_time_ms: step.total_time_ms(),
            step,
            baseline,
            stopwatch: shared.clock.stopwatch(Instant::now()),
        })
    }

    /// Writes every patched channel's level at the given elapsed time.
    fn apply(&self, shared: &Shared, elapsed_ms: f64) {
        let overrides = shared.overrides.lock();
        let target = self.step.levels();
        shared.frame.apply(|channel| {
            Some(channel_level(
                self.baseline[channel],
                target[channel],
                elapsed_ms,
                &self.phases,
                self.step.channel_time(channel),
                overrides.get(channel),
            ))
        });
    }
}

/// Runs automatic transitions on its own thread.
pub(super) struct Worker {
    shared: Shared,
    tick: Duration,
    cancel: CancelHandle,
    /// The position the current transition fades out of.
    in_flight: Mutex<Option<usize>>,
}

impl Worker {
    pub(super) fn new(shared: Shared, tick: Duration, cancel: CancelHandle) -> Worker {
        Worker {
            shared,
            tick,
            cancel,
            in_flight: Mutex::new(None),
        }
    }

    /// The position the latest transition started from, if one has started.
    pub(super) fn in_flight(&self) -> Option<usize> {
        *self.in_flight.lock()
    }

    /// Runs the given transition to completion. If the step after it has a wait, it is
    /// followed into immediately, and so on down the sequence.
    pub(super) fn run(&self, first: Transition) -> Result<Outcome, PlaybackError> {
        let span = span!(Level::INFO, "playback");
        let _enter = span.enter();

        let mut transition = first;
        loop {
            *self.in_flight.lock() = Some(transition.position);
            info!(
                position = transition.position,
                memory = transition.step.memory(),
                total_time_ms = transition.total_time_ms,
                "Transition started."
            );

            if self.run_transition(&transition) == Outcome::Cancelled {
                info!(position = transition.position, "Transition cancelled.");
                return Ok(Outcome::Cancelled);
            }

            let (_, new_position) = self.shared.finalize()?;
            let wait = self.shared.sequence.read().pending()?.timing().wait;
            if wait <= 0.0 {
                return Ok(Outcome::Completed);
            }

            debug!(position = new_position, wait, "Following into the next step.");
            transition = Transition::begin(&self.shared)?;
        }
    }

    /// Ticks until the transition's total time has passed or the worker is cancelled.
    /// Cancellation is checked once per tick.
    fn run_transition(&self, transition: &Transition) -> Outcome {
        let mut deadline = Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            let elapsed_ms = transition
                .stopwatch
                .elapsed_ms(&self.shared.clock, Instant::now());
            if elapsed_ms >= transition.total_time_ms {
                return Outcome::Completed;
            }

            if !self.shared.clock.is_paused() {
                transition.apply(&self.shared, elapsed_ms);
                self.shared
                    .observer
                    .on_tick(elapsed_ms, transition.total_time_ms);
            }

            deadline += self.tick;
            spin_sleep::sleep(deadline.saturating_duration_since(Instant::now()));
        }
    }
}
