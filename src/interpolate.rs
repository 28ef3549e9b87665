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

//! Level interpolation shared by the automatic Go worker and the manual crossfade faders.
//! Everything in here is pure: the same inputs always produce the same level.

use std::cmp::Ordering;

use crate::cue::{ChannelTime, Timing};

/// The direction a channel moves in during a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// The channel is rising. Uses the in times.
    Up,
    /// The channel is falling. Uses the out times.
    Down,
}

impl Direction {
    /// Returns the direction from old to next, or None if the channel doesn't move.
    pub fn of(old: u8, next: u8) -> Option<Direction> {
        match next.cmp(&old) {
            Ordering::Greater => Some(Direction::Up),
            Ordering::Less => Some(Direction::Down),
            Ordering::Equal => None,
        }
    }
}

/// Step timing in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Phases {
    /// Hold before anything moves.
    pub wait_ms: f64,
    /// Extra hold for rising channels.
    pub delay_in_ms: f64,
    /// Ramp length for rising channels.
    pub time_in_ms: f64,
    /// Extra hold for falling channels.
    pub delay_out_ms: f64,
    /// Ramp length for falling channels.
    pub time_out_ms: f64,
}

impl From<Timing> for Phases {
    fn from(timing: Timing) -> Self {
        Phases {
            wait_ms: timing.wait * 1000.0,
            delay_in_ms: timing.delay_in * 1000.0,
            time_in_ms: timing.time_in * 1000.0,
            delay_out_ms: timing.delay_out * 1000.0,
            time_out_ms: timing.time_out * 1000.0,
        }
    }
}

impl Phases {
    /// The (delay, duration) pair in milliseconds for a direction.
    fn for_direction(&self, direction: Direction) -> (f64, f64) {
        match direction {
            Direction::Up => (self.delay_in_ms, self.time_in_ms),
            Direction::Down => (self.delay_out_ms, self.time_out_ms),
        }
    }
}

/// Computes a channel level for a single delay/duration phase.
///
/// The override, if present, replaces `old` as the starting point. Until `wait_ms` has
/// passed and then until `delay_ms` has passed the starting level is held. During the ramp
/// the level moves linearly, rounded half away from zero and clamped between the two
/// endpoints. Once the ramp is over the exact `next` level is returned. A zero duration
/// snaps straight to `next` once the delay is over.
pub fn level(
    old: u8,
    next: u8,
    elapsed_ms: f64,
    wait_ms: f64,
    delay_ms: f64,
    duration_ms: f64,
    override_old: Option<u8>,
) -> u8 {
    let old = override_old.unwrap_or(old);
    if elapsed_ms < wait_ms {
        return old;
    }

    let elapsed_ms = elapsed_ms - wait_ms;
    if elapsed_ms < delay_ms {
        return old;
    }
    if duration_ms <= 0.0 || elapsed_ms >= delay_ms + duration_ms {
        return next;
    }

    let progress = (elapsed_ms - delay_ms) / duration_ms;
    let delta = ((f64::from(next) - f64::from(old)) * progress).round();
    let low = f64::from(old.min(next));
    let high = f64::from(old.max(next));
    (f64::from(old) + delta).clamp(low, high) as u8
}

/// Computes a channel level for a step, picking the phase for the channel.
///
/// A channel time always wins, whatever the direction. Otherwise rising channels use the in
/// times and falling channels use the out times. Channels that don't move hold their level.
pub fn channel_level(
    old: u8,
    next: u8,
    elapsed_ms: f64,
    phases: &Phases,
    channel_time: Option<ChannelTime>,
    override_old: Option<u8>,
) -> u8 {
    let old = override_old.unwrap_or(old);
    let (delay_ms, duration_ms) = match channel_time {
        Some(channel_time) => (channel_time.delay * 1000.0, channel_time.duration * 1000.0),
        None => match Direction::of(old, next) {
            Some(direction) => phases.for_direction(direction),
            None => return old,
        },
    };

    level(
        old,
        next,
        elapsed_ms,
        phases.wait_ms,
        delay_ms,
        duration_ms,
        None,
    )
}
