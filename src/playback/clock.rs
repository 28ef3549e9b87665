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

/// Tracks time spent paused so that a running transition can freeze its elapsed time.
#[derive(Default)]
pub struct PauseClock {
    inner: Mutex<PauseState>,
}

#[derive(Default)]
struct PauseState {
    /// When the current pause started, if paused.
    paused_at: Option<Instant>,
    /// The sum of every finished pause.
    paused_total: Duration,
}

impl PauseClock {
    pub fn new() -> PauseClock {
        PauseClock::default()
    }

    /// Pauses the clock. Returns false if it was already paused.
    pub fn pause(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.paused_at.is_some() {
            return false;
        }
        inner.paused_at = Some(now);
        true
    }

    /// Resumes the clock. Returns false if it wasn't paused.
    pub fn resume(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.paused_at.take() {
            Some(paused_at) => {
                inner.paused_total += now.saturating_duration_since(paused_at);
                true
            }
            None => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused_at.is_some()
    }

    /// All time spent paused up to `now`, including a pause in progress.
    fn paused_duration(&self, now: Instant) -> Duration {
        let inner = self.inner.lock();
        let current = inner
            .paused_at
            .map(|paused_at| now.saturating_duration_since(paused_at))
            .unwrap_or_default();
        inner.paused_total + current
    }

    /// Starts a stopwatch for a transition.
    pub fn stopwatch(&self, start: Instant) -> Stopwatch {
        Stopwatch {
            start,
            paused_offset: self.paused_duration(start),
        }
    }
}

/// Measures a transition's elapsed time, not counting time spent paused. Equivalent to
/// pushing the start time forward by every pause.
#[derive(Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
    paused_offset: Duration,
}

impl Stopwatch {
    /// The elapsed time in milliseconds.
    pub fn elapsed_ms(&self, clock: &PauseClock, now: Instant) -> f64 {
        let paused = clock
            .paused_duration(now)
            .saturating_sub(self.paused_offset);
        let elapsed = now.saturating_duration_since(self.start).saturating_sub(paused);
        elapsed.as_nanos() as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use super::PauseClock;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_unpaused() {
        let clock = PauseClock::new();
        let start = Instant::now();
        let stopwatch = clock.stopwatch(start);
        assert_eq!(0.0, stopwatch.elapsed_ms(&clock, start));
        assert_eq!(1500.0, stopwatch.elapsed_ms(&clock, start + ms(1500)));
    }

    #[test]
    fn test_pause_freezes_elapsed() {
        let clock = PauseClock::new();
        let start = Instant::now();
        let stopwatch = clock.stopwatch(start);

        assert!(clock.pause(start + ms(1000)));
        assert!(!clock.pause(start + ms(1100)));
        assert!(clock.is_paused());
        assert_eq!(1000.0, stopwatch.elapsed_ms(&clock, start + ms(1000)));
        assert_eq!(1000.0, stopwatch.elapsed_ms(&clock, start + ms(4000)));

        assert!(clock.resume(start + ms(4000)));
        assert!(!clock.resume(start + ms(4000)));
        assert!(!clock.is_paused());
        assert_eq!(1500.0, stopwatch.elapsed_ms(&clock, start + ms(4500)));
    }

    #[test]
    fn test_earlier_pauses_ignored() {
        let clock = PauseClock::new();
        let origin = Instant::now();
        clock.pause(origin);
        clock.resume(origin + ms(10_000));

        let start = origin + ms(20_000);
        let stopwatch = clock.stopwatch(start);
        assert_eq!(250.0, stopwatch.elapsed_ms(&clock, start + ms(250)));
    }

    #[test]
    fn test_started_while_paused() {
        let clock = PauseClock::new();
        let origin = Instant::now();
        clock.pause(origin);

        let start = origin + ms(500);
        let stopwatch = clock.stopwatch(start);
        assert_eq!(0.0, stopwatch.elapsed_ms(&clock, start + ms(500)));

        clock.resume(start + ms(1000));
        assert_eq!(200.0, stopwatch.elapsed_ms(&clock, start + ms(1200)));
    }
}
