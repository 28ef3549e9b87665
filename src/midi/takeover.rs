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
use std::cmp::Ordering;

/// Where a physical fader sits relative to the value the software holds for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaderState {
    /// The hardware is in sync and moves go straight through.
    Valid,
    /// The hardware is below the held value and has to be pushed up to it.
    Up,
    /// The hardware is above the held value and has to be pulled down to it.
    Down,
}

impl FaderState {
    fn between(hardware: u8, logical: u8) -> FaderState {
        match hardware.cmp(&logical) {
            Ordering::Less => FaderState::Up,
            Ordering::Greater => FaderState::Down,
            Ordering::Equal => FaderState::Valid,
        }
    }
}

/// Soft takeover for a single physical fader. Values are all in logical fader units.
#[derive(Debug)]
pub struct SoftTakeover {
    state: FaderState,
    /// The value the software last agreed to. None until the first sync.
    logical: Option<u8>,
}

impl SoftTakeover {
    pub fn new() -> SoftTakeover {
        SoftTakeover {
            state: FaderState::Valid,
            logical: None,
        }
    }

    pub fn state(&self) -> FaderState {
        self.state
    }

    /// Tells the guard what the software currently holds. If that moved without the
    /// hardware (a commit, a Go, a mouse move), the hardware has to come back to it first.
    pub fn sync(&mut self, logical: u8, hardware: u8) {
        if self.logical == Some(logical) {
            return;
        }
        self.logical = Some(logical);
        self.state = FaderState::between(hardware, logical);
    }

    /// Offers a hardware value. Returns the value to apply, or None while the hardware
    /// hasn't yet reached the held value.
    pub fn accept(&mut self, hardware: u8) -> Option<u8> {
        let picked_up = match (self.state, self.logical) {
            (FaderState::Valid, _) | (_, None) => true,
            (FaderState::Up, Some(logical)) => hardware >= logical,
            (FaderState::Down, Some(logical)) => hardware <= logical,
        };
        if !picked_up {
            return None;
        }

        self.state = FaderState::Valid;
        self.logical = Some(hardware);
        Some(hardware)
    }
}

impl Default for SoftTakeover {
    fn default() -> Self {
        Self::new()
    }
}
