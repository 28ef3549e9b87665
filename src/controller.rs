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
use std::error::Error;
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Level};

use crate::crossfade::Fader;
use crate::midi::MidiFaders;
use crate::playback::Engine;

pub mod keyboard;

/// Operator commands that drive the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Fades into the next cue.
    Go,

    /// Stops the running transition where it is.
    Stop,

    /// Freezes the running transition.
    Pause,

    /// Unfreezes the running transition.
    Resume,

    /// Jumps to the first cue at or after the given memory number and fades into it.
    Goto(f32),

    /// Overrides a channel's level. The channel is zero based.
    Override { channel: usize, level: u8 },

    /// Moves a manual crossfade fader.
    Fader(Fader, u8),

    /// A raw MIDI message for the fader input.
    Midi(Vec<u8>),

    /// Shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Applies driver events to an engine.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver. MIDI events are dropped unless MIDI
    /// faders are given.
    pub fn new(
        engine: Arc<Engine>,
        midi: Option<Arc<MidiFaders>>,
        driver: Arc<dyn Driver>,
    ) -> Controller {
        Controller {
            handle: tokio::spawn(
                async move { Controller::trigger_events(engine, midi, driver).await },
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers engine commands by watching the driver and getting events from it.
    async fn trigger_events(
        engine: Arc<Engine>,
        midi: Option<Arc<MidiFaders>>,
        driver: Arc<dyn Driver>,
    ) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(position = engine.position(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = ?event, "Received event.");
            if event == Event::Quit {
                break;
            }

            // Engine commands may join a worker thread, so keep them off of the runtime.
            let engine = engine.clone();
            let midi = midi.clone();
            match tokio::task::spawn_blocking(move || apply(&engine, midi.as_deref(), event)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(err = %e, "Error talking to engine."),
                Err(e) => error!(err = %e, "Engine command panicked."),
            }
        }

        info!("Controller closing.");
        drop(events_rx);
        if let Err(e) = join_handle.await {
            error!("Error waiting for event monitor to stop: {}", e);
        }
    }
}

/// Applies a single event to the engine.
fn apply(
    engine: &Engine,
    midi: Option<&MidiFaders>,
    event: Event,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match event {
        Event::Go => engine.go()?,
        Event::Stop => engine.stop(),
        Event::Pause => {
            engine.pause();
        }
        Event::Resume => {
            engine.resume();
        }
        Event::Goto(memory) => engine.goto(memory)?,
        Event::Override { channel, level } => engine.set_override(channel, level)?,
        Event::Fader(fader, position) => engine.set_fader(fader, position)?,
        Event::Midi(raw) => match midi {
            Some(midi) => {
                midi.handle(&raw)?;
            }
            None => info!("No MIDI faders configured, ignoring MIDI message."),
        },
        Event::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{io, sync::Arc, time::Duration};

    use midly::num::{u4, u7};
    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::crossfade::Fader;
    use crate::cue::{Cue, Step, Timing};
    use crate::midi::{FaderMapping, FaderSource, MidiFaders};
    use crate::output::{BufferedSink, LoggingObserver, PatchTable};
    use crate::playback::{Engine, PlaybackState};
    use crate::sequence::Sequence;

    use super::{Controller, Driver, Event};

    /// Sends a fixed list of events and then stops.
    struct ScriptedDriver {
        events: Mutex<Vec<Event>>,
    }

    impl ScriptedDriver {
        fn new(events: Vec<Event>) -> ScriptedDriver {
            ScriptedDriver {
                events: Mutex::new(events),
            }
        }
    }

    impl Driver for ScriptedDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = std::mem::take(&mut *self.events.lock());
            tokio::task::spawn_blocking(move || {
                for event in events {
                    // The controller stops listening on quit.
                    if events_tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    fn engine() -> Arc<Engine> {
        let mut sequence = Sequence::new(1, "main");
        for (memory, channel) in [(1.0, 0), (2.0, 1), (3.0, 2)] {
            let mut cue = Cue::new(1, memory);
            cue.levels[channel] = 255;
            sequence.add_step(Step::new(cue, Timing::instant()));
        }
        Arc::new(Engine::new(
            sequence,
            Arc::new(PatchTable::one_to_one(1, 8)),
            Arc::new(BufferedSink::new()),
            Arc::new(LoggingObserver),
            Duration::from_millis(5),
        ))
    }

    async fn run(engine: Arc<Engine>, midi: Option<Arc<MidiFaders>>, events: Vec<Event>) {
        let mut controller =
            Controller::new(engine.clone(), midi, Arc::new(ScriptedDriver::new(events)));
        controller.join().await.unwrap();
        let waiter = engine.clone();
        tokio::task::spawn_blocking(move || waiter.wait())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() {
        let engine = engine();
        run(engine.clone(), None, vec![Event::Go, Event::Goto(3.0)]).await;
        assert_eq!(3, engine.position());
        assert_eq!(255, engine.level(2));
        assert_eq!(PlaybackState::Idle, engine.state());

        run(
            engine.clone(),
            None,
            vec![Event::Override {
                channel: 6,
                level: 42,
            }],
        )
        .await;
        assert_eq!(42, engine.level(6));
        assert_eq!(3, engine.position());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_faders_and_errors() {
        let engine = engine();
        run(
            engine.clone(),
            None,
            vec![
                // Neither of these stop the controller.
                Event::Goto(10.0),
                Event::Midi(vec![0xB0, 0x01, 0x7F]),
                Event::Fader(Fader::Out, 255),
                Event::Fader(Fader::In, 255),
            ],
        )
        .await;
        assert_eq!(1, engine.position());
        assert!(engine.is_inverted());
        assert_eq!(255, engine.level(0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_midi_and_quit() {
        let engine = engine();
        let midi = Arc::new(MidiFaders::new(
            engine.clone(),
            FaderMapping {
                channel: u4::from(0),
                out_fader: FaderSource::ControlChange(u7::from(1)),
                in_fader: FaderSource::ControlChange(u7::from(2)),
            },
        ));
        run(
            engine.clone(),
            Some(midi),
            vec![
                Event::Midi(vec![0xB0, 0x01, 0x00]),
                Event::Midi(vec![0xB0, 0x02, 0x00]),
                Event::Midi(vec![0xB0, 0x02, 0x7F]),
                Event::Quit,
                // Never applied.
                Event::Midi(vec![0xB0, 0x01, 0x7F]),
            ],
        )
        .await;
        assert_eq!(255, engine.fader(Fader::In));
        assert_eq!(0, engine.fader(Fader::Out));
        assert_eq!(0, engine.position());
    }
}
