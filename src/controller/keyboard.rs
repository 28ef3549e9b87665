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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use crate::crossfade::Fader;

use super::Event;

const GO: &str = "go";
const STOP: &str = "stop";
const PAUSE: &str = "pause";
const RESUME: &str = "resume";
const GOTO: &str = "goto";
const AT: &str = "at";
const OUT: &str = "out";
const IN: &str = "in";
const MIDI: &str = "midi";
const QUIT: &str = "quit";

/// A controller that drives the engine from typed commands.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and sends a single command. Returns false once the operator quits or the input
    /// is closed.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {}, {}, {} <cue>, {} <channel> <level>, {} <0-255>, {} <0-255>, {} <hex bytes>, {}): ",
            GO, STOP, PAUSE, RESUME, GOTO, AT, OUT, IN, MIDI, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let event = match parse(&input) {
            Ok(event) => event,
            Err(e) => {
                warn!(input = input.trim(), err = %e, "Unrecognized input");
                return Ok(true);
            }
        };
        let quit = event == Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(!quit)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a typed command. Channels are numbered from 1 as on the console.
fn parse(input: &str) -> Result<Event, String> {
    let input = input.trim().to_lowercase();
    let mut words = input.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let event = match (command, args.as_slice()) {
        (GO, []) => Event::Go,
        (STOP, []) => Event::Stop,
        (PAUSE, []) => Event::Pause,
        (RESUME, []) => Event::Resume,
        (QUIT, []) => Event::Quit,
        (GOTO, [memory]) => Event::Goto(
            memory
                .parse::<f32>()
                .map_err(|e| format!("bad cue number: {}", e))?,
        ),
        (AT, [channel, level]) => {
            let channel = channel
                .parse::<usize>()
                .ok()
                .and_then(|channel| channel.checked_sub(1))
                .ok_or_else(|| format!("bad channel: {}", channel))?;
            Event::Override {
                channel,
                level: parse_level(level)?,
            }
        }
        (OUT, [position]) => Event::Fader(Fader::Out, parse_level(position)?),
        (IN, [position]) => Event::Fader(Fader::In, parse_level(position)?),
        (MIDI, bytes) if !bytes.is_empty() => Event::Midi(
            bytes
                .iter()
                .map(|byte| {
                    u8::from_str_radix(byte.trim_start_matches("0x"), 16)
                        .map_err(|e| format!("bad MIDI byte {}: {}", byte, e))
                })
                .collect::<Result<Vec<u8>, String>>()?,
        ),
        _ => return Err(format!("unknown command: {}", input)),
    };
    Ok(event)
}

fn parse_level(level: &str) -> Result<u8, String> {
    level
        .parse::<u8>()
        .map_err(|e| format!("bad level {}: {}", level, e))
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::Event;
    use crate::crossfade::Fader;

    use super::{parse, Driver};

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let keep_going = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((keep_going, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Go)), get_event("go\n")?);
        assert_eq!((true, Some(Event::Stop)), get_event("STOP\n")?);
        assert_eq!((true, Some(Event::Pause)), get_event("pause")?);
        assert_eq!((true, Some(Event::Resume)), get_event("resume")?);
        assert_eq!((true, Some(Event::Goto(4.5))), get_event("goto 4.5")?);
        assert_eq!((false, Some(Event::Quit)), get_event("quit")?);
        assert_eq!((true, None), get_event("unrecognized")?);
        // Closed input.
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            Ok(Event::Override {
                channel: 0,
                level: 255
            }),
            parse("at 1 255")
        );
        assert_eq!(Ok(Event::Fader(Fader::Out, 10)), parse("out 10"));
        assert_eq!(Ok(Event::Fader(Fader::In, 0)), parse(" in 0 "));
        assert_eq!(
            Ok(Event::Midi(vec![0xB0, 0x07, 0x7F])),
            parse("midi b0 0x07 7F")
        );

        assert!(parse("at 0 10").is_err());
        assert!(parse("at 1 256").is_err());
        assert!(parse("at 1").is_err());
        assert!(parse("out").is_err());
        assert!(parse("goto one").is_err());
        assert!(parse("go now").is_err());
        assert!(parse("midi").is_err());
        assert!(parse("midi zz").is_err());
        assert!(parse("").is_err());
    }
}
