use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::effect_applier::apply_effects;
use crate::session::domain::event_sink::EventSink;
use crate::session::domain::phase::Phase;
use crate::session::domain::state_machine::{SessionEvent, SessionRole, SessionStateMachine};
use crate::store::domain::state_store::{StateKey, StateStore};

/// Operator stand-in for the bus bridge, for bench testing the detector.
///
/// Asks for a player count, starts a game through the store, then follows
/// the session until the downstream consumer reports done.
pub struct ConsoleDriver<R, W> {
    input: R,
    output: W,
    store: Arc<dyn StateStore>,
    poll_interval: Duration,
}

impl<R: BufRead, W: Write> ConsoleDriver<R, W> {
    pub fn new(input: R, output: W, store: Arc<dyn StateStore>, poll_interval: Duration) -> Self {
        Self {
            input,
            output,
            store,
            poll_interval,
        }
    }

    /// Runs games until the operator types `exit` or input ends. The store
    /// is cleared on the way out.
    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while let Some(players) = self.prompt_players()? {
            writeln!(self.output, "Searching for {players} face(s)...")?;
            self.store.set_int(StateKey::NumPlayers, players as i64)?;
            self.store.set_bool(StateKey::GameStart, true)?;
            self.follow_session(players);
        }

        writeln!(self.output, "Exiting. Resetting game state...")?;
        self.store.reset_all()?;
        Ok(())
    }

    /// `None` once the operator quits.
    fn prompt_players(&mut self) -> Result<Option<u32>, std::io::Error> {
        loop {
            write!(self.output, "Enter the number of players (or 'exit' to quit): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(None);
            }
            match line.trim() {
                "exit" => return Ok(None),
                text => match text.parse::<u32>() {
                    Ok(players) if players > 0 => return Ok(Some(players)),
                    _ => writeln!(self.output, "Not a player count: {text:?}")?,
                },
            }
        }
    }

    fn follow_session(&mut self, players: u32) {
        let mut machine = SessionStateMachine::new(SessionRole::Bridge);
        let mut events = ConsoleEvents {
            output: &mut self.output,
            players,
        };
        let ticker = crossbeam_channel::tick(self.poll_interval);

        loop {
            let snapshot = self.store.snapshot();
            let effects = machine.on_snapshot(&snapshot);
            apply_effects(effects, self.store.as_ref(), None, &mut events);
            if machine.phase() == Phase::Idle {
                break;
            }
            if ticker.recv().is_err() {
                break;
            }
        }
    }
}

struct ConsoleEvents<'a, W> {
    output: &'a mut W,
    players: u32,
}

impl<W: Write> EventSink for ConsoleEvents<'_, W> {
    fn emit(&mut self, event: &SessionEvent) {
        let line = match event {
            SessionEvent::ScanningComplete { .. } => format!(
                "Scanning completed. Found {} face(s). Generating images...",
                self.players
            ),
            SessionEvent::SessionFinished { .. } => {
                "Generating complete. Resetting game state...".to_string()
            }
            other => {
                log::debug!("Session event: {other:?}");
                return;
            }
        };
        if let Err(e) = writeln!(self.output, "{line}") {
            log::warn!("Console write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;
    use std::time::Instant;

    use crate::store::domain::state_store::StoreSnapshot;
    use crate::store::infrastructure::memory_state_store::MemoryStateStore;

    fn wait_until(store: &MemoryStateStore, pred: impl Fn(StoreSnapshot) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !pred(store.snapshot()) {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_one_game_then_exit() {
        let store = Arc::new(MemoryStateStore::new());
        let downstream = {
            let store = store.clone();
            thread::spawn(move || {
                wait_until(&store, |s| s.game_start);
                assert_eq!(store.snapshot().num_players, 2);
                store.set_bool(StateKey::ScanningComplete, true).unwrap();
                thread::sleep(Duration::from_millis(30));
                store.set_bool(StateKey::Done, true).unwrap();
            })
        };

        let mut output = Vec::new();
        let mut driver = ConsoleDriver::new(
            Cursor::new("2\nexit\n"),
            &mut output,
            store.clone(),
            Duration::from_millis(2),
        );
        driver.run().unwrap();
        downstream.join().unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("Enter the number of players").count(), 2);
        assert!(text.contains("Searching for 2 face(s)..."));
        assert_eq!(
            text.matches("Scanning completed. Found 2 face(s). Generating images...")
                .count(),
            1
        );
        let complete = text.find("Generating complete").unwrap();
        assert!(text.find("Scanning completed").unwrap() < complete);
        assert!(text.ends_with("Exiting. Resetting game state...\n"));
        assert_eq!(store.snapshot(), StoreSnapshot::default());
    }

    #[test]
    fn test_invalid_counts_are_reprompted() {
        let store = Arc::new(MemoryStateStore::new());
        let mut output = Vec::new();
        let mut driver = ConsoleDriver::new(
            Cursor::new("abc\n0\nexit\n"),
            &mut output,
            store.clone(),
            Duration::from_millis(2),
        );

        driver.run().unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains(r#"Not a player count: "abc""#));
        assert!(text.contains(r#"Not a player count: "0""#));
        assert!(!text.contains("Searching"));
        // Only the reset on exit.
        assert_eq!(store.write_count(), StateKey::ALL.len());
    }

    #[test]
    fn test_end_of_input_resets_and_returns() {
        let store = Arc::new(MemoryStateStore::new());
        store.set_int(StateKey::NumPlayers, 4).unwrap();
        let mut output = Vec::new();

        ConsoleDriver::new(Cursor::new(""), &mut output, store.clone(), Duration::from_millis(2))
            .run()
            .unwrap();

        assert_eq!(store.snapshot().num_players, 0);
    }

    #[test]
    fn test_externally_cleared_game_returns_to_prompt() {
        let store = Arc::new(MemoryStateStore::new());
        let downstream = {
            let store = store.clone();
            thread::spawn(move || {
                wait_until(&store, |s| s.game_start);
                store.reset_all().unwrap();
            })
        };

        let mut output = Vec::new();
        ConsoleDriver::new(Cursor::new("3\n"), &mut output, store.clone(), Duration::from_millis(2))
            .run()
            .unwrap();
        downstream.join().unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(!text.contains("Scanning completed"));
        assert_eq!(text.matches("Enter the number of players").count(), 2);
    }
}
