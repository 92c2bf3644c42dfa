use std::fmt;

use thiserror::Error;

/// The durable cells shared by the detection and bridge processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKey {
    NumPlayers,
    GameStart,
    ScanningComplete,
    Done,
}

impl StateKey {
    pub const ALL: [StateKey; 4] = [
        StateKey::NumPlayers,
        StateKey::GameStart,
        StateKey::ScanningComplete,
        StateKey::Done,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StateKey::NumPlayers => "numPlayers",
            StateKey::GameStart => "gameStart",
            StateKey::ScanningComplete => "scanningComplete",
            StateKey::Done => "done",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to write cell {key}: {source}")]
    Write {
        key: StateKey,
        #[source]
        source: std::io::Error,
    },
}

/// One poll's view of every cell. Reads are not atomic across cells, so a
/// snapshot may mix values from before and after a concurrent write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub num_players: u32,
    pub game_start: bool,
    pub scanning_complete: bool,
    pub done: bool,
}

impl StoreSnapshot {
    /// True when no game is in flight: the state the store is left in by a reset.
    pub fn is_cleared(&self) -> bool {
        !self.game_start && !self.scanning_complete && !self.done
    }
}

/// Durable key/value cells with last-writer-wins semantics and no locking.
///
/// Implementations only provide raw string access; the typed accessors
/// degrade anything unreadable to the zero value instead of failing.
pub trait StateStore: Send + Sync {
    /// Returns the stored text, or `None` if the cell was never written or
    /// could not be read.
    fn read_raw(&self, key: StateKey) -> Option<String>;

    /// Replaces the whole value. A concurrent reader sees either the old or
    /// the new value, never a mix.
    fn write_raw(&self, key: StateKey, value: &str) -> Result<(), StoreError>;

    fn get_int(&self, key: StateKey) -> i64 {
        parse_cell(self.read_raw(key).as_deref())
    }

    fn get_bool(&self, key: StateKey) -> bool {
        self.get_int(key) != 0
    }

    fn set_int(&self, key: StateKey, value: i64) -> Result<(), StoreError> {
        self.write_raw(key, &value.to_string())?;
        log::debug!("Stored {key} = {value}");
        Ok(())
    }

    fn set_bool(&self, key: StateKey, value: bool) -> Result<(), StoreError> {
        self.set_int(key, value as i64)
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            num_players: self.get_int(StateKey::NumPlayers).clamp(0, u32::MAX as i64) as u32,
            game_start: self.get_bool(StateKey::GameStart),
            scanning_complete: self.get_bool(StateKey::ScanningComplete),
            done: self.get_bool(StateKey::Done),
        }
    }

    /// Writes zero to every cell. Keeps going past failures and returns the
    /// first one.
    fn reset_all(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in StateKey::ALL {
            if let Err(e) = self.set_int(key, 0) {
                log::warn!("{e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Parses a stored cell. Absent, empty or non-numeric text reads as `0`.
pub fn parse_cell(raw: Option<&str>) -> i64 {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return 0;
    };
    match text.parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("Unparsable store value {text:?}, treating as 0");
            0
        }
    }
}
