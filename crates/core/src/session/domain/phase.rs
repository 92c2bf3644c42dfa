use std::fmt;

/// Where a session stands. `Idle` means no session is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingPlayers,
    Capturing,
    Validating,
    Completing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AwaitingPlayers => "awaiting players",
            Phase::Capturing => "capturing",
            Phase::Validating => "validating",
            Phase::Completing => "completing",
        };
        f.write_str(name)
    }
}

/// Phase as reported to the control system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i64)]
pub enum PhaseCode {
    Idle = 0,
    Processing = 1,
    Done = 2,
}

impl PhaseCode {
    pub fn value(self) -> i64 {
        self as i64
    }
}
