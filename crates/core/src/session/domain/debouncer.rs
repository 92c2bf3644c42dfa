/// Notifications that are tied to a persisted condition and therefore
/// re-observed on every poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    AskPlayers,
    ScanningComplete,
}

/// Lets each (session, notification) pair through once.
///
/// Holds the `asked_players` and `informed_scanning` flags of one session.
/// The flags only move from `false` to `true`; a new session starts with a
/// fresh debouncer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationDebouncer {
    session_id: u64,
    asked_players: bool,
    informed_scanning: bool,
}

impl NotificationDebouncer {
    pub fn new(session_id: u64) -> Self {
        Self {
            session_id,
            asked_players: false,
            informed_scanning: false,
        }
    }

    /// `false` once `kind` has fired for `session_id`, and always `false`
    /// for a session other than the one this debouncer belongs to.
    pub fn should_fire(&self, session_id: u64, kind: NotificationKind) -> bool {
        session_id == self.session_id && !self.has_fired(kind)
    }

    pub fn mark_fired(&mut self, session_id: u64, kind: NotificationKind) {
        if session_id != self.session_id {
            log::warn!(
                "Ignoring {kind:?} for session {session_id}, current session is {}",
                self.session_id
            );
            return;
        }
        match kind {
            NotificationKind::AskPlayers => self.asked_players = true,
            NotificationKind::ScanningComplete => self.informed_scanning = true,
        }
    }

    pub fn has_fired(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::AskPlayers => self.asked_players,
            NotificationKind::ScanningComplete => self.informed_scanning,
        }
    }
}
