use crate::quality::domain::face_record::FaceRecord;
use crate::session::domain::debouncer::{NotificationDebouncer, NotificationKind};
use crate::session::domain::phase::Phase;

/// One play-through, from game start until `done` or a reset.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id: u64,
    pub phase: Phase,
    /// Copied from the store when the session leaves `AwaitingPlayers`.
    pub num_players: u32,
    pub captured_faces: Vec<FaceRecord>,
    pub notifications: NotificationDebouncer,
}

impl Session {
    pub fn new(id: u64, num_players: u32) -> Self {
        let phase = if num_players > 0 {
            Phase::Capturing
        } else {
            Phase::AwaitingPlayers
        };
        Self {
            id,
            phase,
            num_players,
            captured_faces: Vec::new(),
            notifications: NotificationDebouncer::new(id),
        }
    }

    pub fn asked_players(&self) -> bool {
        self.notifications.has_fired(NotificationKind::AskPlayers)
    }

    pub fn informed_scanning(&self) -> bool {
        self.notifications.has_fired(NotificationKind::ScanningComplete)
    }
}
