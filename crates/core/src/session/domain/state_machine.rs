use std::path::PathBuf;

use crate::quality::domain::face_record::{FaceRecord, Verdict};
use crate::session::domain::debouncer::NotificationKind;
use crate::session::domain::phase::{Phase, PhaseCode};
use crate::session::domain::session::Session;
use crate::store::domain::state_store::{StateKey, StoreSnapshot};

/// Which process drives the machine.
///
/// Both run the same transitions; they differ in which store writes they
/// own. The bridge clears the store when a session finishes, the detector
/// writes `scanningComplete` when a batch is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionRole {
    Bridge,
    Detector,
}

/// Externally visible session events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SessionStarted { session_id: u64, num_players: u32 },
    AskPlayers { session_id: u64 },
    ScanningComplete { session_id: u64 },
    SessionFinished { session_id: u64 },
    SessionReset,
}

impl SessionEvent {
    /// The phase reported for this event, if it is a phase report at all.
    pub fn phase_code(&self) -> Option<PhaseCode> {
        match self {
            SessionEvent::SessionStarted { .. } => Some(PhaseCode::Processing),
            SessionEvent::ScanningComplete { .. } => Some(PhaseCode::Done),
            SessionEvent::SessionFinished { .. } | SessionEvent::SessionReset => {
                Some(PhaseCode::Idle)
            }
            SessionEvent::AskPlayers { .. } => None,
        }
    }
}

/// What the caller must do after a transition. The machine itself never
/// touches the store, the bus or the file system.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Write { key: StateKey, value: i64 },
    ResetStore,
    Notify(SessionEvent),
    DeleteArtifacts(Vec<PathBuf>),
}

/// Canonical phase model of the installation.
///
/// Transitions are derived from store snapshots, captured batches, gate
/// verdicts and reset commands. Every input is safe to repeat: feeding the
/// same snapshot twice yields no further effects.
pub struct SessionStateMachine {
    role: SessionRole,
    session: Option<Session>,
    next_session_id: u64,
}

impl SessionStateMachine {
    pub fn new(role: SessionRole) -> Self {
        Self {
            role,
            session: None,
            next_session_id: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.as_ref().map_or(Phase::Idle, |s| s.phase)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Advances the machine from one poll of the store.
    pub fn on_snapshot(&mut self, snapshot: &StoreSnapshot) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.session.is_none() {
            if snapshot.done {
                // Leftover from a session this process never saw.
                if self.role == SessionRole::Bridge {
                    log::info!("Clearing stale done flag");
                    effects.push(Effect::ResetStore);
                }
                return effects;
            }
            if !snapshot.game_start {
                self.clear_stale_scanning(snapshot, &mut effects);
                return effects;
            }
            if self.role == SessionRole::Detector && snapshot.scanning_complete {
                return effects;
            }
            self.start_session(snapshot.num_players, &mut effects);
        }

        let role = self.role;
        let Some(session) = self.session.as_mut() else {
            return effects;
        };

        // A game that is no longer started is over, whatever scanningComplete
        // says: a late accept can land after a reset.
        if !snapshot.game_start && !snapshot.done {
            log::info!(
                "Session {} cleared externally while {}",
                session.id,
                session.phase
            );
            let unjudged = unjudged_batch(session);
            self.session = None;
            effects.extend(unjudged);
            self.clear_stale_scanning(snapshot, &mut effects);
            return effects;
        }

        if snapshot.done {
            log::info!("Session {} finished", session.id);
            effects.push(Effect::Notify(SessionEvent::SessionFinished {
                session_id: session.id,
            }));
            if role == SessionRole::Bridge {
                effects.push(Effect::ResetStore);
            }
            self.session = None;
            return effects;
        }

        if snapshot.scanning_complete
            && matches!(session.phase, Phase::AwaitingPlayers | Phase::Capturing)
        {
            log::info!("Session {} scanning complete", session.id);
            session.phase = Phase::Completing;
        }

        match session.phase {
            Phase::AwaitingPlayers if snapshot.num_players > 0 => {
                session.num_players = snapshot.num_players;
                session.phase = Phase::Capturing;
                log::info!(
                    "Session {} capturing {} players",
                    session.id,
                    session.num_players
                );
            }
            Phase::AwaitingPlayers => {
                if session
                    .notifications
                    .should_fire(session.id, NotificationKind::AskPlayers)
                {
                    session
                        .notifications
                        .mark_fired(session.id, NotificationKind::AskPlayers);
                    effects.push(Effect::Notify(SessionEvent::AskPlayers {
                        session_id: session.id,
                    }));
                }
            }
            Phase::Completing if snapshot.scanning_complete => {
                notify_scanning_complete(session, &mut effects);
            }
            _ => {}
        }

        effects
    }

    /// Hands a complete batch of saved faces to the session.
    ///
    /// Outside `Capturing`, or when the batch size does not match the player
    /// count, the batch is discarded.
    pub fn on_faces_captured(&mut self, faces: Vec<FaceRecord>) -> Vec<Effect> {
        let phase = self.phase();
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.phase == Phase::Capturing)
        else {
            log::warn!("Discarding {} faces captured while {phase}", faces.len());
            return vec![discard(faces)];
        };

        if faces.len() != session.num_players as usize {
            log::warn!(
                "Discarding batch of {} faces, session {} expects {}",
                faces.len(),
                session.id,
                session.num_players
            );
            return vec![discard(faces)];
        }

        session.captured_faces = faces;
        session.phase = Phase::Validating;
        Vec::new()
    }

    /// The batch awaiting a verdict, for the quality gate to score in place.
    pub fn pending_batch_mut(&mut self) -> Option<&mut [FaceRecord]> {
        self.session
            .as_mut()
            .filter(|s| s.phase == Phase::Validating)
            .map(|s| s.captured_faces.as_mut_slice())
    }

    pub fn on_verdict(&mut self, verdict: &Verdict) -> Vec<Effect> {
        let phase = self.phase();
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.phase == Phase::Validating)
        else {
            log::warn!("Ignoring verdict while {phase}");
            return Vec::new();
        };

        let mut effects = Vec::new();
        if verdict.accepted {
            log::info!("Session {} batch accepted", session.id);
            session.phase = Phase::Completing;
            effects.push(Effect::Write {
                key: StateKey::ScanningComplete,
                value: 1,
            });
            notify_scanning_complete(session, &mut effects);
        } else {
            log::info!(
                "Session {} batch rejected, recapturing (blurry: {:?})",
                session.id,
                verdict.rejected_indices
            );
            session.phase = Phase::Capturing;
            effects.push(discard(std::mem::take(&mut session.captured_faces)));
        }
        effects
    }

    /// Manual override: clears the store and drops any session, from any phase.
    pub fn reset(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::ResetStore, Effect::Notify(SessionEvent::SessionReset)];
        match self.session.take() {
            Some(mut session) => {
                log::info!("Session {} reset while {}", session.id, session.phase);
                effects.extend(unjudged_batch(&mut session));
            }
            None => log::info!("Reset while idle"),
        }
        effects
    }

    /// The detector owns `scanningComplete`, so it takes back a value left
    /// behind once no game is running.
    fn clear_stale_scanning(&self, snapshot: &StoreSnapshot, effects: &mut Vec<Effect>) {
        if self.role == SessionRole::Detector && snapshot.scanning_complete && !snapshot.done {
            log::warn!("Clearing scanningComplete left over without a game");
            effects.push(Effect::Write {
                key: StateKey::ScanningComplete,
                value: 0,
            });
        }
    }

    fn start_session(&mut self, num_players: u32, effects: &mut Vec<Effect>) {
        let session = Session::new(self.next_session_id, num_players);
        self.next_session_id += 1;
        log::info!(
            "Session {} started with {} players ({})",
            session.id,
            num_players,
            session.phase
        );
        effects.push(Effect::Notify(SessionEvent::SessionStarted {
            session_id: session.id,
            num_players,
        }));
        self.session = Some(session);
    }
}

fn notify_scanning_complete(session: &mut Session, effects: &mut Vec<Effect>) {
    let kind = NotificationKind::ScanningComplete;
    if session.notifications.should_fire(session.id, kind) {
        session.notifications.mark_fired(session.id, kind);
        effects.push(Effect::Notify(SessionEvent::ScanningComplete {
            session_id: session.id,
        }));
    }
}

/// A batch still waiting for its verdict has no owner once the session goes.
/// An accepted batch is left for the downstream consumer.
fn unjudged_batch(session: &mut Session) -> Option<Effect> {
    (session.phase == Phase::Validating)
        .then(|| discard(std::mem::take(&mut session.captured_faces)))
}

fn discard(faces: Vec<FaceRecord>) -> Effect {
    Effect::DeleteArtifacts(faces.into_iter().map(|f| f.image_path).collect())
}
