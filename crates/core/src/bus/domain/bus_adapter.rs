use std::net::UdpSocket;

use crate::bus::domain::bus_transport::BusPublisher;
use crate::bus::domain::envelope::{self, Inbound, InboundCommand};
use crate::session::domain::event_sink::EventSink;
use crate::session::domain::state_machine::SessionEvent;
use crate::shared::config::BusConfig;
use crate::store::domain::state_store::{StateKey, StateStore, StoreError};

/// Translates between bus envelopes and the installation.
///
/// Inbound: decodes envelopes into commands, drops self-echoes and malformed
/// payloads, and writes player count and game start into the store.
/// Outbound: turns session events into phase reports and lifecycle
/// announcements. A publish that fails is logged and dropped.
pub struct BusAdapter {
    identity: String,
    version: String,
    topics: BusConfig,
    local_ip: String,
    publisher: Box<dyn BusPublisher>,
}

impl BusAdapter {
    pub fn new(
        identity: impl Into<String>,
        version: impl Into<String>,
        topics: BusConfig,
        publisher: Box<dyn BusPublisher>,
    ) -> Self {
        Self {
            identity: identity.into(),
            version: version.into(),
            topics,
            local_ip: discover_local_ip(),
            publisher,
        }
    }

    pub fn with_local_ip(mut self, ip: impl Into<String>) -> Self {
        self.local_ip = ip.into();
        self
    }

    pub fn inbound_topic(&self) -> &str {
        &self.topics.inbound_topic
    }

    /// Decodes one inbound payload. Self-echoes and malformed payloads yield
    /// no commands.
    pub fn decode(&self, payload: &str) -> Vec<InboundCommand> {
        match envelope::decode_inbound(payload, &self.identity) {
            Ok(Inbound::Commands(commands)) => {
                if commands.is_empty() {
                    log::debug!("Ignoring envelope without commands: {payload}");
                }
                commands
            }
            Ok(Inbound::SelfEcho) => {
                log::debug!("Ignoring own message");
                Vec::new()
            }
            Err(e) => {
                log::warn!("Dropping malformed message ({e}): {payload}");
                Vec::new()
            }
        }
    }

    /// Carries out a command that does not involve the session.
    ///
    /// Player count and game start become store writes, a system query is
    /// answered directly. `Reset` is left to the caller, which owns the
    /// session.
    pub fn apply(&self, command: &InboundCommand, store: &dyn StateStore) -> Result<(), StoreError> {
        match command {
            InboundCommand::SetPlayers(players) => {
                log::info!("Player count received: {players}");
                store.set_int(StateKey::NumPlayers, *players as i64)
            }
            InboundCommand::SetGameStart(start) => {
                log::info!("Game start received: {start}");
                store.set_bool(StateKey::GameStart, *start)
            }
            InboundCommand::SystemInfoRequest => {
                self.send(
                    &self.topics.status_topic,
                    &envelope::system_info(&self.identity, &self.local_ip, &self.version, "request"),
                );
                Ok(())
            }
            InboundCommand::Reset => Ok(()),
        }
    }

    pub fn announce_startup(&self) {
        self.send(
            &self.topics.status_topic,
            &envelope::system_info(&self.identity, &self.local_ip, &self.version, "startup"),
        );
    }

    pub fn announce_shutdown(&self) {
        self.send(&self.topics.status_topic, &envelope::disconnected(&self.identity));
    }

    pub fn publish_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::AskPlayers { .. } => {
                self.send(&self.topics.game_topic, &envelope::ask_players(&self.identity));
            }
            other => {
                if let Some(code) = other.phase_code() {
                    self.send(
                        &self.topics.status_topic,
                        &envelope::phase_report(&self.identity, code),
                    );
                }
            }
        }
    }

    fn send(&self, topic: &str, payload: &str) {
        match self.publisher.publish(topic, payload) {
            Ok(()) => log::info!("Published to {topic}: {payload}"),
            Err(e) => log::warn!("Dropped message for {topic} ({e}): {payload}"),
        }
    }
}

impl EventSink for BusAdapter {
    fn emit(&mut self, event: &SessionEvent) {
        self.publish_event(event);
    }
}

/// Address of the interface that routes off-host. No packet is sent; the
/// connect only selects a route. Falls back to loopback.
fn discover_local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("192.0.2.1:9")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}
