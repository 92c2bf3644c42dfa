use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{select, Sender};

use crate::bus::domain::bus_adapter::BusAdapter;
use crate::bus::domain::bus_transport::{BusError, BusSubscriber};
use crate::bus::domain::envelope::InboundCommand;
use crate::pipeline::effect_applier::apply_effects;
use crate::session::domain::phase::Phase;
use crate::session::domain::state_machine::{SessionRole, SessionStateMachine};
use crate::store::domain::state_store::StateStore;

/// How long the receive thread blocks before re-checking for shutdown.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(200);

/// The bridge process: bus commands in, store writes and phase reports out.
///
/// The coordinator owns the session. Store polls come from a ticker and
/// inbound payloads arrive over a channel from the receive thread, so both
/// are handled on one thread.
pub struct BridgeCoordinator {
    machine: SessionStateMachine,
    store: Arc<dyn StateStore>,
    adapter: BusAdapter,
}

impl BridgeCoordinator {
    pub fn new(store: Arc<dyn StateStore>, adapter: BusAdapter) -> Self {
        Self {
            machine: SessionStateMachine::new(SessionRole::Bridge),
            store,
            adapter,
        }
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn poll(&mut self) {
        let snapshot = self.store.snapshot();
        let effects = self.machine.on_snapshot(&snapshot);
        apply_effects(effects, self.store.as_ref(), None, &mut self.adapter);
    }

    pub fn handle_payload(&mut self, payload: &str) {
        for command in self.adapter.decode(payload) {
            if command == InboundCommand::Reset {
                log::info!("Reset requested");
                let effects = self.machine.reset();
                apply_effects(effects, self.store.as_ref(), None, &mut self.adapter);
            } else if let Err(e) = self.adapter.apply(&command, self.store.as_ref()) {
                log::error!("{e}");
            }
        }
    }

    /// Runs until `shutdown` is set, then stops the receive thread and
    /// announces the disconnect.
    pub fn run(
        mut self,
        mut subscriber: Box<dyn BusSubscriber>,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        subscriber.subscribe(self.adapter.inbound_topic())?;
        log::info!("Listening on {}", self.adapter.inbound_topic());
        self.adapter.announce_startup();

        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let receiver_shutdown = shutdown.clone();
        let receiver = thread::Builder::new()
            .name("bus-receive".into())
            .spawn(move || receive_loop(subscriber, tx, receiver_shutdown))?;

        let ticker = crossbeam_channel::tick(poll_interval);
        self.poll();

        while !shutdown.load(Ordering::SeqCst) {
            select! {
                recv(ticker) -> _ => self.poll(),
                recv(rx) -> payload => match payload {
                    Ok(payload) => self.handle_payload(&payload),
                    Err(_) => {
                        log::error!("Bus receive thread stopped");
                        break;
                    }
                },
            }
        }

        shutdown.store(true, Ordering::SeqCst);
        if receiver.join().is_err() {
            log::error!("Bus receive thread panicked");
        }
        self.adapter.announce_shutdown();
        log::info!("Bridge stopped");
        Ok(())
    }
}

fn receive_loop(mut subscriber: Box<dyn BusSubscriber>, tx: Sender<String>, shutdown: Arc<AtomicBool>) {
    let mut connected = true;
    while !shutdown.load(Ordering::SeqCst) {
        match subscriber.receive_timeout(RECEIVE_TIMEOUT) {
            Ok(Some(message)) => {
                if !connected {
                    log::info!("Bus connection restored");
                    connected = true;
                }
                log::debug!("Received on {}: {}", message.topic, message.payload);
                if tx.send(message.payload).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(BusError::Disconnected) => {
                if connected {
                    log::warn!("Bus disconnected, waiting for the transport to reconnect");
                    connected = false;
                }
            }
            Err(e) => log::warn!("{e}"),
        }
    }
}
