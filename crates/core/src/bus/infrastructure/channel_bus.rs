use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::bus::domain::bus_transport::{BusError, BusMessage, BusPublisher, BusSubscriber};

struct Route {
    prefixes: Arc<Mutex<Vec<String>>>,
    tx: Sender<BusMessage>,
}

struct BrokerState {
    routes: Mutex<Vec<Route>>,
    connected: AtomicBool,
}

/// In-process pub/sub broker on crossbeam channels.
///
/// Routes by topic prefix like ZeroMQ subscriptions. The connection can be
/// dropped and restored to exercise disconnected publishing.
#[derive(Clone)]
pub struct ChannelBroker {
    state: Arc<BrokerState>,
}

impl ChannelBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                routes: Mutex::new(Vec::new()),
                connected: AtomicBool::new(true),
            }),
        }
    }

    pub fn publisher(&self) -> ChannelPublisher {
        ChannelPublisher {
            state: self.state.clone(),
        }
    }

    pub fn subscriber(&self) -> ChannelSubscriber {
        let (tx, rx) = crossbeam_channel::unbounded();
        let prefixes = Arc::new(Mutex::new(Vec::new()));
        self.state
            .routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Route {
                prefixes: prefixes.clone(),
                tx,
            });
        ChannelSubscriber {
            state: self.state.clone(),
            prefixes,
            rx,
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for ChannelBroker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChannelPublisher {
    state: Arc<BrokerState>,
}

impl BusPublisher for ChannelPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(BusError::Disconnected);
        }
        let mut routes = self.state.routes.lock().unwrap_or_else(|e| e.into_inner());
        // Subscribers that were dropped have closed their receivers.
        routes.retain(|route| {
            let matches = route
                .prefixes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .any(|p| topic.starts_with(p.as_str()));
            if !matches {
                return true;
            }
            route
                .tx
                .send(BusMessage {
                    topic: topic.to_string(),
                    payload: payload.to_string(),
                })
                .is_ok()
        });
        Ok(())
    }
}

pub struct ChannelSubscriber {
    state: Arc<BrokerState>,
    prefixes: Arc<Mutex<Vec<String>>>,
    rx: Receiver<BusMessage>,
}

impl BusSubscriber for ChannelSubscriber {
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.prefixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(topic.to_string());
        Ok(())
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<BusMessage>, BusError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            std::thread::sleep(timeout);
            return Err(BusError::Disconnected);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Disconnected),
        }
    }
}
