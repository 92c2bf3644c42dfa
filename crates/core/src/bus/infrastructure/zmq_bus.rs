use std::sync::Mutex;
use std::time::Duration;

use crate::bus::domain::bus_transport::{BusError, BusMessage, BusPublisher, BusSubscriber};
use crate::shared::config::BusConfig;

impl From<zmq::Error> for BusError {
    fn from(e: zmq::Error) -> Self {
        BusError::Transport(e.to_string())
    }
}

/// Connects both halves to the endpoints in `bus`. Sockets keep their
/// context alive.
pub fn connect(bus: &BusConfig) -> Result<(ZmqPublisher, ZmqSubscriber), BusError> {
    let context = zmq::Context::new();
    let publisher = ZmqPublisher::connect(&context, &bus.publish_endpoint)?;
    let subscriber = ZmqSubscriber::connect(&context, &bus.subscribe_endpoint)?;
    Ok((publisher, subscriber))
}

/// PUB socket connected to the installation broker.
///
/// Messages are multipart `[topic, payload]`.
pub struct ZmqPublisher {
    socket: Mutex<zmq::Socket>,
}

impl ZmqPublisher {
    pub fn connect(context: &zmq::Context, endpoint: &str) -> Result<Self, BusError> {
        let socket = context.socket(zmq::PUB)?;
        socket.set_linger(0)?;
        // Fail fast instead of queueing when the broker is unreachable.
        socket.set_sndtimeo(0)?;
        socket.connect(endpoint)?;
        log::info!("Publishing to {endpoint}");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

impl BusPublisher for ZmqPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        let socket = self.socket.lock().unwrap_or_else(|e| e.into_inner());
        match socket.send_multipart([topic.as_bytes(), payload.as_bytes()], zmq::DONTWAIT) {
            Ok(()) => Ok(()),
            Err(zmq::Error::EAGAIN) => Err(BusError::Disconnected),
            Err(e) => Err(e.into()),
        }
    }
}

/// SUB socket connected to the installation broker.
pub struct ZmqSubscriber {
    socket: zmq::Socket,
}

impl ZmqSubscriber {
    pub fn connect(context: &zmq::Context, endpoint: &str) -> Result<Self, BusError> {
        let socket = context.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        socket.connect(endpoint)?;
        log::info!("Subscribed via {endpoint}");
        Ok(Self { socket })
    }
}

impl BusSubscriber for ZmqSubscriber {
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.socket.set_subscribe(topic.as_bytes())?;
        Ok(())
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<BusMessage>, BusError> {
        let mut items = [self.socket.as_poll_item(zmq::POLLIN)];
        zmq::poll(&mut items, timeout.as_millis() as i64)?;
        if !items[0].is_readable() {
            return Ok(None);
        }

        let parts = self.socket.recv_multipart(0)?;
        let (topic, payload) = match parts.as_slice() {
            [payload] => (Vec::new(), payload.clone()),
            [topic, payload, ..] => (topic.clone(), payload.clone()),
            [] => return Ok(None),
        };
        Ok(Some(BusMessage {
            topic: String::from_utf8_lossy(&topic).into_owned(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
        }))
    }
}
