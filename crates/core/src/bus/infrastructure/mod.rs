pub mod channel_bus;
#[cfg(feature = "zmq-transport")]
pub mod zmq_bus;
