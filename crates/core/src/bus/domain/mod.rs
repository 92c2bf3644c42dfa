pub mod bus_adapter;
pub mod bus_transport;
pub mod envelope;
