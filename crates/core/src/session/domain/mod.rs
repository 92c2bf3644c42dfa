pub mod debouncer;
pub mod event_sink;
pub mod phase;
pub mod session;
pub mod state_machine;
