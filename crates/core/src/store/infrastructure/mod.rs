pub mod file_state_store;
pub mod memory_state_store;
