pub mod bus;
pub mod capture;
pub mod detection;
pub mod pipeline;
pub mod quality;
pub mod session;
pub mod shared;
pub mod store;
