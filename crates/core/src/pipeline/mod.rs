pub mod bridge_coordinator;
pub mod capture_faces_use_case;
pub mod console_driver;
pub mod effect_applier;
pub mod session_logger;
