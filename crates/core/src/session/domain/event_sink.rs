use crate::session::domain::state_machine::SessionEvent;

/// Where a process surfaces session events: the bus for the bridge, the log
/// for the detector, the terminal for the console driver.
pub trait EventSink {
    fn emit(&mut self, event: &SessionEvent);
}
