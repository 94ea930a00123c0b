use crate::kernel::event::Event;

/// Component that reacts to events addressed to it.
///
/// Handlers run to completion: the next event is popped only after `on` returns.
pub trait EventHandler {
    fn on(&mut self, event: Event);
}
