use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand_distr::Distribution;

use crate::error::SimError;
use crate::events::EventData;
use crate::kernel::event::EventId;
use crate::kernel::state::SimulationState;
use crate::kernel::Id;

/// Per-component handle to the simulation: clock access, event emission and randomness.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Schedules an event for `dst` after `delay`.
    ///
    /// Panics if the delay is negative or NaN, see [`try_emit`](Self::try_emit).
    pub fn emit(&self, data: EventData, dst: Id, delay: f64) -> EventId {
        self.try_emit(data, dst, delay)
            .unwrap_or_else(|e| panic!("{}: {}", self.name, e))
    }

    pub fn try_emit(&self, data: EventData, dst: Id, delay: f64) -> Result<EventId, SimError> {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, delay)
    }

    pub fn emit_now(&self, data: EventData, dst: Id) -> EventId {
        self.emit(data, dst, 0.)
    }

    pub fn emit_self(&self, data: EventData, delay: f64) -> EventId {
        self.emit(data, self.id, delay)
    }

    pub fn emit_self_now(&self, data: EventData) -> EventId {
        self.emit(data, self.id, 0.)
    }

    /// Cancels a pending event. Returns false if it was already delivered or canceled.
    pub fn cancel_event(&self, id: EventId) -> bool {
        self.sim_state.borrow_mut().cancel_event(id)
    }

    pub fn lookup_name(&self, id: Id) -> Option<String> {
        self.sim_state.borrow().lookup_name(id).map(str::to_owned)
    }

    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&self, dist: &Dist) -> T {
        self.sim_state.borrow_mut().sample_from_distribution(dist)
    }

    /// Keeps the run loop from reporting completion while input is still expected.
    pub fn hold(&self) {
        self.sim_state.borrow_mut().hold();
    }

    pub fn release(&self) {
        self.sim_state.borrow_mut().release();
    }

    /// Asks the run loop to stop after the current event.
    pub fn request_pause(&self) {
        self.sim_state.borrow_mut().request_pause();
    }
}
