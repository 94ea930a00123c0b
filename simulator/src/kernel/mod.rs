//! Discrete-event simulation kernel: logical clock, event queue and component contexts.

pub mod context;
pub mod event;
pub mod handler;
pub mod log;
pub mod simulation;
mod state;

pub use context::SimulationContext;
pub use event::{Event, EventId};
pub use handler::EventHandler;
pub use simulation::{RunState, Simulation};

/// Identifier of a simulation component (datacenter, broker, ...).
pub type Id = u32;
