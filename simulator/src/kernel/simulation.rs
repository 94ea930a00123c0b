use std::cell::RefCell;
use std::rc::Rc;

use crate::kernel::context::SimulationContext;
use crate::kernel::event::Event;
use crate::kernel::handler::EventHandler;
use crate::kernel::state::SimulationState;
use crate::kernel::Id;

/// Outcome of [`Simulation::run`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunState {
    /// The queue is empty and nothing holds the simulation open.
    Completed,
    /// Stopped at `time` because of a pause point or a pause request.
    Paused { time: f64 },
    /// The queue is empty but some component still expects input.
    AwaitingInput,
}

pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
    pause_at: Option<f64>,
}

impl Simulation {
    pub fn new(seed: u64) -> Self {
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(seed))),
            handlers: Vec::new(),
            pause_at: None,
        }
    }

    /// Registers a component name and returns its context.
    pub fn create_context<S: AsRef<str>>(&mut self, name: S) -> SimulationContext {
        let id = self.sim_state.borrow_mut().register(name.as_ref());
        self.handlers.push(None);
        SimulationContext::new(id, name.as_ref(), self.sim_state.clone())
    }

    pub fn add_handler<S: AsRef<str>>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id {
        let id = self
            .lookup_id(name.as_ref())
            .unwrap_or_else(|| panic!("component {} is not registered", name.as_ref()));
        self.handlers[id as usize] = Some(handler);
        id
    }

    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.sim_state.borrow().lookup_id(name)
    }

    pub fn lookup_name(&self, id: Id) -> Option<String> {
        self.sim_state.borrow().lookup_name(id).map(str::to_owned)
    }

    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Number of events delivered so far.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    pub fn pending_events(&self) -> usize {
        self.sim_state.borrow().pending_events()
    }

    /// Delivers the next event. Returns false when the queue is empty.
    pub fn step(&mut self) -> bool {
        let next = self.sim_state.borrow_mut().next_event();
        match next {
            Some(event) => {
                self.deliver(event);
                true
            }
            None => false,
        }
    }

    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Delivers every event with time not later than `time`, then moves the clock to `time`.
    /// Returns true if there are events left in the queue.
    pub fn step_until_time(&mut self, time: f64) -> bool {
        loop {
            let next_time = self.sim_state.borrow_mut().peek_time();
            match next_time {
                Some(t) if t <= time => {
                    self.step();
                }
                Some(_) => {
                    self.sim_state.borrow_mut().advance_to(time);
                    return true;
                }
                None => {
                    self.sim_state.borrow_mut().advance_to(time);
                    return false;
                }
            }
        }
    }

    /// Makes [`run`](Self::run) stop before the first event later than `time`.
    pub fn pause_at(&mut self, time: f64) {
        assert!(
            time >= self.time(),
            "pause time {} is in the past (now {})",
            time,
            self.time()
        );
        self.pause_at = Some(time);
    }

    pub fn resume(&mut self) {
        self.pause_at = None;
        self.sim_state.borrow_mut().take_pause_request();
    }

    pub fn is_pause_pending(&self) -> bool {
        self.pause_at.is_some()
    }

    /// Processes events until the queue drains or the simulation is paused.
    ///
    /// A pause point stays active until [`resume`](Self::resume) is called,
    /// so calling `run` again without resuming returns immediately.
    pub fn run(&mut self) -> RunState {
        loop {
            if self.sim_state.borrow_mut().take_pause_request() {
                return RunState::Paused { time: self.time() };
            }
            let next_time = self.sim_state.borrow_mut().peek_time();
            if let Some(pause) = self.pause_at {
                if next_time.map_or(true, |t| t > pause) {
                    self.sim_state.borrow_mut().advance_to(pause);
                    return RunState::Paused { time: self.time() };
                }
            }
            if next_time.is_none() {
                return if self.sim_state.borrow().holds() > 0 {
                    RunState::AwaitingInput
                } else {
                    RunState::Completed
                };
            }
            self.step();
        }
    }

    fn deliver(&mut self, event: Event) {
        let handler = self.handlers.get(event.dst as usize).and_then(Clone::clone);
        match handler {
            Some(handler) => handler.borrow_mut().on(event),
            None => {
                log::warn!(
                    "[{:.3} WARN  simulation] dropped event #{} ({}) from {} to component {} without handler",
                    self.time(),
                    event.id,
                    event.data.kind(),
                    event.src,
                    event.dst
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use sugars::{rc, refcell};

    use super::*;
    use crate::events::EventData;

    struct Recorder {
        ctx: SimulationContext,
        seen: Vec<(f64, u32)>,
        echo_until: Option<u32>,
    }

    impl EventHandler for Recorder {
        fn on(&mut self, event: Event) {
            if let EventData::Custom { tag } = event.data {
                self.seen.push((self.ctx.time(), tag));
                if let Some(limit) = self.echo_until {
                    if tag < limit {
                        self.ctx.emit_self(EventData::Custom { tag: tag + 1 }, 1.);
                    }
                }
            }
        }
    }

    fn recorder(sim: &mut Simulation, name: &str) -> Rc<RefCell<Recorder>> {
        let ctx = sim.create_context(name);
        let recorder = rc!(refcell!(Recorder {
            ctx,
            seen: Vec::new(),
            echo_until: None,
        }));
        sim.add_handler(name, recorder.clone());
        recorder
    }

    #[test]
    fn events_are_delivered_by_time_then_insertion_order() {
        let mut sim = Simulation::new(42);
        let rec = recorder(&mut sim, "rec");
        let client = sim.create_context("client");
        let dst = rec.borrow().ctx.id();
        client.emit(EventData::Custom { tag: 1 }, dst, 5.);
        client.emit(EventData::Custom { tag: 2 }, dst, 1.);
        client.emit(EventData::Custom { tag: 3 }, dst, 5.);
        client.emit(EventData::Custom { tag: 4 }, dst, 1.);

        sim.step_until_no_events();

        assert_eq!(rec.borrow().seen, vec![(1., 2), (1., 4), (5., 1), (5., 3)]);
        assert_eq!(sim.time(), 5.);
        assert_eq!(sim.event_count(), 4);
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut sim = Simulation::new(1);
        let ctx = sim.create_context("client");
        let result = ctx.try_emit(EventData::Custom { tag: 0 }, ctx.id(), -1.);
        assert!(result.is_err());
        assert!(ctx.try_emit(EventData::Custom { tag: 0 }, ctx.id(), f64::NAN).is_err());
        assert_eq!(sim.pending_events(), 0);
    }

    #[test]
    #[should_panic]
    fn emit_panics_on_negative_delay() {
        let mut sim = Simulation::new(1);
        let ctx = sim.create_context("client");
        ctx.emit_self(EventData::Custom { tag: 0 }, -0.5);
    }

    #[test]
    fn canceled_events_are_skipped() {
        let mut sim = Simulation::new(7);
        let rec = recorder(&mut sim, "rec");
        let ctx = sim.create_context("client");
        let dst = rec.borrow().ctx.id();
        let first = ctx.emit(EventData::Custom { tag: 1 }, dst, 1.);
        ctx.emit(EventData::Custom { tag: 2 }, dst, 2.);
        ctx.cancel_event(first);

        sim.step_until_no_events();

        assert_eq!(rec.borrow().seen, vec![(2., 2)]);
        assert_eq!(sim.event_count(), 1);
    }

    #[test]
    fn delivered_events_cannot_be_canceled() {
        let mut sim = Simulation::new(7);
        let rec = recorder(&mut sim, "rec");
        let ctx = sim.create_context("client");
        let dst = rec.borrow().ctx.id();
        let first = ctx.emit(EventData::Custom { tag: 1 }, dst, 1.);
        let second = ctx.emit(EventData::Custom { tag: 2 }, dst, 2.);
        ctx.emit(EventData::Custom { tag: 3 }, dst, 3.);
        assert_eq!(sim.pending_events(), 3);

        assert!(sim.step());
        assert!(!ctx.cancel_event(first));
        assert_eq!(sim.pending_events(), 2);

        assert!(ctx.cancel_event(second));
        assert!(!ctx.cancel_event(second));
        assert_eq!(sim.pending_events(), 1);

        sim.step_until_no_events();
        assert_eq!(sim.pending_events(), 0);
        assert_eq!(rec.borrow().seen, vec![(1., 1), (3., 3)]);
    }

    #[test]
    fn event_without_handler_is_dropped() {
        let mut sim = Simulation::new(7);
        let ctx = sim.create_context("orphan");
        ctx.emit_self(EventData::Custom { tag: 1 }, 3.);
        assert_eq!(sim.run(), RunState::Completed);
        assert_eq!(sim.time(), 3.);
    }

    #[test]
    fn run_pauses_and_resumes() {
        let mut sim = Simulation::new(3);
        let rec = recorder(&mut sim, "rec");
        rec.borrow_mut().echo_until = Some(10);
        rec.borrow().ctx.emit_self(EventData::Custom { tag: 0 }, 0.);

        sim.pause_at(4.5);
        assert_eq!(sim.run(), RunState::Paused { time: 4.5 });
        assert_eq!(rec.borrow().seen.len(), 5);
        // still paused until resumed
        assert_eq!(sim.run(), RunState::Paused { time: 4.5 });

        sim.resume();
        assert_eq!(sim.run(), RunState::Completed);
        assert_eq!(rec.borrow().seen.last(), Some(&(10., 10)));
    }

    #[test]
    fn pause_point_past_the_last_event_advances_clock() {
        let mut sim = Simulation::new(3);
        let rec = recorder(&mut sim, "rec");
        rec.borrow().ctx.emit_self(EventData::Custom { tag: 0 }, 1.);
        sim.pause_at(200.);
        assert_eq!(sim.run(), RunState::Paused { time: 200. });
        assert_eq!(sim.time(), 200.);
    }

    #[test]
    fn hold_reports_awaiting_input() {
        let mut sim = Simulation::new(3);
        let ctx = sim.create_context("gateway");
        ctx.hold();
        assert_eq!(sim.run(), RunState::AwaitingInput);
        ctx.release();
        assert_eq!(sim.run(), RunState::Completed);
    }

    #[test]
    fn step_until_time_stops_at_boundary() {
        let mut sim = Simulation::new(3);
        let rec = recorder(&mut sim, "rec");
        rec.borrow_mut().echo_until = Some(5);
        rec.borrow().ctx.emit_self(EventData::Custom { tag: 0 }, 0.);
        assert!(sim.step_until_time(2.));
        assert_eq!(rec.borrow().seen.len(), 3);
        assert_eq!(sim.time(), 2.);
    }

    #[test]
    fn same_seed_gives_same_samples() {
        let mut a = Simulation::new(11);
        let mut b = Simulation::new(11);
        let ctx_a = a.create_context("a");
        let ctx_b = b.create_context("b");
        let xs: Vec<u32> = (0..5).map(|_| ctx_a.gen_range(0..1000)).collect();
        let ys: Vec<u32> = (0..5).map(|_| ctx_b.gen_range(0..1000)).collect();
        assert_eq!(xs, ys);
    }
}
