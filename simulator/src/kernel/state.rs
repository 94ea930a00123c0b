use std::collections::BinaryHeap;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::*;
use rand_distr::Distribution;
use rustc_hash::FxHashSet;

use crate::error::SimError;
use crate::events::EventData;
use crate::kernel::event::{Event, EventId, QueuedEvent};
use crate::kernel::Id;

pub(crate) struct SimulationState {
    clock: f64,
    rand: StdRng,
    events: BinaryHeap<QueuedEvent>,
    live_events: FxHashSet<EventId>,
    canceled_events: FxHashSet<EventId>,
    event_count: u64,
    next_event_id: EventId,
    component_names: Vec<String>,
    holds: u32,
    pause_requested: bool,
}

impl SimulationState {
    pub fn new(seed: u64) -> Self {
        Self {
            clock: 0.,
            rand: StdRng::seed_from_u64(seed),
            events: BinaryHeap::new(),
            live_events: FxHashSet::default(),
            canceled_events: FxHashSet::default(),
            event_count: 0,
            next_event_id: 0,
            component_names: Vec::new(),
            holds: 0,
            pause_requested: false,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    /// Moves the clock forward without processing events.
    pub fn advance_to(&mut self, time: f64) {
        if time > self.clock {
            self.clock = time;
        }
    }

    pub fn register(&mut self, name: &str) -> Id {
        assert!(
            self.lookup_id(name).is_none(),
            "component with name {} already exists",
            name
        );
        self.component_names.push(name.to_owned());
        (self.component_names.len() - 1) as Id
    }

    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.component_names.iter().position(|n| n == name).map(|id| id as Id)
    }

    pub fn lookup_name(&self, id: Id) -> Option<&str> {
        self.component_names.get(id as usize).map(String::as_str)
    }

    pub fn add_event(&mut self, data: EventData, src: Id, dst: Id, delay: f64) -> Result<EventId, SimError> {
        if delay.is_nan() || delay < 0. {
            return Err(SimError::InvalidSchedule {
                delay,
                time: self.clock,
            });
        }
        let id = self.next_event_id;
        self.next_event_id += 1;
        self.live_events.insert(id);
        self.events.push(QueuedEvent(Event {
            id,
            time: self.clock + delay,
            src,
            dst,
            data,
        }));
        Ok(id)
    }

    /// Pops the earliest live event and advances the clock to its time.
    pub fn next_event(&mut self) -> Option<Event> {
        while let Some(QueuedEvent(event)) = self.events.pop() {
            if self.canceled_events.remove(&event.id) {
                continue;
            }
            self.live_events.remove(&event.id);
            self.clock = event.time;
            self.event_count += 1;
            return Some(event);
        }
        None
    }

    pub fn peek_time(&mut self) -> Option<f64> {
        while let Some(QueuedEvent(event)) = self.events.peek() {
            if self.canceled_events.contains(&event.id) {
                let id = event.id;
                self.events.pop();
                self.canceled_events.remove(&id);
                continue;
            }
            return Some(event.time);
        }
        None
    }

    /// Returns false if the event was already delivered or canceled.
    pub fn cancel_event(&mut self, id: EventId) -> bool {
        if !self.live_events.remove(&id) {
            return false;
        }
        self.canceled_events.insert(id);
        true
    }

    pub fn pending_events(&self) -> usize {
        self.live_events.len()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rand.gen_range(range)
    }

    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&mut self, dist: &Dist) -> T {
        dist.sample(&mut self.rand)
    }

    pub fn hold(&mut self) {
        self.holds += 1;
    }

    pub fn release(&mut self) {
        self.holds = self.holds.saturating_sub(1);
    }

    pub fn holds(&self) -> u32 {
        self.holds
    }

    pub fn request_pause(&mut self) {
        self.pause_requested = true;
    }

    pub fn take_pause_request(&mut self) -> bool {
        std::mem::take(&mut self.pause_requested)
    }
}
