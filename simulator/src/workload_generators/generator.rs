use crate::cloudlet::{Cloudlet, CloudletId};
use crate::kernel::SimulationContext;

pub trait WorkloadGenerator {
    /// Produces cloudlets with consecutive ids starting at `first_id`.
    fn get_workload(&mut self, ctx: &SimulationContext, first_id: CloudletId) -> Vec<Cloudlet>;
}
