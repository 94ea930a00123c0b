use crate::cloudlet::{Cloudlet, CloudletId};
use crate::config::sim_config::CloudletGroupConfig;
use crate::kernel::SimulationContext;

use super::generator::WorkloadGenerator;

/// Cloudlets spelled out as groups in the broker configuration.
pub struct NativeWorkloadGenerator {
    groups: Vec<CloudletGroupConfig>,
}

impl NativeWorkloadGenerator {
    pub fn new(groups: Vec<CloudletGroupConfig>) -> Self {
        Self { groups }
    }
}

impl WorkloadGenerator for NativeWorkloadGenerator {
    fn get_workload(&mut self, _ctx: &SimulationContext, first_id: CloudletId) -> Vec<Cloudlet> {
        let mut workload = Vec::new();
        let mut next_id = first_id;
        for group in &self.groups {
            for index in 0..group.count.unwrap_or(1) {
                let priority = match &group.priority_cycle {
                    Some(cycle) if !cycle.is_empty() => cycle[index as usize % cycle.len()],
                    _ => group.priority.unwrap_or(0),
                };
                let mut cloudlet = Cloudlet::new(next_id, group.length, group.pes.unwrap_or(1))
                    .with_priority(priority)
                    .with_file_size(group.file_size.unwrap_or(300))
                    .with_output_size(group.output_size.unwrap_or(300));
                if let Some(vm_id) = group.vm {
                    cloudlet = cloudlet.with_vm(vm_id);
                }
                workload.push(cloudlet);
                next_id += 1;
            }
        }
        workload
    }
}
