use crate::cloudlet::{Cloudlet, CloudletId};
use crate::config::sim_config::RandomWorkloadConfig;
use crate::kernel::SimulationContext;

use super::generator::WorkloadGenerator;

/// Normally distributed lengths with uniform PE counts and priorities, drawn from the simulation RNG.
pub struct RandomWorkloadGenerator {
    options: RandomWorkloadConfig,
}

impl RandomWorkloadGenerator {
    pub fn new(options: RandomWorkloadConfig) -> Self {
        Self { options }
    }
}

impl WorkloadGenerator for RandomWorkloadGenerator {
    fn get_workload(&mut self, ctx: &SimulationContext, first_id: CloudletId) -> Vec<Cloudlet> {
        let length_distribution = rand_distr::Normal::new(self.options.length_mean, self.options.length_dev)
            .unwrap_or_else(|e| panic!("Invalid random cloudlet length distribution: {}", e));
        let pes_min = self.options.pes_min.unwrap_or(1);
        let pes_max = self.options.pes_max.unwrap_or(pes_min).max(pes_min);
        let priority_min = self.options.priority_min.unwrap_or(0);
        let priority_max = self.options.priority_max.unwrap_or(priority_min).max(priority_min);

        (0..self.options.count)
            .map(|offset| {
                let length: f64 = ctx.sample_from_distribution(&length_distribution);
                Cloudlet::new(first_id + offset, length.max(1.).round() as u64, ctx.gen_range(pes_min..=pes_max))
                    .with_priority(ctx.gen_range(priority_min..=priority_max))
                    .with_file_size(self.options.file_size.unwrap_or(300))
                    .with_output_size(self.options.output_size.unwrap_or(300))
            })
            .collect()
    }
}
