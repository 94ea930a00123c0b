use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::sim_config::BrokerConfig;

use super::{generator::WorkloadGenerator, native::NativeWorkloadGenerator, random::RandomWorkloadGenerator};

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub enum WorkloadType {
    Native,
    Random,
}

impl FromStr for WorkloadType {
    type Err = String;
    fn from_str(input: &str) -> Result<WorkloadType, Self::Err> {
        match input.to_lowercase().as_str() {
            "native" => Ok(WorkloadType::Native),
            "random" => Ok(WorkloadType::Random),
            _ => Err(format!("Cannot parse workload type `{}`", input)),
        }
    }
}

/// Generators for a broker: configured groups first, then the random batch.
pub fn workload_resolver(config: &BrokerConfig) -> Vec<(WorkloadType, Box<dyn WorkloadGenerator>)> {
    let mut generators: Vec<(WorkloadType, Box<dyn WorkloadGenerator>)> = Vec::new();
    if !config.cloudlets.is_empty() {
        generators.push((
            WorkloadType::Native,
            Box::new(NativeWorkloadGenerator::new(config.cloudlets.clone())),
        ));
    }
    if let Some(random) = &config.random_cloudlets {
        generators.push((WorkloadType::Random, Box::new(RandomWorkloadGenerator::new(random.clone()))));
    }
    generators
}
