//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::allocation_policy::AllocationPolicyKind;
use crate::characteristics::DatacenterCharacteristics;
use crate::cloudlet_scheduler::CloudletSchedulerPolicy;
use crate::dispatch::{DispatchKind, PriorityOrder};
use crate::vm::VmId;
use crate::vm_scheduler::VmSchedulerPolicy;

/// Auxiliary structure to parse SimulationConfig from file
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct SimulationConfigRaw {
    /// seed of the simulation random generator
    pub seed: Option<u64>,
    pub monitoring: Option<MonitoringConfig>,
    pub datacenters: Option<Vec<DatacenterConfig>>,
    pub brokers: Option<Vec<BrokerConfig>>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct MonitoringConfig {
    /// average host load over windows of this length instead of recording every change
    pub host_load_compression_time_interval: Option<f64>,
}

/// Represents a datacenter with its physical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct DatacenterConfig {
    pub name: String,
    /// host selection policy, first-fit when absent
    pub allocation_policy: Option<AllocationPolicyKind>,
    /// upper bound on the time between two processing updates
    pub scheduling_interval: Option<f64>,
    pub characteristics: Option<DatacenterCharacteristics>,
    #[serde(default)]
    pub hosts: Vec<GroupHostConfig>,
}

/// Represents physical host(s) configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct GroupHostConfig {
    /// Host name. Should be set if count = 1
    pub name: Option<String>,
    /// Host name prefix. Full name is produced by appending instance number to the prefix.
    /// Should be set if count > 1
    pub name_prefix: Option<String>,
    /// number of such hosts
    pub count: Option<u32>,
    pub pes: u32,
    /// MIPS rating of every PE
    pub pe_mips: f64,
    pub ram: u64,
    pub bw: u64,
    pub storage: Option<u64>,
    pub vm_scheduler: Option<VmSchedulerPolicy>,
}

/// Fully resolved configuration of a single host.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    pub name: String,
    pub pes: u32,
    pub pe_mips: f64,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
    pub vm_scheduler: VmSchedulerPolicy,
}

impl HostConfig {
    pub fn from_group_config(group: &GroupHostConfig, index: Option<u32>) -> Self {
        let name = match (index, &group.name_prefix, &group.name) {
            (Some(index), Some(prefix), _) => format!("{}-{}", prefix, index),
            (Some(index), None, Some(name)) => format!("{}-{}", name, index),
            (Some(index), None, None) => format!("host-{}", index),
            (None, _, Some(name)) => name.clone(),
            (None, Some(prefix), None) => format!("{}-0", prefix),
            (None, None, None) => "host".to_string(),
        };
        Self {
            name,
            pes: group.pes,
            pe_mips: group.pe_mips,
            ram: group.ram,
            bw: group.bw,
            storage: group.storage.unwrap_or(1_000_000),
            vm_scheduler: group.vm_scheduler.unwrap_or_default(),
        }
    }
}

impl DatacenterConfig {
    /// Expands host groups into individual hosts.
    pub fn host_configs(&self) -> Vec<HostConfig> {
        let mut result = Vec::new();
        for group in &self.hosts {
            match group.count {
                Some(count) if count > 1 => {
                    for index in 0..count {
                        result.push(HostConfig::from_group_config(group, Some(index)));
                    }
                }
                Some(0) => {}
                _ => result.push(HostConfig::from_group_config(group, None)),
            }
        }
        result
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct DispatchConfig {
    #[serde(default)]
    pub policy: DispatchKind,
    /// required for priority dispatch
    pub order: Option<PriorityOrder>,
    /// delay per unit of priority distance from the most urgent cloudlet
    pub submission_delay_step: Option<f64>,
}

/// Represents VM(s) requested by a broker. Ids are assigned in declaration order.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct VmGroupConfig {
    pub count: Option<u32>,
    pub mips: f64,
    pub pes: Option<u32>,
    pub ram: u64,
    pub bw: u64,
    pub size: u64,
    pub vmm: Option<String>,
    pub cloudlet_scheduler: Option<CloudletSchedulerPolicy>,
}

/// Represents cloudlet(s) submitted by a broker. Ids are assigned in declaration order.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct CloudletGroupConfig {
    pub count: Option<u32>,
    /// length in MI
    pub length: u64,
    pub pes: Option<u32>,
    pub file_size: Option<u64>,
    pub output_size: Option<u64>,
    pub priority: Option<i32>,
    /// priorities assigned cyclically within the group, overrides `priority`
    pub priority_cycle: Option<Vec<i32>>,
    /// explicit binding to a VM of the same broker
    pub vm: Option<VmId>,
}

/// Cloudlets with normally distributed length and uniform PEs and priority.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct RandomWorkloadConfig {
    pub count: u32,
    pub length_mean: f64,
    pub length_dev: f64,
    pub pes_min: Option<u32>,
    pub pes_max: Option<u32>,
    pub priority_min: Option<i32>,
    pub priority_max: Option<i32>,
    pub file_size: Option<u64>,
    pub output_size: Option<u64>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct BrokerConfig {
    pub name: String,
    /// brokers with a positive start time join the running simulation at that time
    pub start_time: Option<f64>,
    pub dispatch: Option<DispatchConfig>,
    #[serde(default)]
    pub vms: Vec<VmGroupConfig>,
    #[serde(default)]
    pub cloudlets: Vec<CloudletGroupConfig>,
    pub random_cloudlets: Option<RandomWorkloadConfig>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    pub seed: u64,
    pub monitoring: MonitoringConfig,
    pub datacenters: Vec<DatacenterConfig>,
    pub brokers: Vec<BrokerConfig>,
}

impl From<SimulationConfigRaw> for SimulationConfig {
    fn from(raw: SimulationConfigRaw) -> Self {
        Self {
            seed: raw.seed.unwrap_or(123),
            monitoring: raw.monitoring.unwrap_or_default(),
            datacenters: raw.datacenters.unwrap_or_default(),
            brokers: raw.brokers.unwrap_or_default(),
        }
    }
}

impl SimulationConfig {
    /// Returns total hosts count
    pub fn number_of_hosts(&self) -> u32 {
        self.datacenters.iter().map(|dc| dc.host_configs().len() as u32).sum()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let raw: SimulationConfigRaw = serde_yaml::from_str(yaml)?;
        Ok(raw.into())
    }

    /// Creates simulation config by reading parameter values from .yaml file (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Self {
        let yaml = std::fs::read_to_string(file_name).unwrap_or_else(|_| panic!("Can't read file {}", file_name));
        Self::from_yaml_str(&yaml).unwrap_or_else(|e| panic!("Can't parse YAML from file {}: {}", file_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
seed: 7
monitoring:
  host_load_compression_time_interval: 50
datacenters:
  - name: dc-0
    allocation_policy: best-fit
    hosts:
      - name_prefix: node
        count: 3
        pes: 4
        pe_mips: 1000
        ram: 16384
        bw: 10000
        vm_scheduler: time-shared
      - name: big
        pes: 16
        pe_mips: 2500
        ram: 65536
        bw: 10000
brokers:
  - name: tenant
    dispatch:
      policy: priority
      order: higher-first
      submission_delay_step: 1.0
    vms:
      - count: 2
        mips: 1000
        pes: 1
        ram: 512
        bw: 1000
        size: 10000
        cloudlet_scheduler: space-shared
    cloudlets:
      - count: 4
        length: 40000
        priority_cycle: [8, 2]
"#;

    #[test]
    fn parses_full_config() {
        let config = SimulationConfig::from_yaml_str(CONFIG).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.monitoring.host_load_compression_time_interval, Some(50.));
        assert_eq!(config.number_of_hosts(), 4);

        let hosts = config.datacenters[0].host_configs();
        assert_eq!(hosts[0].name, "node-0");
        assert_eq!(hosts[2].name, "node-2");
        assert_eq!(hosts[0].vm_scheduler, VmSchedulerPolicy::TimeShared);
        assert_eq!(hosts[3].name, "big");
        assert_eq!(hosts[3].vm_scheduler, VmSchedulerPolicy::SpaceShared);
        assert_eq!(config.datacenters[0].allocation_policy, Some(AllocationPolicyKind::BestFit));

        let broker = &config.brokers[0];
        let dispatch = broker.dispatch.as_ref().unwrap();
        assert_eq!(dispatch.policy, DispatchKind::Priority);
        assert_eq!(dispatch.order, Some(PriorityOrder::HigherFirst));
        assert_eq!(broker.vms[0].cloudlet_scheduler, Some(CloudletSchedulerPolicy::SpaceShared));
        assert_eq!(broker.cloudlets[0].priority_cycle, Some(vec![8, 2]));
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = SimulationConfig::from_yaml_str("seed: 1").unwrap();
        assert!(config.datacenters.is_empty());
        assert!(config.brokers.is_empty());
        assert_eq!(config.monitoring, MonitoringConfig::default());
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let yaml = "datacenters:\n  - name: dc\n    allocation_policy: random-fit\n";
        assert!(SimulationConfig::from_yaml_str(yaml).is_err());
    }
}
