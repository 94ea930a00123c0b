use serde::{Deserialize, Serialize};

use crate::host::Host;

/// Static description of a datacenter, sent to brokers on request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatacenterCharacteristics {
    pub arch: String,
    pub os: String,
    pub vmm: String,
    pub time_zone: f64,
    pub cost_per_sec: f64,
    pub cost_per_mem: f64,
    pub cost_per_storage: f64,
    pub cost_per_bw: f64,
    #[serde(skip_deserializing)]
    pub hosts: u32,
    #[serde(skip_deserializing)]
    pub pes: u32,
    #[serde(skip_deserializing)]
    pub total_mips: f64,
}

impl Default for DatacenterCharacteristics {
    fn default() -> Self {
        Self {
            arch: "x86".to_string(),
            os: "Linux".to_string(),
            vmm: "Xen".to_string(),
            time_zone: 10.,
            cost_per_sec: 3.,
            cost_per_mem: 0.05,
            cost_per_storage: 0.001,
            cost_per_bw: 0.,
            hosts: 0,
            pes: 0,
            total_mips: 0.,
        }
    }
}

impl DatacenterCharacteristics {
    /// Fills in the aggregate figures from the host list.
    pub fn with_hosts(mut self, hosts: &[Host]) -> Self {
        self.hosts = hosts.len() as u32;
        self.pes = hosts.iter().map(Host::number_of_pes).sum();
        self.total_mips = hosts.iter().map(Host::total_mips).sum();
        self
    }

    /// Price of running for `seconds` on one PE.
    pub fn processing_cost(&self, seconds: f64) -> f64 {
        self.cost_per_sec * seconds
    }
}
