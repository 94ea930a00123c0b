//! Host selection for incoming VMs.

use serde::{Deserialize, Serialize};

use crate::host::Host;
use crate::vm::Vm;

pub trait VmAllocationPolicy {
    /// Index of the host that should receive `vm`, if any host can.
    fn select_host(&self, vm: &Vm, hosts: &[Host]) -> Option<usize>;

    fn name(&self) -> &'static str;
}

/// First host in declaration order that passes admission.
pub struct FirstFit;

impl VmAllocationPolicy for FirstFit {
    fn select_host(&self, vm: &Vm, hosts: &[Host]) -> Option<usize> {
        hosts.iter().position(|host| host.is_suitable_for_vm(vm).is_ok())
    }

    fn name(&self) -> &'static str {
        "first-fit"
    }
}

/// Suitable host with the least available MIPS.
pub struct BestFit;

impl VmAllocationPolicy for BestFit {
    fn select_host(&self, vm: &Vm, hosts: &[Host]) -> Option<usize> {
        hosts
            .iter()
            .enumerate()
            .filter(|(_, host)| host.is_suitable_for_vm(vm).is_ok())
            .min_by(|(_, a), (_, b)| a.available_mips().total_cmp(&b.available_mips()))
            .map(|(index, _)| index)
    }

    fn name(&self) -> &'static str {
        "best-fit"
    }
}

/// Suitable host with the most free PEs; ties go to the earlier host.
pub struct WorstFit;

impl VmAllocationPolicy for WorstFit {
    fn select_host(&self, vm: &Vm, hosts: &[Host]) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (index, host) in hosts.iter().enumerate() {
            if host.is_suitable_for_vm(vm).is_err() {
                continue;
            }
            let free = host.number_of_free_pes();
            if best.map_or(true, |(_, most)| free > most) {
                best = Some((index, free));
            }
        }
        best.map(|(index, _)| index)
    }

    fn name(&self) -> &'static str {
        "worst-fit"
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationPolicyKind {
    #[default]
    FirstFit,
    BestFit,
    WorstFit,
}

pub fn allocation_policy_resolver(kind: AllocationPolicyKind) -> Box<dyn VmAllocationPolicy> {
    match kind {
        AllocationPolicyKind::FirstFit => Box::new(FirstFit),
        AllocationPolicyKind::BestFit => Box::new(BestFit),
        AllocationPolicyKind::WorstFit => Box::new(WorstFit),
    }
}
