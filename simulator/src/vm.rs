use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cloudlet::Cloudlet;
use crate::cloudlet_scheduler::{CloudletScheduler, CloudletSchedulerPolicy};
use crate::host::HostId;
use crate::kernel::Id;

pub type VmId = u32;

/// VM ids are only unique per owner, so placement is keyed by the pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VmUid {
    pub owner: Id,
    pub vm_id: VmId,
}

impl fmt::Display for VmUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.owner, self.vm_id)
    }
}

/// VM request as submitted by a broker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub id: VmId,
    pub owner: Id,
    /// MIPS requested per virtual PE.
    pub mips: f64,
    pub pes: u32,
    pub ram: u64,
    pub bw: u64,
    /// Image size, taken from host storage.
    pub size: u64,
    pub vmm: String,
    pub cloudlet_scheduler: CloudletSchedulerPolicy,
}

impl Vm {
    pub fn new(id: VmId, mips: f64, pes: u32, ram: u64, bw: u64, size: u64) -> Self {
        Self {
            id,
            owner: 0,
            mips,
            pes,
            ram,
            bw,
            size,
            vmm: "Xen".to_string(),
            cloudlet_scheduler: CloudletSchedulerPolicy::default(),
        }
    }

    pub fn with_cloudlet_scheduler(mut self, policy: CloudletSchedulerPolicy) -> Self {
        self.cloudlet_scheduler = policy;
        self
    }

    pub fn with_vmm(mut self, vmm: &str) -> Self {
        self.vmm = vmm.to_string();
        self
    }

    pub fn uid(&self) -> VmUid {
        VmUid {
            owner: self.owner,
            vm_id: self.id,
        }
    }

    /// Requested MIPS for each virtual PE.
    pub fn requested_mips_share(&self) -> Vec<f64> {
        vec![self.mips; self.pes as usize]
    }

    pub fn total_mips(&self) -> f64 {
        self.mips * self.pes as f64
    }
}

/// VM placed on a host, with the MIPS share currently granted and its own cloudlet scheduler.
pub struct VmInstance {
    vm: Vm,
    host_id: HostId,
    mips_share: Vec<f64>,
    scheduler: Box<dyn CloudletScheduler>,
}

impl VmInstance {
    pub(crate) fn new(vm: Vm, host_id: HostId) -> Self {
        let scheduler = vm.cloudlet_scheduler.build();
        Self {
            vm,
            host_id,
            mips_share: Vec::new(),
            scheduler,
        }
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn uid(&self) -> VmUid {
        self.vm.uid()
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn mips_share(&self) -> &[f64] {
        &self.mips_share
    }

    pub fn current_mips(&self) -> f64 {
        self.mips_share.iter().sum()
    }

    pub fn cloudlet_scheduler(&self) -> &dyn CloudletScheduler {
        self.scheduler.as_ref()
    }

    pub(crate) fn cloudlet_scheduler_mut(&mut self) -> &mut dyn CloudletScheduler {
        self.scheduler.as_mut()
    }

    pub(crate) fn set_mips_share(&mut self, mips_share: Vec<f64>) {
        self.mips_share = mips_share;
    }

    pub(crate) fn submit_cloudlet(&mut self, cloudlet: Cloudlet, now: f64) -> Option<f64> {
        self.scheduler.submit(cloudlet, now, &self.mips_share)
    }

    pub(crate) fn update_processing(&mut self, now: f64) -> Option<f64> {
        self.scheduler.update_processing(now, &self.mips_share)
    }
}
