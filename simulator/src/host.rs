use crate::cloudlet::Cloudlet;
use crate::config::sim_config::HostConfig;
use crate::error::{AdmissionVerdict, SimError};
use crate::pe::{uniform_pes, Pe};
use crate::provisioner::{BwProvisioner, RamProvisioner};
use crate::vm::{Vm, VmInstance, VmUid};
use crate::vm_scheduler::VmScheduler;

pub type HostId = u32;

/// Physical machine: PEs, RAM, bandwidth and storage plus the VMs placed on it.
pub struct Host {
    id: HostId,
    name: String,
    pes: Vec<Pe>,
    ram: RamProvisioner,
    bw: BwProvisioner,
    storage: u64,
    storage_used: u64,
    vm_scheduler: Box<dyn VmScheduler>,
    vms: Vec<VmInstance>,
}

impl Host {
    pub fn new(id: HostId, pes: Vec<Pe>, ram: u64, bw: u64, storage: u64, vm_scheduler: Box<dyn VmScheduler>) -> Self {
        Self {
            id,
            name: format!("host-{}", id),
            pes,
            ram: RamProvisioner::new(ram),
            bw: BwProvisioner::new(bw),
            storage,
            storage_used: 0,
            vm_scheduler,
            vms: Vec::new(),
        }
    }

    pub fn from_config(id: HostId, config: &HostConfig) -> Self {
        Self::new(
            id,
            uniform_pes(config.pes, config.pe_mips),
            config.ram,
            config.bw,
            config.storage,
            config.vm_scheduler.build(),
        )
        .with_name(&config.name)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pes(&self) -> &[Pe] {
        &self.pes
    }

    pub fn number_of_pes(&self) -> u32 {
        self.pes.len() as u32
    }

    pub fn number_of_free_pes(&self) -> u32 {
        self.pes.iter().filter(|pe| pe.is_free()).count() as u32
    }

    pub fn total_mips(&self) -> f64 {
        self.pes.iter().map(Pe::mips).sum()
    }

    pub fn available_mips(&self) -> f64 {
        self.pes.iter().map(Pe::available_mips).sum()
    }

    pub fn allocated_mips(&self) -> f64 {
        self.pes.iter().map(|pe| pe.provisioner().allocated()).sum()
    }

    pub fn ram(&self) -> &RamProvisioner {
        &self.ram
    }

    pub fn bw(&self) -> &BwProvisioner {
        &self.bw
    }

    pub fn storage(&self) -> u64 {
        self.storage
    }

    pub fn available_storage(&self) -> u64 {
        self.storage - self.storage_used
    }

    pub fn vm_scheduler(&self) -> &dyn VmScheduler {
        self.vm_scheduler.as_ref()
    }

    pub fn vms(&self) -> &[VmInstance] {
        &self.vms
    }

    pub fn vm(&self, uid: VmUid) -> Option<&VmInstance> {
        self.vms.iter().find(|vm| vm.uid() == uid)
    }

    pub(crate) fn vm_mut(&mut self, uid: VmUid) -> Option<&mut VmInstance> {
        self.vms.iter_mut().find(|vm| vm.uid() == uid)
    }

    pub fn is_suitable_for_vm(&self, vm: &Vm) -> Result<(), AdmissionVerdict> {
        if vm.size > self.available_storage() {
            return Err(AdmissionVerdict::NotEnoughStorage);
        }
        if !self.ram.is_suitable(vm.ram) {
            return Err(AdmissionVerdict::NotEnoughRam);
        }
        if !self.bw.is_suitable(vm.bw) {
            return Err(AdmissionVerdict::NotEnoughBw);
        }
        self.vm_scheduler.can_allocate(&self.pes, &vm.requested_mips_share())
    }

    /// Places `vm` on this host. On failure nothing stays allocated and the VM is handed back.
    pub fn create_vm(&mut self, vm: Vm) -> Result<(), (Vm, AdmissionVerdict)> {
        if let Err(verdict) = self.is_suitable_for_vm(&vm) {
            return Err((vm, verdict));
        }
        let uid = vm.uid();
        if !self.ram.allocate(uid, vm.ram) {
            return Err((vm, AdmissionVerdict::NotEnoughRam));
        }
        if !self.bw.allocate(uid, vm.bw) {
            self.ram.deallocate(uid);
            return Err((vm, AdmissionVerdict::NotEnoughBw));
        }
        if !self
            .vm_scheduler
            .allocate_pes_for_vm(&mut self.pes, uid, &vm.requested_mips_share())
        {
            self.ram.deallocate(uid);
            self.bw.deallocate(uid);
            return Err((vm, AdmissionVerdict::NotEnoughPes));
        }
        self.storage_used += vm.size;
        self.vms.push(VmInstance::new(vm, self.id));
        self.refresh_mips_shares();
        Ok(())
    }

    /// Removes the VM and releases everything it held.
    pub fn destroy_vm(&mut self, uid: VmUid) -> Option<VmInstance> {
        let index = self.vms.iter().position(|vm| vm.uid() == uid)?;
        let instance = self.vms.remove(index);
        self.vm_scheduler.deallocate_pes_for_vm(&mut self.pes, uid);
        self.ram.deallocate(uid);
        self.bw.deallocate(uid);
        self.storage_used -= instance.vm().size;
        self.refresh_mips_shares();
        Some(instance)
    }

    fn refresh_mips_shares(&mut self) {
        for vm in self.vms.iter_mut() {
            vm.set_mips_share(self.vm_scheduler.allocated_mips_for_vm(vm.uid()));
        }
    }

    /// Advances all resident cloudlets to `now`; returns the earliest predicted completion.
    pub(crate) fn update_vms_processing(&mut self, now: f64) -> Option<f64> {
        self.vms
            .iter_mut()
            .filter_map(|vm| vm.update_processing(now))
            .min_by(f64::total_cmp)
    }

    pub(crate) fn take_finished_cloudlets(&mut self) -> Vec<Cloudlet> {
        self.vms
            .iter_mut()
            .flat_map(|vm| vm.cloudlet_scheduler_mut().take_finished())
            .collect()
    }

    pub fn verify_capacity(&self) -> Result<(), SimError> {
        self.ram.verify("ram")?;
        self.bw.verify("bw")?;
        for pe in &self.pes {
            pe.provisioner().verify("pe mips")?;
        }
        if self.storage_used > self.storage {
            return Err(SimError::CapacityViolation {
                resource: "storage",
                requested: self.storage_used as f64,
                available: self.storage as f64,
            });
        }
        Ok(())
    }
}
