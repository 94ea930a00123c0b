use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::allocation_policy::VmAllocationPolicy;
use crate::characteristics::DatacenterCharacteristics;
use crate::cloudlet::{Cloudlet, CloudletId};
use crate::error::{AdmissionVerdict, SimError};
use crate::events::EventData;
use crate::host::Host;
use crate::kernel::{Event, EventHandler, EventId, Id, SimulationContext};
use crate::monitoring::Monitoring;
use crate::vm::{Vm, VmId, VmInstance, VmUid};
use crate::{log_debug, log_info, log_trace, log_warn};

#[derive(Clone, Copy, Debug)]
enum CloudletControl {
    Cancel,
    Pause,
    Resume,
}

/// Owns hosts, places VMs on them and drives cloudlet execution.
pub struct Datacenter {
    hosts: Vec<Host>,
    characteristics: DatacenterCharacteristics,
    allocation_policy: Box<dyn VmAllocationPolicy>,

    vm_placement: FxHashMap<VmUid, usize>,
    owner_vms: FxHashMap<Id, Vec<VmId>>,
    round_robin: FxHashMap<Id, usize>,

    scheduling_interval: Option<f64>,
    next_update: Option<EventId>,

    monitoring: Rc<RefCell<Monitoring>>,
    ctx: SimulationContext,
}

impl Datacenter {
    pub fn new(
        ctx: SimulationContext,
        hosts: Vec<Host>,
        allocation_policy: Box<dyn VmAllocationPolicy>,
        characteristics: DatacenterCharacteristics,
        scheduling_interval: Option<f64>,
        monitoring: Rc<RefCell<Monitoring>>,
    ) -> Self {
        if let Some(interval) = scheduling_interval {
            assert!(interval > 0., "scheduling interval must be positive, got {}", interval);
        }
        let characteristics = characteristics.with_hosts(&hosts);
        Self {
            hosts,
            characteristics,
            allocation_policy,
            vm_placement: FxHashMap::default(),
            owner_vms: FxHashMap::default(),
            round_robin: FxHashMap::default(),
            scheduling_interval,
            next_update: None,
            monitoring,
            ctx,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn characteristics(&self) -> &DatacenterCharacteristics {
        &self.characteristics
    }

    pub fn allocation_policy(&self) -> &dyn VmAllocationPolicy {
        self.allocation_policy.as_ref()
    }

    pub fn vm(&self, uid: VmUid) -> Option<&VmInstance> {
        let index = *self.vm_placement.get(&uid)?;
        self.hosts[index].vm(uid)
    }

    pub fn host_of(&self, uid: VmUid) -> Option<&Host> {
        self.vm_placement.get(&uid).map(|index| &self.hosts[*index])
    }

    pub fn vm_count(&self) -> usize {
        self.vm_placement.len()
    }

    /// Advances every VM to the current time, hands finished cloudlets back
    /// to their owners and reschedules the next processing update.
    fn update_cloudlet_processing(&mut self) {
        let now = self.ctx.time();
        let next = self
            .hosts
            .iter_mut()
            .filter_map(|host| host.update_vms_processing(now))
            .min_by(f64::total_cmp);

        let finished: Vec<Cloudlet> = self
            .hosts
            .iter_mut()
            .flat_map(|host| host.take_finished_cloudlets())
            .collect();
        for cloudlet in finished {
            log_debug!(
                self.ctx,
                "cloudlet #{} of {} finished on vm {:?} with status {:?}",
                cloudlet.id(),
                cloudlet.owner(),
                cloudlet.vm_id(),
                cloudlet.status()
            );
            let owner = cloudlet.owner();
            self.ctx.emit_now(EventData::CloudletReturn { cloudlet }, owner);
        }

        self.schedule_next_update(now, next);
    }

    fn schedule_next_update(&mut self, now: f64, next_completion: Option<f64>) {
        if let Some(event_id) = self.next_update.take() {
            self.ctx.cancel_event(event_id);
        }
        let next = match (next_completion, self.scheduling_interval) {
            (Some(time), Some(interval)) => Some(time.min(now + interval)),
            (next, _) => next,
        };
        if let Some(time) = next {
            log_trace!(self.ctx, "next processing update at {:.3}", time);
            self.next_update = Some(self.ctx.emit_self(EventData::UpdateProcessing, time - now));
        }
    }

    fn record_host_load(&self, index: usize) {
        let host = &self.hosts[index];
        self.monitoring.borrow_mut().update_host(
            self.ctx.time(),
            self.ctx.name(),
            host.name(),
            host.allocated_mips(),
            host.ram().allocated(),
        );
    }

    fn on_characteristics_request(&self, requester: Id) {
        self.ctx.emit_now(
            EventData::CharacteristicsReply {
                characteristics: self.characteristics.clone(),
            },
            requester,
        );
    }

    fn on_vm_create(&mut self, requester: Id, vm: Vm) {
        self.update_cloudlet_processing();

        let uid = vm.uid();
        let descriptor = vm.clone();
        let outcome = match self.allocation_policy.select_host(&vm, &self.hosts) {
            Some(index) => self.hosts[index].create_vm(vm).map(|()| index),
            None => Err((vm, AdmissionVerdict::NoSuitableHost)),
        };

        let result = match outcome {
            Ok(index) => {
                let host = &self.hosts[index];
                if let Err(e) = host.verify_capacity() {
                    panic!("{}: host {} after placing vm {}: {}", self.ctx.name(), host.name(), uid, e);
                }
                log_info!(self.ctx, "vm {} created on {}", uid, host.name());
                let host_id = host.id();
                self.vm_placement.insert(uid, index);
                self.owner_vms.entry(uid.owner).or_default().push(uid.vm_id);
                self.record_host_load(index);
                Ok(host_id)
            }
            Err((_, reason)) => {
                log_warn!(self.ctx, "vm {} rejected: {}", uid, reason);
                Err(SimError::AdmissionFailure { vm: uid, reason })
            }
        };

        self.ctx.emit_now(EventData::VmCreateAck { vm: descriptor, result }, requester);
        self.update_cloudlet_processing();
    }

    fn on_vm_destroy(&mut self, owner: Id, vm_id: VmId) {
        self.update_cloudlet_processing();

        let uid = VmUid { owner, vm_id };
        let Some(index) = self.vm_placement.remove(&uid) else {
            log_warn!(self.ctx, "destroy of unknown vm {}", uid);
            return;
        };
        if let Some(vms) = self.owner_vms.get_mut(&owner) {
            vms.retain(|id| *id != vm_id);
        }
        if let Some(mut instance) = self.hosts[index].destroy_vm(uid) {
            let now = self.ctx.time();
            for cloudlet in instance.cloudlet_scheduler_mut().drain(now) {
                log_warn!(self.ctx, "cloudlet #{} lost with vm {}", cloudlet.id(), uid);
                self.ctx.emit_now(EventData::CloudletReturn { cloudlet }, owner);
            }
        }
        log_info!(self.ctx, "vm {} destroyed", uid);
        self.record_host_load(index);

        self.update_cloudlet_processing();
    }

    /// Round-robin over the VMs the owner has in this datacenter.
    fn next_vm_for(&mut self, owner: Id) -> Option<VmId> {
        let vms = self.owner_vms.get(&owner).filter(|vms| !vms.is_empty())?;
        let cursor = self.round_robin.entry(owner).or_default();
        let vm_id = vms[*cursor % vms.len()];
        *cursor = (*cursor + 1) % vms.len();
        Some(vm_id)
    }

    fn on_cloudlet_submit(&mut self, sender: Id, mut cloudlet: Cloudlet) {
        self.update_cloudlet_processing();

        let owner = cloudlet.owner();
        let vm_id = match cloudlet.vm_id() {
            Some(vm_id) => Some(vm_id),
            None => self.next_vm_for(owner),
        };
        let placement = vm_id.and_then(|vm_id| {
            let uid = VmUid { owner, vm_id };
            self.vm_placement.get(&uid).map(|index| (uid, *index))
        });
        let Some((uid, index)) = placement else {
            let error = SimError::BindingFailure {
                cloudlet_id: cloudlet.id(),
                vm_id,
            };
            log_warn!(self.ctx, "{}", error);
            self.ctx.emit_now(EventData::CloudletRejected { cloudlet, error }, sender);
            return;
        };

        let now = self.ctx.time();
        cloudlet.accept(self.ctx.id(), uid.vm_id, now);
        log_debug!(
            self.ctx,
            "cloudlet #{} ({} MI, {} pes, priority {}) queued on vm {}",
            cloudlet.id(),
            cloudlet.length(),
            cloudlet.pes(),
            cloudlet.priority(),
            uid
        );
        if let Some(vm) = self.hosts[index].vm_mut(uid) {
            vm.submit_cloudlet(cloudlet, now);
        }

        self.update_cloudlet_processing();
    }

    fn locate_cloudlet(&self, owner: Id, cloudlet_id: CloudletId, vm_id: Option<VmId>) -> Option<(usize, VmUid)> {
        let candidates = match vm_id {
            Some(vm_id) => vec![vm_id],
            None => self.owner_vms.get(&owner).cloned().unwrap_or_default(),
        };
        candidates.into_iter().find_map(|vm_id| {
            let uid = VmUid { owner, vm_id };
            let index = *self.vm_placement.get(&uid)?;
            let resident = self.hosts[index]
                .vm(uid)?
                .cloudlet_scheduler()
                .cloudlet(cloudlet_id)
                .is_some();
            resident.then_some((index, uid))
        })
    }

    fn on_cloudlet_control(&mut self, owner: Id, cloudlet_id: CloudletId, vm_id: Option<VmId>, control: CloudletControl) {
        self.update_cloudlet_processing();

        let Some((index, uid)) = self.locate_cloudlet(owner, cloudlet_id, vm_id) else {
            log_warn!(self.ctx, "{:?} of unknown cloudlet #{} of {}", control, cloudlet_id, owner);
            return;
        };
        let Some(vm) = self.hosts[index].vm_mut(uid) else {
            return;
        };
        let scheduler = vm.cloudlet_scheduler_mut();
        let done = match control {
            CloudletControl::Cancel => match scheduler.cancel(cloudlet_id) {
                Some(cloudlet) => {
                    self.ctx.emit_now(EventData::CloudletReturn { cloudlet }, owner);
                    true
                }
                None => false,
            },
            CloudletControl::Pause => scheduler.pause(cloudlet_id),
            CloudletControl::Resume => scheduler.resume(cloudlet_id),
        };
        if done {
            log_debug!(self.ctx, "{:?} cloudlet #{} on vm {}", control, cloudlet_id, uid);
        } else {
            log_warn!(self.ctx, "{:?} of cloudlet #{} on vm {} had no effect", control, cloudlet_id, uid);
        }

        self.update_cloudlet_processing();
    }
}

impl EventHandler for Datacenter {
    fn on(&mut self, event: Event) {
        match event.data {
            EventData::CharacteristicsRequest => self.on_characteristics_request(event.src),
            EventData::VmCreate { vm } => self.on_vm_create(event.src, vm),
            EventData::VmDestroy { vm_id } => self.on_vm_destroy(event.src, vm_id),
            EventData::CloudletSubmit { cloudlet } => self.on_cloudlet_submit(event.src, cloudlet),
            EventData::CloudletCancel { cloudlet_id, vm_id } => {
                self.on_cloudlet_control(event.src, cloudlet_id, vm_id, CloudletControl::Cancel)
            }
            EventData::CloudletPause { cloudlet_id, vm_id } => {
                self.on_cloudlet_control(event.src, cloudlet_id, vm_id, CloudletControl::Pause)
            }
            EventData::CloudletResume { cloudlet_id, vm_id } => {
                self.on_cloudlet_control(event.src, cloudlet_id, vm_id, CloudletControl::Resume)
            }
            EventData::UpdateProcessing => {
                self.next_update = None;
                self.update_cloudlet_processing();
            }
            other => {
                log_warn!(self.ctx, "unexpected event {} from {}", other.kind(), event.src);
            }
        }
    }
}
