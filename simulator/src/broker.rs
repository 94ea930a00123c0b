use rustc_hash::FxHashMap;

use crate::characteristics::DatacenterCharacteristics;
use crate::cloudlet::{Cloudlet, CloudletId, CloudletReport, CloudletStatus};
use crate::dispatch::DispatchPolicy;
use crate::error::SimError;
use crate::events::EventData;
use crate::host::HostId;
use crate::kernel::{Event, EventHandler, EventId, Id, SimulationContext};
use crate::vm::{Vm, VmId};
use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq)]
enum CloudletControl {
    Cancel,
    Pause,
    Resume,
}

impl CloudletControl {
    fn request(self, cloudlet_id: CloudletId, vm_id: Option<VmId>) -> EventData {
        match self {
            CloudletControl::Cancel => EventData::CloudletCancel { cloudlet_id, vm_id },
            CloudletControl::Pause => EventData::CloudletPause { cloudlet_id, vm_id },
            CloudletControl::Resume => EventData::CloudletResume { cloudlet_id, vm_id },
        }
    }
}

/// Tenant entity: creates VMs in datacenters and submits cloudlets to them.
pub struct Broker {
    vm_list: Vec<Vm>,
    vms_created: Vec<Vm>,
    vms_failed: Vec<(Vm, SimError)>,
    vm_to_datacenter: FxHashMap<VmId, Id>,

    cloudlet_list: Vec<Cloudlet>,
    cloudlets_in_flight: FxHashMap<CloudletId, VmId>,
    /// submit events with the cloudlet as sent, until the cloudlet comes back
    submissions: FxHashMap<CloudletId, (EventId, Cloudlet)>,
    /// cloudlets paused before their submission reached a datacenter
    held_cloudlets: Vec<Cloudlet>,
    submitted_order: Vec<CloudletId>,
    cloudlet_received_list: Vec<Cloudlet>,
    bindings: FxHashMap<CloudletId, VmId>,

    datacenter_ids: Vec<Id>,
    characteristics: FxHashMap<Id, DatacenterCharacteristics>,
    datacenters_tried: Vec<Id>,
    vm_requests: usize,
    vm_acks: usize,
    next_vm_index: usize,

    dispatch_policy: Box<dyn DispatchPolicy>,
    finished: bool,
    ctx: SimulationContext,
}

impl Broker {
    pub fn new(ctx: SimulationContext, dispatch_policy: Box<dyn DispatchPolicy>, datacenter_ids: Vec<Id>) -> Self {
        Self {
            vm_list: Vec::new(),
            vms_created: Vec::new(),
            vms_failed: Vec::new(),
            vm_to_datacenter: FxHashMap::default(),
            cloudlet_list: Vec::new(),
            cloudlets_in_flight: FxHashMap::default(),
            submissions: FxHashMap::default(),
            held_cloudlets: Vec::new(),
            submitted_order: Vec::new(),
            cloudlet_received_list: Vec::new(),
            bindings: FxHashMap::default(),
            datacenter_ids,
            characteristics: FxHashMap::default(),
            datacenters_tried: Vec::new(),
            vm_requests: 0,
            vm_acks: 0,
            next_vm_index: 0,
            dispatch_policy,
            finished: false,
            ctx,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn start(&self) {
        self.ctx.emit_self_now(EventData::BrokerStart);
    }

    pub fn set_datacenters(&mut self, datacenter_ids: Vec<Id>) {
        self.datacenter_ids = datacenter_ids;
    }

    pub fn submit_vm_list(&mut self, vms: Vec<Vm>) {
        let owner = self.ctx.id();
        self.vm_list.extend(vms.into_iter().map(|mut vm| {
            vm.owner = owner;
            vm
        }));
    }

    pub fn submit_cloudlet_list(&mut self, cloudlets: Vec<Cloudlet>) {
        let owner = self.ctx.id();
        self.cloudlet_list.extend(cloudlets.into_iter().map(|mut cloudlet| {
            cloudlet.set_owner(owner);
            cloudlet
        }));
    }

    /// Pins a cloudlet to a VM of this broker, overriding round-robin binding.
    pub fn bind_cloudlet_to_vm(&mut self, cloudlet_id: CloudletId, vm_id: VmId) {
        self.bindings.insert(cloudlet_id, vm_id);
    }

    pub fn cancel_cloudlet(&self, cloudlet_id: CloudletId, delay: f64) {
        self.ctx.emit_self(EventData::CloudletCancel { cloudlet_id, vm_id: None }, delay);
    }

    pub fn pause_cloudlet(&self, cloudlet_id: CloudletId, delay: f64) {
        self.ctx.emit_self(EventData::CloudletPause { cloudlet_id, vm_id: None }, delay);
    }

    pub fn resume_cloudlet(&self, cloudlet_id: CloudletId, delay: f64) {
        self.ctx.emit_self(EventData::CloudletResume { cloudlet_id, vm_id: None }, delay);
    }

    pub fn dispatch_policy(&self) -> &dyn DispatchPolicy {
        self.dispatch_policy.as_ref()
    }

    pub fn created_vms(&self) -> &[Vm] {
        &self.vms_created
    }

    pub fn failed_vms(&self) -> &[(Vm, SimError)] {
        &self.vms_failed
    }

    pub fn datacenter_of_vm(&self, vm_id: VmId) -> Option<Id> {
        self.vm_to_datacenter.get(&vm_id).copied()
    }

    pub fn characteristics(&self, datacenter_id: Id) -> Option<&DatacenterCharacteristics> {
        self.characteristics.get(&datacenter_id)
    }

    /// Cloudlets not yet submitted to any datacenter.
    pub fn pending_cloudlets(&self) -> &[Cloudlet] {
        &self.cloudlet_list
    }

    /// Cloudlets paused while their submission was still delayed.
    pub fn held_cloudlets(&self) -> &[Cloudlet] {
        &self.held_cloudlets
    }

    /// Ids of submitted cloudlets in dispatch order.
    pub fn submitted_cloudlets(&self) -> &[CloudletId] {
        &self.submitted_order
    }

    pub fn received_cloudlets(&self) -> &[Cloudlet] {
        &self.cloudlet_received_list
    }

    pub fn reports(&self) -> Vec<CloudletReport> {
        self.cloudlet_received_list.iter().map(Cloudlet::report).collect()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn on_start(&mut self) {
        log_info!(
            self.ctx,
            "starting with {} vms and {} cloudlets, dispatch policy {}",
            self.vm_list.len(),
            self.cloudlet_list.len(),
            self.dispatch_policy.name()
        );
        if self.datacenter_ids.is_empty() {
            log_error!(self.ctx, "no datacenters available");
            self.finish();
            return;
        }
        for datacenter_id in &self.datacenter_ids {
            self.ctx.emit_now(EventData::CharacteristicsRequest, *datacenter_id);
        }
    }

    fn on_characteristics(&mut self, datacenter_id: Id, characteristics: DatacenterCharacteristics) {
        self.characteristics.insert(datacenter_id, characteristics);
        if self.characteristics.len() == self.datacenter_ids.len() {
            let first = self.datacenter_ids[0];
            self.create_vms_in_datacenter(first);
        }
    }

    fn create_vms_in_datacenter(&mut self, datacenter_id: Id) {
        let name = self.ctx.lookup_name(datacenter_id).unwrap_or_default();
        let mut requested = 0;
        for vm in &self.vm_list {
            if self.vm_to_datacenter.contains_key(&vm.id) {
                continue;
            }
            log_debug!(self.ctx, "creating vm #{} in {}", vm.id, name);
            self.ctx.emit_now(EventData::VmCreate { vm: vm.clone() }, datacenter_id);
            requested += 1;
        }
        self.vm_requests += requested;
        self.datacenters_tried.push(datacenter_id);
        if requested == 0 {
            self.after_vm_creation();
        }
    }

    fn on_vm_create_ack(&mut self, datacenter_id: Id, vm: Vm, result: Result<HostId, SimError>) {
        self.vm_acks += 1;
        match result {
            Ok(host_id) => {
                log_info!(self.ctx, "vm #{} created in datacenter {} on host {}", vm.id, datacenter_id, host_id);
                self.vms_failed.retain(|(failed, _)| failed.id != vm.id);
                self.vm_to_datacenter.insert(vm.id, datacenter_id);
                self.vms_created.push(vm);
            }
            Err(error) => {
                log_warn!(self.ctx, "creation of vm #{} failed in datacenter {}: {}", vm.id, datacenter_id, error);
                self.vms_failed.push((vm, error));
            }
        }
        if self.vm_acks == self.vm_requests {
            self.after_vm_creation();
        }
    }

    /// Retries uncreated VMs in the next untried datacenter, otherwise moves on to cloudlets.
    fn after_vm_creation(&mut self) {
        let all_created = self.vms_created.len() == self.vm_list.len();
        if !all_created {
            let next = self
                .datacenter_ids
                .iter()
                .copied()
                .find(|id| !self.datacenters_tried.contains(id));
            if let Some(datacenter_id) = next {
                self.create_vms_in_datacenter(datacenter_id);
                return;
            }
        }
        if self.vms_created.is_empty() {
            log_error!(self.ctx, "no vm could be created, nothing to run");
            self.finish();
            return;
        }
        self.submit_cloudlets();
    }

    fn submit_cloudlets(&mut self) {
        let pending = std::mem::take(&mut self.cloudlet_list);
        let ordered = self.dispatch_policy.order_pending(pending);
        let delays = self.dispatch_policy.submission_delays(&ordered);
        assert_eq!(delays.len(), ordered.len(), "dispatch policy returned a delay per cloudlet");

        for (cloudlet, delay) in ordered.into_iter().zip(delays) {
            let vm_id = match self.bindings.get(&cloudlet.id()).copied().or(cloudlet.vm_id()) {
                Some(vm_id) => {
                    if !self.vm_to_datacenter.contains_key(&vm_id) {
                        log_warn!(
                            self.ctx,
                            "cloudlet #{} is bound to vm #{} which was not created, postponing",
                            cloudlet.id(),
                            vm_id
                        );
                        self.cloudlet_list.push(cloudlet);
                        continue;
                    }
                    vm_id
                }
                None => {
                    let vm_id = self.vms_created[self.next_vm_index % self.vms_created.len()].id;
                    self.next_vm_index += 1;
                    vm_id
                }
            };
            self.submitted_order.push(cloudlet.id());
            self.send_cloudlet(cloudlet, vm_id, delay);
        }

        self.finish_if_idle();
    }

    fn send_cloudlet(&mut self, mut cloudlet: Cloudlet, vm_id: VmId, delay: f64) {
        let datacenter_id = self.vm_to_datacenter[&vm_id];
        cloudlet.set_vm(vm_id);
        log_debug!(
            self.ctx,
            "sending cloudlet #{} (priority {}) to vm #{} in {} s",
            cloudlet.id(),
            cloudlet.priority(),
            vm_id,
            delay
        );
        let cloudlet_id = cloudlet.id();
        self.cloudlets_in_flight.insert(cloudlet_id, vm_id);
        let event_id = self.ctx.emit(
            EventData::CloudletSubmit {
                cloudlet: cloudlet.clone(),
            },
            datacenter_id,
            delay,
        );
        self.submissions.insert(cloudlet_id, (event_id, cloudlet));
    }

    fn finish_if_idle(&mut self) {
        if self.cloudlets_in_flight.is_empty() && self.held_cloudlets.is_empty() {
            self.finish();
        }
    }

    fn on_cloudlet_return(&mut self, cloudlet: Cloudlet) {
        log_info!(
            self.ctx,
            "cloudlet #{} returned: {:?}",
            cloudlet.id(),
            cloudlet.status()
        );
        self.cloudlets_in_flight.remove(&cloudlet.id());
        self.submissions.remove(&cloudlet.id());
        self.cloudlet_received_list.push(cloudlet);
        if self.cloudlets_in_flight.is_empty() && !self.cloudlet_list.is_empty() {
            log_warn!(self.ctx, "{} cloudlets were never submitted", self.cloudlet_list.len());
        }
        self.finish_if_idle();
    }

    fn on_cloudlet_rejected(&mut self, cloudlet: Cloudlet, error: SimError) {
        log_error!(self.ctx, "cloudlet #{} rejected: {}", cloudlet.id(), error);
        self.cloudlets_in_flight.remove(&cloudlet.id());
        self.submissions.remove(&cloudlet.id());
        self.cloudlet_list.push(cloudlet);
        self.finish_if_idle();
    }

    /// Applies a control request to a cloudlet.
    ///
    /// Requests for a cloudlet whose submission is still queued are settled here by
    /// withdrawing the submit event. Otherwise the request goes to the datacenter
    /// running the cloudlet. A cloudlet that was never submitted can only be canceled.
    fn route_control(&mut self, cloudlet_id: CloudletId, control: CloudletControl) {
        if control != CloudletControl::Resume && self.withdraw_submission(cloudlet_id) {
            if let Some(index) = self.held_cloudlets.iter().position(|c| c.id() == cloudlet_id) {
                if control == CloudletControl::Cancel {
                    let cloudlet = self.held_cloudlets.remove(index);
                    self.cancel_locally(cloudlet);
                } else {
                    log_debug!(self.ctx, "cloudlet #{} held before submission", cloudlet_id);
                }
            }
            return;
        }

        if let Some(vm_id) = self.cloudlets_in_flight.get(&cloudlet_id).copied() {
            let datacenter_id = self.vm_to_datacenter[&vm_id];
            self.ctx.emit_now(control.request(cloudlet_id, Some(vm_id)), datacenter_id);
            return;
        }

        if let Some(index) = self.held_cloudlets.iter().position(|c| c.id() == cloudlet_id) {
            match control {
                CloudletControl::Resume => {
                    let cloudlet = self.held_cloudlets.remove(index);
                    match cloudlet.vm_id() {
                        Some(vm_id) if self.vm_to_datacenter.contains_key(&vm_id) => {
                            self.send_cloudlet(cloudlet, vm_id, 0.)
                        }
                        _ => self.cloudlet_list.push(cloudlet),
                    }
                }
                CloudletControl::Cancel => {
                    let cloudlet = self.held_cloudlets.remove(index);
                    self.cancel_locally(cloudlet);
                }
                CloudletControl::Pause => {
                    log_warn!(self.ctx, "cloudlet #{} is already held", cloudlet_id);
                }
            }
            return;
        }

        let pending = self.cloudlet_list.iter().position(|c| c.id() == cloudlet_id);
        match pending {
            Some(index) if control == CloudletControl::Cancel => {
                let cloudlet = self.cloudlet_list.remove(index);
                self.cancel_locally(cloudlet);
            }
            _ => {
                log_warn!(self.ctx, "{:?} of cloudlet #{} ignored: not running", control, cloudlet_id);
            }
        }
    }

    /// Cancels a submit event that has not been delivered yet and moves the
    /// cloudlet to the held list. Returns false if the submission already arrived.
    fn withdraw_submission(&mut self, cloudlet_id: CloudletId) -> bool {
        let Some((event_id, _)) = self.submissions.get(&cloudlet_id) else {
            return false;
        };
        if !self.ctx.cancel_event(*event_id) {
            return false;
        }
        if let Some((_, cloudlet)) = self.submissions.remove(&cloudlet_id) {
            self.cloudlets_in_flight.remove(&cloudlet_id);
            self.held_cloudlets.push(cloudlet);
        }
        true
    }

    fn cancel_locally(&mut self, mut cloudlet: Cloudlet) {
        cloudlet.cancel();
        log_info!(self.ctx, "cloudlet #{} canceled before submission", cloudlet.id());
        self.cloudlet_received_list.push(cloudlet);
        self.finish_if_idle();
    }

    /// Destroys every created VM once no cloudlet is outstanding.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        for vm in &self.vms_created {
            let datacenter_id = self.vm_to_datacenter[&vm.id];
            self.ctx.emit_now(EventData::VmDestroy { vm_id: vm.id }, datacenter_id);
        }
        self.finished = true;
        let succeeded = self
            .cloudlet_received_list
            .iter()
            .filter(|c| c.status() == CloudletStatus::Success)
            .count();
        log_info!(
            self.ctx,
            "finished: {} of {} returned cloudlets succeeded",
            succeeded,
            self.cloudlet_received_list.len()
        );
    }
}

impl EventHandler for Broker {
    fn on(&mut self, event: Event) {
        match event.data {
            EventData::BrokerStart => self.on_start(),
            EventData::CharacteristicsReply { characteristics } => {
                self.on_characteristics(event.src, characteristics)
            }
            EventData::VmCreateAck { vm, result } => self.on_vm_create_ack(event.src, vm, result),
            EventData::CloudletReturn { cloudlet } => self.on_cloudlet_return(cloudlet),
            EventData::CloudletRejected { cloudlet, error } => self.on_cloudlet_rejected(cloudlet, error),
            EventData::CloudletCancel { cloudlet_id, .. } => self.route_control(cloudlet_id, CloudletControl::Cancel),
            EventData::CloudletPause { cloudlet_id, .. } => self.route_control(cloudlet_id, CloudletControl::Pause),
            EventData::CloudletResume { cloudlet_id, .. } => self.route_control(cloudlet_id, CloudletControl::Resume),
            other => {
                log_warn!(self.ctx, "unexpected event {} from {}", other.kind(), event.src);
            }
        }
    }
}
