use serde::{Deserialize, Serialize};

use crate::kernel::Id;
use crate::vm::VmId;

pub type CloudletId = u32;

/// Relative slack under which a cloudlet counts as fully executed.
pub const FINISH_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudletStatus {
    Created,
    Queued,
    InExec,
    Paused,
    Resumed,
    Success,
    Failed,
    Canceled,
}

impl CloudletStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CloudletStatus::Success | CloudletStatus::Failed | CloudletStatus::Canceled
        )
    }

    pub fn can_transition_to(self, next: CloudletStatus) -> bool {
        use CloudletStatus::*;
        matches!(
            (self, next),
            (Created, Queued | Canceled | Failed)
                | (Queued, InExec | Paused | Canceled | Failed)
                | (InExec, Success | Failed | Canceled | Paused)
                | (Paused, Resumed | Canceled | Failed)
                | (Resumed, InExec | Queued | Paused | Canceled | Failed)
        )
    }
}

/// Unit of work measured in millions of instructions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cloudlet {
    id: CloudletId,
    owner: Id,
    length: u64,
    pes: u32,
    file_size: u64,
    output_size: u64,
    priority: i32,
    status: CloudletStatus,
    vm_id: Option<VmId>,
    datacenter_id: Option<Id>,
    submission_time: f64,
    exec_start_time: Option<f64>,
    finish_time: Option<f64>,
    finished_so_far: f64,
    cpu_time: f64,
}

impl Cloudlet {
    pub fn new(id: CloudletId, length: u64, pes: u32) -> Self {
        Self {
            id,
            owner: 0,
            length,
            pes: pes.max(1),
            file_size: 300,
            output_size: 300,
            priority: 0,
            status: CloudletStatus::Created,
            vm_id: None,
            datacenter_id: None,
            submission_time: 0.,
            exec_start_time: None,
            finish_time: None,
            finished_so_far: 0.,
            cpu_time: 0.,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    pub fn with_output_size(mut self, output_size: u64) -> Self {
        self.output_size = output_size;
        self
    }

    /// Pins the cloudlet to a VM of its owner.
    pub fn with_vm(mut self, vm_id: VmId) -> Self {
        self.vm_id = Some(vm_id);
        self
    }

    pub fn id(&self) -> CloudletId {
        self.id
    }

    pub fn owner(&self) -> Id {
        self.owner
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn pes(&self) -> u32 {
        self.pes
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn output_size(&self) -> u64 {
        self.output_size
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn status(&self) -> CloudletStatus {
        self.status
    }

    pub fn vm_id(&self) -> Option<VmId> {
        self.vm_id
    }

    pub fn datacenter_id(&self) -> Option<Id> {
        self.datacenter_id
    }

    pub fn submission_time(&self) -> f64 {
        self.submission_time
    }

    pub fn exec_start_time(&self) -> Option<f64> {
        self.exec_start_time
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub fn finished_so_far(&self) -> f64 {
        self.finished_so_far
    }

    pub fn actual_cpu_time(&self) -> f64 {
        self.cpu_time
    }

    pub fn remaining_length(&self) -> f64 {
        (self.length as f64 - self.finished_so_far).max(0.)
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn set_owner(&mut self, owner: Id) {
        self.owner = owner;
    }

    pub(crate) fn set_vm(&mut self, vm_id: VmId) {
        self.vm_id = Some(vm_id);
    }

    /// Panics on a transition the lifecycle does not allow.
    pub(crate) fn set_status(&mut self, status: CloudletStatus) {
        assert!(
            self.status.can_transition_to(status),
            "cloudlet #{}: illegal status change {:?} -> {:?}",
            self.id,
            self.status,
            status
        );
        self.status = status;
    }

    /// Records arrival at a datacenter and queues the cloudlet on `vm_id`.
    pub(crate) fn accept(&mut self, datacenter_id: Id, vm_id: VmId, now: f64) {
        self.datacenter_id = Some(datacenter_id);
        self.vm_id = Some(vm_id);
        self.submission_time = now;
        self.set_status(CloudletStatus::Queued);
    }

    pub(crate) fn start(&mut self, now: f64) {
        if self.exec_start_time.is_none() {
            self.exec_start_time = Some(now);
        }
        self.set_status(CloudletStatus::InExec);
    }

    /// Progress made at `rate` MIPS over `elapsed` seconds.
    pub(crate) fn advance(&mut self, rate: f64, elapsed: f64) {
        if rate <= 0. || elapsed <= 0. {
            return;
        }
        self.finished_so_far = (self.finished_so_far + rate * elapsed).min(self.length as f64);
        self.cpu_time += elapsed;
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.remaining_length() <= FINISH_TOLERANCE * (self.length as f64).max(1.)
    }

    pub(crate) fn complete(&mut self, now: f64) {
        self.finished_so_far = self.length as f64;
        self.finish_time = Some(now);
        self.set_status(CloudletStatus::Success);
    }

    pub(crate) fn fail(&mut self, now: f64) {
        self.finish_time = Some(now);
        self.set_status(CloudletStatus::Failed);
    }

    pub(crate) fn cancel(&mut self) {
        self.set_status(CloudletStatus::Canceled);
    }

    pub fn report(&self) -> CloudletReport {
        CloudletReport {
            cloudlet_id: self.id,
            owner: self.owner,
            status: self.status,
            datacenter_id: self.datacenter_id,
            vm_id: self.vm_id,
            priority: self.priority,
            length: self.length,
            submission_time: self.submission_time,
            exec_start_time: self.exec_start_time,
            finish_time: self.finish_time,
            cpu_time: self.cpu_time,
        }
    }
}

/// Flat record of a returned cloudlet, ready for printing or serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudletReport {
    pub cloudlet_id: CloudletId,
    pub owner: Id,
    pub status: CloudletStatus,
    pub datacenter_id: Option<Id>,
    pub vm_id: Option<VmId>,
    pub priority: i32,
    pub length: u64,
    pub submission_time: f64,
    pub exec_start_time: Option<f64>,
    pub finish_time: Option<f64>,
    pub cpu_time: f64,
}

impl CloudletReport {
    pub fn wait_time(&self) -> Option<f64> {
        self.exec_start_time.map(|start| start - self.submission_time)
    }

    pub fn response_time(&self) -> Option<f64> {
        self.finish_time.map(|finish| finish - self.submission_time)
    }
}
