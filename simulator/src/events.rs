//! Payloads of all events exchanged between simulation components.

use crate::characteristics::DatacenterCharacteristics;
use crate::cloudlet::{Cloudlet, CloudletId};
use crate::error::SimError;
use crate::host::HostId;
use crate::vm::{Vm, VmId};

#[derive(Clone, Debug)]
pub enum EventData {
    /// Self-event that starts a broker: datacenter discovery, then VM creation.
    BrokerStart,
    CharacteristicsRequest,
    CharacteristicsReply {
        characteristics: DatacenterCharacteristics,
    },
    VmCreate {
        vm: Vm,
    },
    VmCreateAck {
        vm: Vm,
        result: Result<HostId, SimError>,
    },
    VmDestroy {
        vm_id: VmId,
    },
    CloudletSubmit {
        cloudlet: Cloudlet,
    },
    CloudletRejected {
        cloudlet: Cloudlet,
        error: SimError,
    },
    /// Cloudlet handed back to its owner in a terminal state.
    CloudletReturn {
        cloudlet: Cloudlet,
    },
    CloudletCancel {
        cloudlet_id: CloudletId,
        vm_id: Option<VmId>,
    },
    CloudletPause {
        cloudlet_id: CloudletId,
        vm_id: Option<VmId>,
    },
    CloudletResume {
        cloudlet_id: CloudletId,
        vm_id: Option<VmId>,
    },
    /// Datacenter self-event at the next predicted cloudlet completion.
    UpdateProcessing,
    Custom {
        tag: u32,
    },
}

impl EventData {
    pub fn kind(&self) -> &'static str {
        match self {
            EventData::BrokerStart => "BrokerStart",
            EventData::CharacteristicsRequest => "CharacteristicsRequest",
            EventData::CharacteristicsReply { .. } => "CharacteristicsReply",
            EventData::VmCreate { .. } => "VmCreate",
            EventData::VmCreateAck { .. } => "VmCreateAck",
            EventData::VmDestroy { .. } => "VmDestroy",
            EventData::CloudletSubmit { .. } => "CloudletSubmit",
            EventData::CloudletRejected { .. } => "CloudletRejected",
            EventData::CloudletReturn { .. } => "CloudletReturn",
            EventData::CloudletCancel { .. } => "CloudletCancel",
            EventData::CloudletPause { .. } => "CloudletPause",
            EventData::CloudletResume { .. } => "CloudletResume",
            EventData::UpdateProcessing => "UpdateProcessing",
            EventData::Custom { .. } => "Custom",
        }
    }
}
