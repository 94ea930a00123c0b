use std::fmt;

use thiserror::Error;

use crate::cloudlet::CloudletId;
use crate::vm::{VmId, VmUid};

/// Why a host (or a whole datacenter) could not accept a VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionVerdict {
    NoSuitableHost,
    NotEnoughPes,
    NotEnoughMips,
    NotEnoughRam,
    NotEnoughBw,
    NotEnoughStorage,
}

impl fmt::Display for AdmissionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AdmissionVerdict::NoSuitableHost => "no suitable host",
            AdmissionVerdict::NotEnoughPes => "not enough free PEs",
            AdmissionVerdict::NotEnoughMips => "not enough MIPS",
            AdmissionVerdict::NotEnoughRam => "not enough RAM",
            AdmissionVerdict::NotEnoughBw => "not enough bandwidth",
            AdmissionVerdict::NotEnoughStorage => "not enough storage",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("vm {vm} was not admitted: {reason}")]
    AdmissionFailure { vm: VmUid, reason: AdmissionVerdict },

    #[error("cloudlet #{cloudlet_id} cannot be bound to a vm (requested vm: {vm_id:?})")]
    BindingFailure {
        cloudlet_id: CloudletId,
        vm_id: Option<VmId>,
    },

    #[error("{resource} over-committed: {requested} allocated of {available}")]
    CapacityViolation {
        resource: &'static str,
        requested: f64,
        available: f64,
    },

    #[error("invalid schedule: delay {delay} at time {time}")]
    InvalidSchedule { delay: f64, time: f64 },
}
