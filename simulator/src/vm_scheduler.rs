//! First scheduling level: how a host divides its PEs among VMs.

use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::AdmissionVerdict;
use crate::pe::{Pe, PeStatus};
use crate::provisioner::{Amount, MIPS_TOLERANCE};
use crate::vm::VmUid;

pub trait VmScheduler {
    fn can_allocate(&self, pes: &[Pe], mips_share: &[f64]) -> Result<(), AdmissionVerdict>;

    /// Reserves PE capacity for `vm`. Changes nothing and returns false if it does not fit.
    fn allocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid, mips_share: &[f64]) -> bool;

    fn deallocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid);

    /// MIPS currently granted to each virtual PE of `vm`.
    fn allocated_mips_for_vm(&self, vm: VmUid) -> Vec<f64>;

    fn name(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VmSchedulerPolicy {
    #[default]
    SpaceShared,
    TimeShared,
}

impl VmSchedulerPolicy {
    pub fn build(self) -> Box<dyn VmScheduler> {
        match self {
            VmSchedulerPolicy::SpaceShared => Box::<SpaceSharedVmScheduler>::default(),
            VmSchedulerPolicy::TimeShared => Box::<TimeSharedVmScheduler>::default(),
        }
    }
}

impl FromStr for VmSchedulerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "space-shared" => Ok(VmSchedulerPolicy::SpaceShared),
            "time-shared" => Ok(VmSchedulerPolicy::TimeShared),
            _ => Err(format!("unknown vm scheduler: {}", s)),
        }
    }
}

/// Dedicates whole physical PEs to each virtual PE.
#[derive(Default)]
pub struct SpaceSharedVmScheduler {
    pe_map: FxHashMap<VmUid, Vec<usize>>,
    mips_map: FxHashMap<VmUid, Vec<f64>>,
}

impl SpaceSharedVmScheduler {
    /// Picks a distinct free PE with enough MIPS for every requested virtual PE.
    fn select_pes(pes: &[Pe], mips_share: &[f64]) -> Option<Vec<usize>> {
        let mut selected: Vec<usize> = Vec::with_capacity(mips_share.len());
        for &mips in mips_share {
            let index = pes
                .iter()
                .enumerate()
                .position(|(i, pe)| pe.is_free() && !selected.contains(&i) && !mips.exceeds(pe.mips()))?;
            selected.push(index);
        }
        Some(selected)
    }
}

impl VmScheduler for SpaceSharedVmScheduler {
    fn can_allocate(&self, pes: &[Pe], mips_share: &[f64]) -> Result<(), AdmissionVerdict> {
        let free = pes.iter().filter(|pe| pe.is_free()).count();
        if free < mips_share.len() {
            return Err(AdmissionVerdict::NotEnoughPes);
        }
        match Self::select_pes(pes, mips_share) {
            Some(_) => Ok(()),
            None => Err(AdmissionVerdict::NotEnoughMips),
        }
    }

    fn allocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid, mips_share: &[f64]) -> bool {
        if self.pe_map.contains_key(&vm) {
            return false;
        }
        let Some(selected) = Self::select_pes(pes, mips_share) else {
            return false;
        };
        for (&index, &mips) in selected.iter().zip(mips_share) {
            let pe = &mut pes[index];
            pe.provisioner_mut().allocate(vm, mips);
            pe.set_status(PeStatus::Busy);
        }
        self.pe_map.insert(vm, selected);
        self.mips_map.insert(vm, mips_share.to_vec());
        true
    }

    fn deallocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid) {
        for index in self.pe_map.remove(&vm).unwrap_or_default() {
            let pe = &mut pes[index];
            pe.provisioner_mut().deallocate(vm);
            pe.set_status(PeStatus::Free);
        }
        self.mips_map.remove(&vm);
    }

    fn allocated_mips_for_vm(&self, vm: VmUid) -> Vec<f64> {
        self.mips_map.get(&vm).cloned().unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "space-shared"
    }
}

/// Lets VMs share physical PEs. When requests exceed host capacity every VM
/// is scaled down by the same factor.
#[derive(Default)]
pub struct TimeSharedVmScheduler {
    requests: Vec<(VmUid, Vec<f64>)>,
    allocated: FxHashMap<VmUid, Vec<f64>>,
}

impl TimeSharedVmScheduler {
    /// Recomputes every VM share from scratch, filling PEs in order.
    fn redistribute(&mut self, pes: &mut [Pe]) {
        for pe in pes.iter_mut() {
            pe.provisioner_mut().deallocate_all();
            pe.set_status(PeStatus::Free);
        }
        self.allocated.clear();

        let capacity: f64 = pes.iter().map(Pe::mips).sum();
        let requested: f64 = self.requests.iter().flat_map(|(_, share)| share.iter()).sum();
        let factor = if requested > capacity && requested > 0. {
            capacity / requested
        } else {
            1.
        };

        let mut cursor = 0;
        for (vm, share) in &self.requests {
            let scaled: Vec<f64> = share.iter().map(|mips| mips * factor).collect();
            for &mips in &scaled {
                let mut remaining = mips;
                while remaining > MIPS_TOLERANCE && cursor < pes.len() {
                    let pe = &mut pes[cursor];
                    let take = remaining.min(pe.available_mips());
                    if take > 0. && pe.provisioner_mut().allocate(*vm, take) {
                        pe.set_status(PeStatus::Busy);
                        remaining -= take;
                    }
                    if pe.available_mips() <= MIPS_TOLERANCE * pe.mips().max(1.) {
                        cursor += 1;
                    }
                }
            }
            self.allocated.insert(*vm, scaled);
        }
    }
}

impl VmScheduler for TimeSharedVmScheduler {
    fn can_allocate(&self, pes: &[Pe], mips_share: &[f64]) -> Result<(), AdmissionVerdict> {
        if mips_share.len() > pes.len() {
            return Err(AdmissionVerdict::NotEnoughPes);
        }
        let max_pe_mips = pes.iter().map(Pe::mips).fold(0., f64::max);
        if mips_share.iter().any(|mips| mips.exceeds(max_pe_mips)) {
            return Err(AdmissionVerdict::NotEnoughMips);
        }
        Ok(())
    }

    fn allocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid, mips_share: &[f64]) -> bool {
        if self.can_allocate(pes, mips_share).is_err() || self.allocated.contains_key(&vm) {
            return false;
        }
        self.requests.push((vm, mips_share.to_vec()));
        self.redistribute(pes);
        true
    }

    fn deallocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid) {
        self.requests.retain(|(uid, _)| *uid != vm);
        self.redistribute(pes);
    }

    fn allocated_mips_for_vm(&self, vm: VmUid) -> Vec<f64> {
        self.allocated.get(&vm).cloned().unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "time-shared"
    }
}
