use std::collections::VecDeque;

use crate::cloudlet::{Cloudlet, CloudletId, CloudletStatus};
use crate::cloudlet_scheduler::{collect_completed, next_completion, take_by_id, CloudletScheduler};

/// Each running cloudlet owns whole PEs; the rest wait in FIFO order.
///
/// The head of the queue blocks everything behind it until enough PEs free up.
/// A cloudlet needing more PEs than the VM has is failed on sight.
#[derive(Default)]
pub struct SpaceSharedCloudletScheduler {
    exec: Vec<Cloudlet>,
    waiting: VecDeque<Cloudlet>,
    paused: Vec<Cloudlet>,
    finished: Vec<Cloudlet>,
    previous_time: f64,
}

impl SpaceSharedCloudletScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn capacity_per_pe(mips_share: &[f64]) -> f64 {
        if mips_share.is_empty() {
            0.
        } else {
            mips_share.iter().sum::<f64>() / mips_share.len() as f64
        }
    }

    fn used_pes(&self) -> u32 {
        self.exec.iter().map(Cloudlet::pes).sum()
    }

    fn advance(&mut self, now: f64, mips_share: &[f64]) {
        let elapsed = now - self.previous_time;
        if elapsed > 0. {
            let capacity = Self::capacity_per_pe(mips_share);
            for cloudlet in self.exec.iter_mut() {
                cloudlet.advance(capacity * cloudlet.pes() as f64, elapsed);
            }
        }
        self.previous_time = now;
    }

    /// Starts waiting cloudlets while the head fits. Returns true if anything moved.
    fn promote(&mut self, now: f64, vm_pes: u32) -> bool {
        let mut moved = false;
        while let Some(head) = self.waiting.front() {
            if head.pes() > vm_pes {
                if let Some(mut cloudlet) = self.waiting.pop_front() {
                    cloudlet.fail(now);
                    self.finished.push(cloudlet);
                }
                moved = true;
                continue;
            }
            if self.used_pes() + head.pes() > vm_pes {
                break;
            }
            if let Some(mut cloudlet) = self.waiting.pop_front() {
                cloudlet.start(now);
                self.exec.push(cloudlet);
                moved = true;
            }
        }
        moved
    }

    fn settle(&mut self, now: f64, mips_share: &[f64]) -> Option<f64> {
        let capacity = Self::capacity_per_pe(mips_share);
        let rate = |c: &Cloudlet| capacity * c.pes() as f64;
        let vm_pes = mips_share.len() as u32;
        loop {
            let completed = collect_completed(&mut self.exec, &mut self.finished, now, rate);
            let promoted = capacity > 0. && self.promote(now, vm_pes);
            if !completed && !promoted {
                return next_completion(&self.exec, now, rate);
            }
        }
    }
}

impl CloudletScheduler for SpaceSharedCloudletScheduler {
    fn submit(&mut self, cloudlet: Cloudlet, now: f64, mips_share: &[f64]) -> Option<f64> {
        self.advance(now, mips_share);
        self.waiting.push_back(cloudlet);
        self.settle(now, mips_share)
    }

    fn update_processing(&mut self, now: f64, mips_share: &[f64]) -> Option<f64> {
        self.advance(now, mips_share);
        self.settle(now, mips_share)
    }

    fn take_finished(&mut self) -> Vec<Cloudlet> {
        std::mem::take(&mut self.finished)
    }

    fn cancel(&mut self, cloudlet_id: CloudletId) -> Option<Cloudlet> {
        let mut cloudlet = take_by_id(&mut self.exec, cloudlet_id)
            .or_else(|| {
                let index = self.waiting.iter().position(|c| c.id() == cloudlet_id)?;
                self.waiting.remove(index)
            })
            .or_else(|| take_by_id(&mut self.paused, cloudlet_id))?;
        cloudlet.cancel();
        Some(cloudlet)
    }

    fn pause(&mut self, cloudlet_id: CloudletId) -> bool {
        let cloudlet = take_by_id(&mut self.exec, cloudlet_id).or_else(|| {
            let index = self.waiting.iter().position(|c| c.id() == cloudlet_id)?;
            self.waiting.remove(index)
        });
        match cloudlet {
            Some(mut cloudlet) => {
                cloudlet.set_status(CloudletStatus::Paused);
                self.paused.push(cloudlet);
                true
            }
            None => false,
        }
    }

    fn resume(&mut self, cloudlet_id: CloudletId) -> bool {
        match take_by_id(&mut self.paused, cloudlet_id) {
            Some(mut cloudlet) => {
                cloudlet.set_status(CloudletStatus::Resumed);
                self.waiting.push_back(cloudlet);
                true
            }
            None => false,
        }
    }

    fn drain(&mut self, now: f64) -> Vec<Cloudlet> {
        let mut drained = std::mem::take(&mut self.finished);
        let residents = self
            .exec
            .drain(..)
            .chain(self.waiting.drain(..))
            .chain(self.paused.drain(..));
        for mut cloudlet in residents {
            cloudlet.fail(now);
            drained.push(cloudlet);
        }
        drained
    }

    fn cloudlet(&self, cloudlet_id: CloudletId) -> Option<&Cloudlet> {
        self.exec
            .iter()
            .chain(self.waiting.iter())
            .chain(self.paused.iter())
            .chain(self.finished.iter())
            .find(|c| c.id() == cloudlet_id)
    }

    fn resident_count(&self) -> usize {
        self.exec.len() + self.waiting.len() + self.paused.len()
    }

    fn running_count(&self) -> usize {
        self.exec.len()
    }

    fn name(&self) -> &'static str {
        "space-shared"
    }
}
