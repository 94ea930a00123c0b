use crate::cloudlet::{Cloudlet, CloudletId, CloudletStatus};
use crate::cloudlet_scheduler::{collect_completed, next_completion, take_by_id, CloudletScheduler};

/// All resident cloudlets run at once, splitting the VM capacity.
///
/// Per-PE capacity is the total share divided by the larger of the VM PE count
/// and the number of PEs demanded by running cloudlets.
#[derive(Default)]
pub struct TimeSharedCloudletScheduler {
    exec: Vec<Cloudlet>,
    paused: Vec<Cloudlet>,
    finished: Vec<Cloudlet>,
    previous_time: f64,
}

impl TimeSharedCloudletScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn capacity_per_pe(&self, mips_share: &[f64]) -> f64 {
        let cpus = mips_share.iter().filter(|mips| **mips > 0.).count() as u32;
        if cpus == 0 {
            return 0.;
        }
        let pes_in_use: u32 = self.exec.iter().map(Cloudlet::pes).sum();
        mips_share.iter().sum::<f64>() / cpus.max(pes_in_use) as f64
    }

    fn advance(&mut self, now: f64, mips_share: &[f64]) {
        let elapsed = now - self.previous_time;
        if elapsed > 0. {
            let capacity = self.capacity_per_pe(mips_share);
            for cloudlet in self.exec.iter_mut().filter(|c| c.status() == CloudletStatus::InExec) {
                cloudlet.advance(capacity * cloudlet.pes() as f64, elapsed);
            }
        }
        self.previous_time = now;
    }

    fn settle(&mut self, now: f64, mips_share: &[f64]) -> Option<f64> {
        loop {
            let capacity = self.capacity_per_pe(mips_share);
            if capacity > 0. {
                for cloudlet in self.exec.iter_mut().filter(|c| c.status() != CloudletStatus::InExec) {
                    cloudlet.start(now);
                }
            }
            let rate = |c: &Cloudlet| capacity * c.pes() as f64;
            if !collect_completed(&mut self.exec, &mut self.finished, now, rate) {
                return next_completion(&self.exec, now, rate);
            }
        }
    }
}

impl CloudletScheduler for TimeSharedCloudletScheduler {
    fn submit(&mut self, cloudlet: Cloudlet, now: f64, mips_share: &[f64]) -> Option<f64> {
        self.advance(now, mips_share);
        self.exec.push(cloudlet);
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
        let mut cloudlet = take_by_id(&mut self.exec, cloudlet_id).or_else(|| take_by_id(&mut self.paused, cloudlet_id))?;
        cloudlet.cancel();
        Some(cloudlet)
    }

    fn pause(&mut self, cloudlet_id: CloudletId) -> bool {
        match take_by_id(&mut self.exec, cloudlet_id) {
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
                self.exec.push(cloudlet);
                true
            }
            None => false,
        }
    }

    fn drain(&mut self, now: f64) -> Vec<Cloudlet> {
        let mut drained = std::mem::take(&mut self.finished);
        for mut cloudlet in self.exec.drain(..).chain(self.paused.drain(..)) {
            cloudlet.fail(now);
            drained.push(cloudlet);
        }
        drained
    }

    fn cloudlet(&self, cloudlet_id: CloudletId) -> Option<&Cloudlet> {
        self.exec
            .iter()
            .chain(self.paused.iter())
            .chain(self.finished.iter())
            .find(|c| c.id() == cloudlet_id)
    }

    fn resident_count(&self) -> usize {
        self.exec.len() + self.paused.len()
    }

    fn running_count(&self) -> usize {
        self.exec.len()
    }

    fn name(&self) -> &'static str {
        "time-shared"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(id: CloudletId, length: u64, pes: u32) -> Cloudlet {
        let mut cloudlet = Cloudlet::new(id, length, pes);
        cloudlet.accept(0, 0, 0.);
        cloudlet
    }

    #[test]
    fn cloudlets_share_capacity() {
        let share = [1000.];
        let mut scheduler = TimeSharedCloudletScheduler::new();
        scheduler.submit(queued(0, 10000, 1), 0., &share);
        let next = scheduler.submit(queued(1, 1000, 1), 0., &share);
        // 500 MIPS each: the short one is done at 2
        assert_eq!(next, Some(2.));

        let next = scheduler.update_processing(2., &share);
        let finished = scheduler.take_finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].id(), 1);
        assert_eq!(finished[0].finish_time(), Some(2.));
        // 9000 MI left at full 1000 MIPS
        assert_eq!(next, Some(11.));

        scheduler.update_processing(11., &share);
        let finished = scheduler.take_finished();
        assert_eq!(finished[0].id(), 0);
        assert_eq!(finished[0].status(), CloudletStatus::Success);
        assert_eq!(finished[0].finished_so_far(), 10000.);
    }

    #[test]
    fn zero_length_cloudlet_finishes_on_submit() {
        let mut scheduler = TimeSharedCloudletScheduler::new();
        let next = scheduler.submit(queued(0, 0, 1), 5., &[500.]);
        assert_eq!(next, None);
        let finished = scheduler.take_finished();
        assert_eq!(finished[0].exec_start_time(), Some(5.));
        assert_eq!(finished[0].finish_time(), Some(5.));
    }

    #[test]
    fn no_share_means_no_progress() {
        let mut scheduler = TimeSharedCloudletScheduler::new();
        assert_eq!(scheduler.submit(queued(0, 100, 1), 0., &[]), None);
        assert_eq!(scheduler.update_processing(10., &[]), None);
        assert_eq!(scheduler.cloudlet_status(0), Some(CloudletStatus::Queued));
        assert_eq!(scheduler.cloudlet(0).map(Cloudlet::finished_so_far), Some(0.));
    }

    #[test]
    fn paused_cloudlet_keeps_progress() {
        let share = [100.];
        let mut scheduler = TimeSharedCloudletScheduler::new();
        scheduler.submit(queued(0, 1000, 1), 0., &share);
        scheduler.update_processing(4., &share);
        assert!(scheduler.pause(0));
        assert_eq!(scheduler.update_processing(8., &share), None);
        assert_eq!(scheduler.cloudlet(0).map(Cloudlet::finished_so_far), Some(400.));

        assert!(scheduler.resume(0));
        assert_eq!(scheduler.update_processing(8., &share), Some(14.));
        scheduler.update_processing(14., &share);
        let finished = scheduler.take_finished();
        assert_eq!(finished[0].exec_start_time(), Some(0.));
        assert_eq!(finished[0].actual_cpu_time(), 10.);
    }

    #[test]
    fn cancel_and_drain() {
        let share = [100.];
        let mut scheduler = TimeSharedCloudletScheduler::new();
        scheduler.submit(queued(0, 1000, 1), 0., &share);
        scheduler.submit(queued(1, 1000, 1), 0., &share);
        let canceled = scheduler.cancel(0).map(|c| c.status());
        assert_eq!(canceled, Some(CloudletStatus::Canceled));
        assert!(scheduler.cancel(0).is_none());

        let drained = scheduler.drain(3.);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].status(), CloudletStatus::Failed);
        assert_eq!(scheduler.resident_count(), 0);
    }
}
