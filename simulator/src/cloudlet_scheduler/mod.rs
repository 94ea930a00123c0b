//! Second scheduling level: how a VM divides its MIPS share among its cloudlets.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cloudlet::{Cloudlet, CloudletId, CloudletStatus};

pub mod space_shared;
pub mod time_shared;

pub use space_shared::SpaceSharedCloudletScheduler;
pub use time_shared::TimeSharedCloudletScheduler;

pub trait CloudletScheduler {
    /// Queues a cloudlet (status already `Queued`) and returns the next predicted completion time.
    fn submit(&mut self, cloudlet: Cloudlet, now: f64, mips_share: &[f64]) -> Option<f64>;

    /// Advances every running cloudlet to `now` using the share in force since the previous update.
    fn update_processing(&mut self, now: f64, mips_share: &[f64]) -> Option<f64>;

    /// Cloudlets that reached a terminal state since the last call.
    fn take_finished(&mut self) -> Vec<Cloudlet>;

    fn cancel(&mut self, cloudlet_id: CloudletId) -> Option<Cloudlet>;

    fn pause(&mut self, cloudlet_id: CloudletId) -> bool;

    fn resume(&mut self, cloudlet_id: CloudletId) -> bool;

    /// Removes every cloudlet; the unfinished ones are marked `Failed`.
    fn drain(&mut self, now: f64) -> Vec<Cloudlet>;

    fn cloudlet(&self, cloudlet_id: CloudletId) -> Option<&Cloudlet>;

    fn cloudlet_status(&self, cloudlet_id: CloudletId) -> Option<CloudletStatus> {
        self.cloudlet(cloudlet_id).map(Cloudlet::status)
    }

    /// Cloudlets held by the scheduler and not yet finished.
    fn resident_count(&self) -> usize;

    fn running_count(&self) -> usize;

    fn name(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloudletSchedulerPolicy {
    #[default]
    TimeShared,
    SpaceShared,
}

impl CloudletSchedulerPolicy {
    pub fn build(self) -> Box<dyn CloudletScheduler> {
        match self {
            CloudletSchedulerPolicy::TimeShared => Box::new(TimeSharedCloudletScheduler::new()),
            CloudletSchedulerPolicy::SpaceShared => Box::new(SpaceSharedCloudletScheduler::new()),
        }
    }
}

impl FromStr for CloudletSchedulerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time-shared" => Ok(CloudletSchedulerPolicy::TimeShared),
            "space-shared" => Ok(CloudletSchedulerPolicy::SpaceShared),
            _ => Err(format!("unknown cloudlet scheduler: {}", s)),
        }
    }
}

/// Moves cloudlets that are done out of `exec` into `finished`, preserving order.
///
/// A cloudlet also counts as done when its predicted completion is not representable
/// as a later time than `now`.
pub(crate) fn collect_completed(
    exec: &mut Vec<Cloudlet>,
    finished: &mut Vec<Cloudlet>,
    now: f64,
    rate_of: impl Fn(&Cloudlet) -> f64,
) -> bool {
    let mut any = false;
    let mut i = 0;
    while i < exec.len() {
        let cloudlet = &exec[i];
        let rate = rate_of(cloudlet);
        let done = cloudlet.status() == CloudletStatus::InExec
            && (cloudlet.is_complete() || (rate > 0. && now + cloudlet.remaining_length() / rate <= now));
        if done {
            let mut cloudlet = exec.remove(i);
            cloudlet.complete(now);
            finished.push(cloudlet);
            any = true;
        } else {
            i += 1;
        }
    }
    any
}

pub(crate) fn next_completion(exec: &[Cloudlet], now: f64, rate_of: impl Fn(&Cloudlet) -> f64) -> Option<f64> {
    exec.iter()
        .filter(|c| c.status() == CloudletStatus::InExec)
        .filter_map(|c| {
            let rate = rate_of(c);
            (rate > 0.).then(|| now + c.remaining_length() / rate)
        })
        .min_by(f64::total_cmp)
}

fn take_by_id(list: &mut Vec<Cloudlet>, cloudlet_id: CloudletId) -> Option<Cloudlet> {
    let index = list.iter().position(|c| c.id() == cloudlet_id)?;
    Some(list.remove(index))
}
