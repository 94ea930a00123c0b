//! Order and pacing of cloudlet submission inside a broker.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::cloudlet::Cloudlet;
use crate::config::sim_config::DispatchConfig;

pub trait DispatchPolicy {
    /// Returns the pending cloudlets in the order they should be submitted.
    fn order_pending(&self, cloudlets: Vec<Cloudlet>) -> Vec<Cloudlet>;

    /// Submission delay for each cloudlet of an already ordered batch.
    fn submission_delays(&self, ordered: &[Cloudlet]) -> Vec<f64> {
        vec![0.; ordered.len()]
    }

    fn name(&self) -> String;
}

/// Submits cloudlets in the order the user added them, all at once.
#[derive(Default)]
pub struct ArrivalOrder;

impl DispatchPolicy for ArrivalOrder {
    fn order_pending(&self, cloudlets: Vec<Cloudlet>) -> Vec<Cloudlet> {
        cloudlets
    }

    fn name(&self) -> String {
        "arrival-order".to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityOrder {
    /// Smaller priority values are more urgent.
    LowerFirst,
    /// Larger priority values are more urgent.
    HigherFirst,
}

/// Stable sort by priority, optionally holding back less urgent cloudlets.
///
/// With a delay step `s`, a cloudlet is submitted `s * |best - priority|` after the
/// batch, where `best` is the most urgent priority present in it.
pub struct PriorityDispatch {
    order: PriorityOrder,
    submission_delay_step: Option<f64>,
}

impl PriorityDispatch {
    pub fn new(order: PriorityOrder) -> Self {
        Self {
            order,
            submission_delay_step: None,
        }
    }

    pub fn with_submission_delay(mut self, step: f64) -> Self {
        assert!(
            step.is_finite() && step >= 0.,
            "submission delay step must be a non-negative number, got {}",
            step
        );
        self.submission_delay_step = Some(step);
        self
    }

    pub fn order(&self) -> PriorityOrder {
        self.order
    }
}

impl DispatchPolicy for PriorityDispatch {
    fn order_pending(&self, mut cloudlets: Vec<Cloudlet>) -> Vec<Cloudlet> {
        match self.order {
            PriorityOrder::LowerFirst => cloudlets.sort_by_key(Cloudlet::priority),
            PriorityOrder::HigherFirst => cloudlets.sort_by_key(|c| Reverse(c.priority())),
        }
        cloudlets
    }

    fn submission_delays(&self, ordered: &[Cloudlet]) -> Vec<f64> {
        let Some(step) = self.submission_delay_step else {
            return vec![0.; ordered.len()];
        };
        let priorities = ordered.iter().map(Cloudlet::priority);
        let best = match self.order {
            PriorityOrder::LowerFirst => priorities.min(),
            PriorityOrder::HigherFirst => priorities.max(),
        };
        let Some(best) = best else {
            return Vec::new();
        };
        ordered
            .iter()
            .map(|c| step * (i64::from(c.priority()) - i64::from(best)).abs() as f64)
            .collect()
    }

    fn name(&self) -> String {
        match self.order {
            PriorityOrder::LowerFirst => "priority-lower-first".to_string(),
            PriorityOrder::HigherFirst => "priority-higher-first".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchKind {
    #[default]
    ArrivalOrder,
    Priority,
}

pub fn dispatch_policy_resolver(config: &DispatchConfig) -> Box<dyn DispatchPolicy> {
    match config.policy {
        DispatchKind::ArrivalOrder => Box::new(ArrivalOrder),
        DispatchKind::Priority => {
            let order = config
                .order
                .unwrap_or_else(|| panic!("priority dispatch needs an explicit order (lower-first or higher-first)"));
            let policy = PriorityDispatch::new(order);
            match config.submission_delay_step {
                Some(step) => Box::new(policy.with_submission_delay(step)),
                None => Box::new(policy),
            }
        }
    }
}
