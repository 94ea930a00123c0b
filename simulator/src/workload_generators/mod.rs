//! Cloudlet workloads for brokers: fixed groups from configuration and random batches.

pub mod generator;
pub mod native;
pub mod random;
pub mod workload_type;
