#![doc = include_str!("../readme.md")]

pub mod allocation_policy;
pub mod broker;
pub mod characteristics;
pub mod cloudlet;
pub mod cloudlet_scheduler;
pub mod config;
pub mod datacenter;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod host;
pub mod kernel;
pub mod monitoring;
pub mod pe;
pub mod provisioner;
pub mod simulation;
pub mod vm;
pub mod vm_scheduler;
pub mod workload_generators;

#[doc(hidden)]
pub use log as __log;

pub use broker::Broker;
pub use cloudlet::{Cloudlet, CloudletReport, CloudletStatus};
pub use datacenter::Datacenter;
pub use dispatch::{ArrivalOrder, DispatchPolicy, PriorityDispatch, PriorityOrder};
pub use error::SimError;
pub use host::Host;
pub use simulation::CloudSimulation;
pub use vm::Vm;
pub use workload_generators::generator::WorkloadGenerator;
