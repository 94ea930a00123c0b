use std::cell::RefCell;
use std::rc::Rc;

use cloudlet_sim::allocation_policy::FirstFit;
use cloudlet_sim::characteristics::DatacenterCharacteristics;
use cloudlet_sim::cloudlet_scheduler::CloudletSchedulerPolicy;
use cloudlet_sim::config::sim_config::{MonitoringConfig, SimulationConfig};
use cloudlet_sim::error::AdmissionVerdict;
use cloudlet_sim::events::EventData;
use cloudlet_sim::kernel::{Event, EventHandler, RunState, Simulation, SimulationContext};
use cloudlet_sim::monitoring::{Monitoring, TOTAL};
use cloudlet_sim::pe::uniform_pes;
use cloudlet_sim::vm::VmUid;
use cloudlet_sim::vm_scheduler::VmSchedulerPolicy;
use cloudlet_sim::{
    ArrivalOrder, Broker, CloudSimulation, Cloudlet, CloudletReport, CloudletStatus, Datacenter, Host,
    PriorityDispatch, PriorityOrder, SimError, Vm,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn host(id: u32, pes: u32, mips: f64, vm_scheduler: VmSchedulerPolicy) -> Host {
    Host::new(id, uniform_pes(pes, mips), 4096, 10000, 1_000_000, vm_scheduler.build())
}

fn single_host_cloud(pes: u32, mips: f64, vm_scheduler: VmSchedulerPolicy) -> CloudSimulation {
    init_logger();
    let mut cloud = CloudSimulation::new(Simulation::new(42));
    cloud.add_datacenter(
        "dc-0",
        vec![host(0, pes, mips, vm_scheduler)],
        Box::new(FirstFit),
        DatacenterCharacteristics::default(),
        None,
    );
    cloud
}

fn vm(id: u32, mips: f64, pes: u32, policy: CloudletSchedulerPolicy) -> Vm {
    Vm::new(id, mips, pes, 512, 1000, 10000).with_cloudlet_scheduler(policy)
}

fn report(broker: &Rc<RefCell<Broker>>, cloudlet_id: u32) -> CloudletReport {
    broker
        .borrow()
        .reports()
        .into_iter()
        .find(|r| r.cloudlet_id == cloudlet_id)
        .unwrap_or_else(|| panic!("cloudlet #{} was not returned", cloudlet_id))
}

#[test]
fn single_cloudlet_runs_for_400_seconds() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::SpaceShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::SpaceShared)]);
    broker.borrow_mut().submit_cloudlet_list(vec![Cloudlet::new(0, 400000, 1)]);

    assert_eq!(cloud.run(), RunState::Completed);

    let r = report(&broker, 0);
    assert_eq!(r.status, CloudletStatus::Success);
    assert_eq!(r.vm_id, Some(0));
    assert_eq!(r.submission_time, 0.);
    assert_eq!(r.exec_start_time, Some(0.));
    assert_eq!(r.finish_time, Some(400.));
    assert_eq!(r.cpu_time, 400.);
    assert_eq!(cloud.time(), 400.);
    assert!(broker.borrow().is_finished());
    assert_eq!(cloud.datacenters()[0].borrow().vm_count(), 0);
}

#[test]
fn space_shared_vm_runs_cloudlets_back_to_back() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::SpaceShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 250., 1, CloudletSchedulerPolicy::SpaceShared)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![Cloudlet::new(0, 40000, 1), Cloudlet::new(1, 40000, 1)]);

    cloud.run();

    let first = report(&broker, 0);
    let second = report(&broker, 1);
    assert_eq!(first.finish_time, Some(160.));
    assert_eq!(second.exec_start_time, Some(160.));
    assert_eq!(second.finish_time, Some(320.));
    assert_eq!(second.wait_time(), Some(160.));
}

#[test]
fn time_shared_cloudlets_finish_together() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::TimeShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![Cloudlet::new(0, 10000, 1), Cloudlet::new(1, 10000, 1)]);

    cloud.run();

    for id in 0..2 {
        let r = report(&broker, id);
        assert_eq!(r.exec_start_time, Some(0.));
        assert_eq!(r.finish_time, Some(20.));
        assert_eq!(r.cpu_time, 20.);
    }
}

#[test]
fn priority_broker_delays_less_urgent_cloudlets() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::TimeShared);
    let policy = PriorityDispatch::new(PriorityOrder::HigherFirst).with_submission_delay(1.);
    let broker = cloud.add_broker("tenant", Box::new(policy));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared)]);
    broker.borrow_mut().submit_cloudlet_list(vec![
        Cloudlet::new(0, 10000, 1).with_priority(2),
        Cloudlet::new(1, 10000, 1).with_priority(8),
    ]);

    cloud.run();

    assert_eq!(broker.borrow().submitted_cloudlets(), &[1, 0]);
    let urgent = report(&broker, 1);
    assert_eq!(urgent.submission_time, 0.);
    assert_eq!(urgent.finish_time, Some(14.));
    let relaxed = report(&broker, 0);
    assert_eq!(relaxed.submission_time, 6.);
    assert_eq!(relaxed.exec_start_time, Some(6.));
    assert_eq!(relaxed.finish_time, Some(20.));
}

#[test]
fn priority_without_step_only_reorders() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::SpaceShared);
    let broker = cloud.add_broker("tenant", Box::new(PriorityDispatch::new(PriorityOrder::LowerFirst)));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::SpaceShared)]);
    broker.borrow_mut().submit_cloudlet_list(vec![
        Cloudlet::new(0, 1000, 1).with_priority(3),
        Cloudlet::new(1, 1000, 1).with_priority(1),
        Cloudlet::new(2, 1000, 1).with_priority(2),
        Cloudlet::new(3, 1000, 1).with_priority(1),
    ]);

    cloud.run();

    assert_eq!(broker.borrow().submitted_cloudlets(), &[1, 3, 2, 0]);
    assert_eq!(report(&broker, 1).finish_time, Some(1.));
    assert_eq!(report(&broker, 3).finish_time, Some(2.));
    assert_eq!(report(&broker, 2).finish_time, Some(3.));
    assert_eq!(report(&broker, 0).finish_time, Some(4.));
    for r in broker.borrow().reports() {
        assert_eq!(r.submission_time, 0.);
    }
}

#[test]
fn vm_that_does_not_fit_is_rejected() {
    let mut cloud = single_host_cloud(2, 1000., VmSchedulerPolicy::SpaceShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker.borrow_mut().submit_vm_list(vec![
        vm(0, 1000., 3, CloudletSchedulerPolicy::TimeShared),
        vm(1, 1000., 1, CloudletSchedulerPolicy::TimeShared),
    ]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![Cloudlet::new(0, 5000, 1), Cloudlet::new(1, 5000, 1)]);

    cloud.pause_at(1.);
    assert_eq!(cloud.run(), RunState::Paused { time: 1. });
    {
        let datacenter = cloud.datacenters()[0].borrow();
        let owner = broker.borrow().id();
        assert!(datacenter.vm(VmUid { owner, vm_id: 0 }).is_none());
        assert!(datacenter.vm(VmUid { owner, vm_id: 1 }).is_some());
        let residents: Vec<u32> = datacenter.hosts()[0].vms().iter().map(|vm| vm.vm().id).collect();
        assert_eq!(residents, vec![1]);
    }
    cloud.resume();
    assert_eq!(cloud.run(), RunState::Completed);

    let broker = broker.borrow();
    assert_eq!(broker.created_vms().len(), 1);
    let (failed, error) = &broker.failed_vms()[0];
    assert_eq!(failed.id, 0);
    assert!(matches!(
        error,
        SimError::AdmissionFailure {
            reason: AdmissionVerdict::NoSuitableHost,
            ..
        }
    ));
    // both cloudlets end up on the only created vm
    for r in broker.reports() {
        assert_eq!(r.vm_id, Some(1));
        assert_eq!(r.finish_time, Some(10.));
    }
}

#[test]
fn zero_length_cloudlet_returns_immediately() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::SpaceShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared)]);
    broker.borrow_mut().submit_cloudlet_list(vec![Cloudlet::new(0, 0, 1)]);

    assert_eq!(cloud.run(), RunState::Completed);

    let r = report(&broker, 0);
    assert_eq!(r.status, CloudletStatus::Success);
    assert_eq!(r.exec_start_time, Some(0.));
    assert_eq!(r.finish_time, Some(0.));
    assert_eq!(cloud.time(), 0.);
}

#[test]
fn vms_spill_over_to_the_next_datacenter() {
    init_logger();
    let mut cloud = CloudSimulation::new(Simulation::new(1));
    let small = cloud.add_datacenter(
        "small",
        vec![host(0, 1, 1000., VmSchedulerPolicy::SpaceShared)],
        Box::new(FirstFit),
        DatacenterCharacteristics::default(),
        None,
    );
    let large = cloud.add_datacenter(
        "large",
        vec![host(0, 2, 1000., VmSchedulerPolicy::SpaceShared)],
        Box::new(FirstFit),
        DatacenterCharacteristics::default(),
        None,
    );
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker.borrow_mut().submit_vm_list(vec![
        vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared),
        vm(1, 1000., 1, CloudletSchedulerPolicy::TimeShared),
    ]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![Cloudlet::new(0, 3000, 1), Cloudlet::new(1, 3000, 1)]);

    cloud.run();

    let small_id = small.borrow().id();
    let large_id = large.borrow().id();
    assert_eq!(broker.borrow().datacenter_of_vm(0), Some(small_id));
    assert_eq!(broker.borrow().datacenter_of_vm(1), Some(large_id));
    assert_eq!(report(&broker, 0).datacenter_id, Some(small_id));
    assert_eq!(report(&broker, 1).datacenter_id, Some(large_id));
    assert_eq!(report(&broker, 1).finish_time, Some(3.));
    assert!(broker.borrow().characteristics(large_id).is_some());
    assert!(broker.borrow().failed_vms().is_empty());
}

#[test]
fn cloudlet_bound_to_missing_vm_stays_pending() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::SpaceShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![Cloudlet::new(0, 1000, 1), Cloudlet::new(1, 1000, 1)]);
    broker.borrow_mut().bind_cloudlet_to_vm(1, 7);

    cloud.run();

    let broker = broker.borrow();
    assert_eq!(broker.received_cloudlets().len(), 1);
    assert_eq!(broker.pending_cloudlets().len(), 1);
    assert_eq!(broker.pending_cloudlets()[0].id(), 1);
    assert_eq!(broker.pending_cloudlets()[0].status(), CloudletStatus::Created);
}

#[test]
fn canceled_cloudlet_releases_capacity() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::TimeShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![Cloudlet::new(0, 10000, 1), Cloudlet::new(1, 10000, 1)]);
    broker.borrow().cancel_cloudlet(1, 5.);

    cloud.run();

    let canceled = report(&broker, 1);
    assert_eq!(canceled.status, CloudletStatus::Canceled);
    assert_eq!(canceled.finish_time, None);
    let survivor = report(&broker, 0);
    assert_eq!(survivor.status, CloudletStatus::Success);
    assert_eq!(survivor.finish_time, Some(12.5));
}

fn delayed_priority_broker(cloud: &mut CloudSimulation) -> Rc<RefCell<Broker>> {
    let policy = PriorityDispatch::new(PriorityOrder::HigherFirst).with_submission_delay(10.);
    let broker = cloud.add_broker("tenant", Box::new(policy));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared)]);
    broker.borrow_mut().submit_cloudlet_list(vec![
        Cloudlet::new(0, 10000, 1).with_priority(8),
        Cloudlet::new(1, 10000, 1).with_priority(2),
    ]);
    broker
}

#[test]
fn cloudlet_canceled_before_its_delayed_submission_never_runs() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::TimeShared);
    let broker = delayed_priority_broker(&mut cloud);
    broker.borrow().cancel_cloudlet(1, 5.);

    assert_eq!(cloud.run(), RunState::Completed);

    let canceled = report(&broker, 1);
    assert_eq!(canceled.status, CloudletStatus::Canceled);
    assert_eq!(canceled.finish_time, None);
    assert_eq!(canceled.datacenter_id, None);
    let urgent = report(&broker, 0);
    assert_eq!(urgent.status, CloudletStatus::Success);
    assert_eq!(urgent.finish_time, Some(10.));
    assert_eq!(cloud.time(), 10.);
}

#[test]
fn cloudlet_paused_before_its_delayed_submission_waits_for_resume() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::TimeShared);
    let broker = delayed_priority_broker(&mut cloud);
    broker.borrow().pause_cloudlet(1, 5.);
    broker.borrow().resume_cloudlet(1, 20.);

    cloud.run();

    assert!(broker.borrow().held_cloudlets().is_empty());
    let resumed = report(&broker, 1);
    assert_eq!(resumed.status, CloudletStatus::Success);
    assert_eq!(resumed.submission_time, 20.);
    assert_eq!(resumed.finish_time, Some(30.));
    assert_eq!(report(&broker, 0).finish_time, Some(10.));
}

#[test]
fn paused_cloudlet_resumes_where_it_stopped() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::TimeShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::SpaceShared)]);
    broker.borrow_mut().submit_cloudlet_list(vec![Cloudlet::new(0, 10000, 1)]);
    broker.borrow().pause_cloudlet(0, 2.);
    broker.borrow().resume_cloudlet(0, 5.);

    cloud.run();

    let r = report(&broker, 0);
    assert_eq!(r.status, CloudletStatus::Success);
    assert_eq!(r.exec_start_time, Some(0.));
    assert_eq!(r.finish_time, Some(13.));
    assert_eq!(r.cpu_time, 10.);
}

#[test]
fn time_shared_host_splits_pe_between_vms() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::TimeShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker.borrow_mut().submit_vm_list(vec![
        vm(0, 1000., 1, CloudletSchedulerPolicy::TimeShared),
        vm(1, 1000., 1, CloudletSchedulerPolicy::TimeShared),
    ]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![Cloudlet::new(0, 5000, 1), Cloudlet::new(1, 5000, 1)]);

    cloud.run();

    assert_eq!(report(&broker, 0).vm_id, Some(0));
    assert_eq!(report(&broker, 1).vm_id, Some(1));
    assert_eq!(report(&broker, 0).finish_time, Some(10.));
    assert_eq!(report(&broker, 1).finish_time, Some(10.));
}

#[test]
fn deferred_broker_joins_at_its_start_time() {
    init_logger();
    let config = SimulationConfig::from_yaml_str(
        r#"
seed: 9
datacenters:
  - name: dc-0
    hosts:
      - name: node
        pes: 2
        pe_mips: 1000
        ram: 4096
        bw: 10000
brokers:
  - name: early
    vms:
      - mips: 1000
        ram: 512
        bw: 1000
        size: 10000
    cloudlets:
      - length: 100000
  - name: late
    start_time: 200
    vms:
      - mips: 1000
        ram: 512
        bw: 1000
        size: 10000
    cloudlets:
      - length: 100000
"#,
    )
    .unwrap();
    let mut cloud = CloudSimulation::from_config(config);
    assert_eq!(cloud.brokers().len(), 1);

    assert_eq!(cloud.run(), RunState::Completed);

    assert_eq!(cloud.brokers().len(), 2);
    let late = cloud.broker("late").unwrap();
    let r = report(&late, 0);
    assert_eq!(r.submission_time, 200.);
    assert_eq!(r.finish_time, Some(300.));
    let early = cloud.broker("early").unwrap();
    assert_eq!(report(&early, 0).finish_time, Some(100.));
    assert_eq!(cloud.cloudlet_reports().len(), 2);
    assert!(!cloud.monitoring().borrow().points(TOTAL).is_empty());
}

#[test]
fn user_pause_stops_the_run() {
    let mut cloud = single_host_cloud(1, 1000., VmSchedulerPolicy::SpaceShared);
    let broker = cloud.add_broker("tenant", Box::new(ArrivalOrder));
    broker
        .borrow_mut()
        .submit_vm_list(vec![vm(0, 1000., 1, CloudletSchedulerPolicy::SpaceShared)]);
    broker.borrow_mut().submit_cloudlet_list(vec![Cloudlet::new(0, 50000, 1)]);

    cloud.pause_at(20.);
    assert_eq!(cloud.run(), RunState::Paused { time: 20. });
    assert!(broker.borrow().received_cloudlets().is_empty());

    cloud.resume();
    assert_eq!(cloud.run(), RunState::Completed);
    assert_eq!(report(&broker, 0).finish_time, Some(50.));
}

struct Tenant {
    ctx: SimulationContext,
    rejected: Vec<(Cloudlet, SimError)>,
}

impl EventHandler for Tenant {
    fn on(&mut self, event: Event) {
        if let EventData::CloudletRejected { cloudlet, error } = event.data {
            self.rejected.push((cloudlet, error));
        }
    }
}

#[test]
fn datacenter_rejects_cloudlet_for_unknown_vm() {
    init_logger();
    let mut sim = Simulation::new(3);
    let tenant_ctx = sim.create_context("tenant");
    assert_eq!(tenant_ctx.id(), 0);
    let tenant = Rc::new(RefCell::new(Tenant {
        ctx: tenant_ctx,
        rejected: Vec::new(),
    }));
    sim.add_handler("tenant", tenant.clone());

    let monitoring = Rc::new(RefCell::new(Monitoring::new(MonitoringConfig::default())));
    let dc_ctx = sim.create_context("dc");
    let datacenter = Rc::new(RefCell::new(Datacenter::new(
        dc_ctx,
        vec![host(0, 1, 1000., VmSchedulerPolicy::SpaceShared)],
        Box::new(FirstFit),
        DatacenterCharacteristics::default(),
        None,
        monitoring,
    )));
    let dc_id = sim.add_handler("dc", datacenter.clone());

    let cloudlet = Cloudlet::new(4, 1000, 1).with_vm(9);
    tenant
        .borrow()
        .ctx
        .emit_now(EventData::CloudletSubmit { cloudlet }, dc_id);
    sim.step_until_no_events();

    let tenant = tenant.borrow();
    assert_eq!(tenant.rejected.len(), 1);
    let (cloudlet, error) = &tenant.rejected[0];
    assert_eq!(cloudlet.status(), CloudletStatus::Created);
    assert_eq!(
        error,
        &SimError::BindingFailure {
            cloudlet_id: 4,
            vm_id: Some(9)
        }
    );
}
