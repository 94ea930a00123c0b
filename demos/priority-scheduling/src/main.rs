mod shortest_first;

use std::io::Write;

use env_logger::Builder;

use cloudlet_sim::allocation_policy::FirstFit;
use cloudlet_sim::characteristics::DatacenterCharacteristics;
use cloudlet_sim::cloudlet_scheduler::CloudletSchedulerPolicy;
use cloudlet_sim::kernel::Simulation;
use cloudlet_sim::pe::uniform_pes;
use cloudlet_sim::vm_scheduler::VmSchedulerPolicy;
use cloudlet_sim::{CloudSimulation, Cloudlet, CloudletReport, DispatchPolicy, Host, PriorityDispatch, PriorityOrder, Vm};

use shortest_first::ShortestFirst;

const PRIORITIES: [i32; 4] = [8, 2, 5, 2];

fn simulation(label: &str, dispatch_policy: Box<dyn DispatchPolicy>) {
    let mut cloud = CloudSimulation::new(Simulation::new(42));

    let hosts = (0..2)
        .map(|id| Host::new(id, uniform_pes(2, 1000.), 4096, 10000, 1_000_000, VmSchedulerPolicy::TimeShared.build()))
        .collect();
    cloud.add_datacenter(
        "datacenter",
        hosts,
        Box::new(FirstFit),
        DatacenterCharacteristics::default(),
        None,
    );

    let broker = cloud.add_broker("broker", dispatch_policy);
    let vms = (0..2)
        .map(|id| Vm::new(id, 1000., 1, 512, 1000, 10000).with_cloudlet_scheduler(CloudletSchedulerPolicy::TimeShared))
        .collect();
    let cloudlets = (0..8)
        .map(|id| Cloudlet::new(id, 10000 + 2000 * (id as u64 % 3), 1).with_priority(PRIORITIES[id as usize % 4]))
        .collect();
    broker.borrow_mut().submit_vm_list(vms);
    broker.borrow_mut().submit_cloudlet_list(cloudlets);

    cloud.run();

    let reports = broker.borrow().reports();
    print_reports(label, &reports);
}

fn print_reports(label: &str, reports: &[CloudletReport]) {
    println!("\n========== {} ==========", label);
    println!(
        "{:>8} {:>9} {:>4} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "cloudlet", "status", "vm", "priority", "submitted", "started", "finished", "wait", "response"
    );
    let fmt = |value: Option<f64>| value.map_or("-".to_string(), |v| format!("{:.2}", v));
    for r in reports {
        println!(
            "{:>8} {:>9} {:>4} {:>8} {:>10.2} {:>10} {:>10} {:>10} {:>10}",
            r.cloudlet_id,
            format!("{:?}", r.status),
            r.vm_id.map_or("-".to_string(), |id| id.to_string()),
            r.priority,
            r.submission_time,
            fmt(r.exec_start_time),
            fmt(r.finish_time),
            fmt(r.wait_time()),
            fmt(r.response_time()),
        );
    }
    let responses: Vec<f64> = reports.iter().filter_map(CloudletReport::response_time).collect();
    if !responses.is_empty() {
        println!(
            "mean response time: {:.2}",
            responses.iter().sum::<f64>() / responses.len() as f64
        );
    }
}

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    simulation(
        "higher priority first, 1 s per priority level",
        Box::new(PriorityDispatch::new(PriorityOrder::HigherFirst).with_submission_delay(1.)),
    );
    simulation(
        "lower priority first, no delay",
        Box::new(PriorityDispatch::new(PriorityOrder::LowerFirst)),
    );
    // simulation("arrival order", Box::new(cloudlet_sim::ArrivalOrder));
    simulation("shortest first", Box::new(ShortestFirst));
}
