use std::io::Write;

use env_logger::Builder;

use cloudlet_sim::config::sim_config::SimulationConfig;
use cloudlet_sim::kernel::RunState;
use cloudlet_sim::monitoring::TOTAL;
use cloudlet_sim::CloudSimulation;

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let config = SimulationConfig::from_file("configs/config.yaml");
    // let config = SimulationConfig::from_file("configs/single_broker.yaml");

    log::info!(
        "loaded {} datacenters with {} hosts and {} brokers",
        config.datacenters.len(),
        config.number_of_hosts(),
        config.brokers.len()
    );

    let mut cloud = CloudSimulation::from_config(config);
    let state = cloud.run();
    if state != RunState::Completed {
        log::warn!("simulation stopped early: {:?}", state);
    }

    println!("finished at {:.3} after {} events", cloud.time(), cloud.event_count());
    for broker in cloud.brokers() {
        let broker = broker.borrow();
        println!("\n---------- {} ----------", broker.name());
        for (vm, error) in broker.failed_vms() {
            println!("vm #{} failed: {}", vm.id, error);
        }
        for report in broker.reports() {
            println!("{}", serde_json::to_string(&report).unwrap());
        }
        if !broker.pending_cloudlets().is_empty() {
            println!("{} cloudlets were never submitted", broker.pending_cloudlets().len());
        }
    }

    let monitoring = cloud.monitoring();
    let monitoring = monitoring.borrow();
    println!("\n---------- load ----------");
    for point in monitoring.points(TOTAL) {
        println!("{:>8.1} mips {:>5.3} ram {:>5.3}", point.time, point.load.mips, point.load.ram);
    }
}
