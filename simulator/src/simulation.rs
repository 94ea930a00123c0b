use std::{cell::RefCell, rc::Rc, time::Instant};

use sugars::{rc, refcell};

use crate::{
    allocation_policy::{allocation_policy_resolver, VmAllocationPolicy},
    broker::Broker,
    characteristics::DatacenterCharacteristics,
    cloudlet::CloudletReport,
    config::sim_config::{BrokerConfig, DatacenterConfig, MonitoringConfig, SimulationConfig},
    datacenter::Datacenter,
    dispatch::{dispatch_policy_resolver, DispatchPolicy},
    host::Host,
    kernel::{Id, RunState, Simulation, SimulationContext},
    log_debug, log_info,
    monitoring::Monitoring,
    vm::Vm,
    workload_generators::workload_type::workload_resolver,
};

/// Builds and runs a cloud: datacenters with hosts plus the brokers that use them.
pub struct CloudSimulation {
    sim: Simulation,
    ctx: SimulationContext,

    datacenters: Vec<Rc<RefCell<Datacenter>>>,
    brokers: Vec<Rc<RefCell<Broker>>>,
    monitoring: Rc<RefCell<Monitoring>>,

    deferred_brokers: Vec<BrokerConfig>,
    user_pause: Option<f64>,
}

impl CloudSimulation {
    pub fn new(sim: Simulation) -> Self {
        Self::with_monitoring(sim, MonitoringConfig::default())
    }

    pub fn with_monitoring(mut sim: Simulation, monitoring: MonitoringConfig) -> Self {
        let ctx = sim.create_context("simulation");
        Self {
            sim,
            ctx,
            datacenters: Vec::new(),
            brokers: Vec::new(),
            monitoring: rc!(refcell!(Monitoring::new(monitoring))),
            deferred_brokers: Vec::new(),
            user_pause: None,
        }
    }

    pub fn from_config(config: SimulationConfig) -> Self {
        let sim = Simulation::new(config.seed);
        let mut cloud = Self::with_monitoring(sim, config.monitoring.clone());
        for datacenter in &config.datacenters {
            cloud.add_datacenter_from_config(datacenter);
        }
        for broker in config.brokers {
            if broker.start_time.unwrap_or(0.) > 0. {
                cloud.deferred_brokers.push(broker);
            } else {
                cloud.add_broker_from_config(&broker);
            }
        }
        cloud
            .deferred_brokers
            .sort_by(|a, b| a.start_time.unwrap_or(0.).total_cmp(&b.start_time.unwrap_or(0.)));
        cloud
    }

    pub fn add_datacenter(
        &mut self,
        name: &str,
        hosts: Vec<Host>,
        allocation_policy: Box<dyn VmAllocationPolicy>,
        characteristics: DatacenterCharacteristics,
        scheduling_interval: Option<f64>,
    ) -> Rc<RefCell<Datacenter>> {
        for host in &hosts {
            self.monitoring
                .borrow_mut()
                .add_host(name, host.name(), host.total_mips(), host.ram().capacity());
        }
        let ctx = self.sim.create_context(name);
        let datacenter = rc!(refcell!(Datacenter::new(
            ctx,
            hosts,
            allocation_policy,
            characteristics,
            scheduling_interval,
            self.monitoring.clone(),
        )));
        self.sim.add_handler(name, datacenter.clone());
        let ids = self.datacenter_ids_with(datacenter.borrow().id());
        for broker in &self.brokers {
            broker.borrow_mut().set_datacenters(ids.clone());
        }
        self.datacenters.push(datacenter.clone());
        datacenter
    }

    pub fn add_datacenter_from_config(&mut self, config: &DatacenterConfig) -> Rc<RefCell<Datacenter>> {
        let hosts = config
            .host_configs()
            .iter()
            .enumerate()
            .map(|(id, host_config)| Host::from_config(id as u32, host_config))
            .collect();
        self.add_datacenter(
            &config.name,
            hosts,
            allocation_policy_resolver(config.allocation_policy.unwrap_or_default()),
            config.characteristics.clone().unwrap_or_default(),
            config.scheduling_interval,
        )
    }

    fn datacenter_ids_with(&self, extra: Id) -> Vec<Id> {
        let mut ids: Vec<Id> = self.datacenters.iter().map(|dc| dc.borrow().id()).collect();
        ids.push(extra);
        ids
    }

    pub fn datacenter_ids(&self) -> Vec<Id> {
        self.datacenters.iter().map(|dc| dc.borrow().id()).collect()
    }

    /// Registers a broker that starts at the current simulation time.
    pub fn add_broker(&mut self, name: &str, dispatch_policy: Box<dyn DispatchPolicy>) -> Rc<RefCell<Broker>> {
        let ctx = self.sim.create_context(name);
        let broker = rc!(refcell!(Broker::new(ctx, dispatch_policy, self.datacenter_ids())));
        self.sim.add_handler(name, broker.clone());
        broker.borrow().start();
        self.brokers.push(broker.clone());
        broker
    }

    pub fn add_broker_from_config(&mut self, config: &BrokerConfig) -> Rc<RefCell<Broker>> {
        let broker = self.add_broker(
            &config.name,
            dispatch_policy_resolver(&config.dispatch.clone().unwrap_or_default()),
        );

        let mut vms = Vec::new();
        for group in &config.vms {
            for _ in 0..group.count.unwrap_or(1) {
                let mut vm = Vm::new(
                    vms.len() as u32,
                    group.mips,
                    group.pes.unwrap_or(1),
                    group.ram,
                    group.bw,
                    group.size,
                )
                .with_cloudlet_scheduler(group.cloudlet_scheduler.unwrap_or_default());
                if let Some(vmm) = &group.vmm {
                    vm = vm.with_vmm(vmm);
                }
                vms.push(vm);
            }
        }

        let mut cloudlets = Vec::new();
        for (workload_type, mut generator) in workload_resolver(config) {
            let workload = generator.get_workload(&self.ctx, cloudlets.len() as u32);
            log_debug!(
                self.ctx,
                "{:?} workload for {} generated: {}",
                workload_type,
                config.name,
                serde_json::to_string(&workload).unwrap_or_default()
            );
            cloudlets.extend(workload);
        }

        log_info!(
            self.ctx,
            "broker {} configured with {} vms and {} cloudlets",
            config.name,
            vms.len(),
            cloudlets.len()
        );
        broker.borrow_mut().submit_vm_list(vms);
        broker.borrow_mut().submit_cloudlet_list(cloudlets);
        broker
    }

    pub fn pause_at(&mut self, time: f64) {
        self.user_pause = Some(time);
    }

    pub fn resume(&mut self) {
        self.user_pause = None;
        self.sim.resume();
    }

    /// Runs until the event queue drains, creating deferred brokers when their start time comes.
    pub fn run(&mut self) -> RunState {
        let started = Instant::now();
        let state = loop {
            let deferred = self.deferred_brokers.first().map(|b| b.start_time.unwrap_or(0.));
            let pause = match (deferred, self.user_pause) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            if let Some(time) = pause {
                self.sim.pause_at(time.max(self.sim.time()));
            }

            match self.sim.run() {
                RunState::Paused { time } if deferred.map_or(false, |start| start <= time) => {
                    self.sim.resume();
                    let config = self.deferred_brokers.remove(0);
                    log_info!(self.ctx, "starting deferred broker {}", config.name);
                    self.add_broker_from_config(&config);
                }
                state => break state,
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        log_info!(
            self.ctx,
            "{:?} after {} events in {:.3}s of wall time",
            state,
            self.sim.event_count(),
            elapsed
        );
        state
    }

    pub fn time(&self) -> f64 {
        self.sim.time()
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn simulation(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn datacenters(&self) -> &[Rc<RefCell<Datacenter>>] {
        &self.datacenters
    }

    pub fn brokers(&self) -> &[Rc<RefCell<Broker>>] {
        &self.brokers
    }

    pub fn broker(&self, name: &str) -> Option<Rc<RefCell<Broker>>> {
        self.brokers.iter().find(|b| b.borrow().name() == name).cloned()
    }

    pub fn monitoring(&self) -> Rc<RefCell<Monitoring>> {
        self.monitoring.clone()
    }

    /// Reports of every returned cloudlet, grouped by broker in creation order.
    pub fn cloudlet_reports(&self) -> Vec<CloudletReport> {
        self.brokers.iter().flat_map(|b| b.borrow().reports()).collect()
    }
}
