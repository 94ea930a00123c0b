//! Time-weighted utilization of hosts, datacenters and the whole simulated cloud.
//!
//! Loads are recorded as fractions of capacity. With a compression interval the points
//! are averages over consecutive windows, otherwise every change produces a point.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::sim_config::MonitoringConfig;

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct LoadState {
    pub mips: f64,
    pub ram: f64,
}

impl LoadState {
    pub fn diff(&self, other: &LoadState) -> LoadState {
        LoadState {
            mips: self.mips - other.mips,
            ram: self.ram - other.ram,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct MonitoringPoint {
    pub time: f64,
    pub load: LoadState,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ResourcePoint {
    pub value: f64,
    pub time: f64,
}

/// Load of a single resource with known capacity.
#[derive(Clone, Serialize, Debug)]
pub struct ResourceLoad {
    capacity: f64,
    accumulated: f64,
    current: f64,
    current_since: f64,
    window_start: f64,
    compression_time_interval: Option<f64>,
    points: Vec<ResourcePoint>,
}

impl ResourceLoad {
    pub fn new(start_time: f64, capacity: f64, compression_time_interval: Option<f64>) -> Self {
        Self {
            capacity,
            accumulated: 0.,
            current: 0.,
            current_since: start_time,
            window_start: start_time,
            compression_time_interval,
            points: Vec::new(),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Sets the absolute used amount at `time` and returns the previous one.
    pub fn update(&mut self, value: f64, time: f64) -> f64 {
        let previous = self.current;
        match self.compression_time_interval {
            Some(interval) => {
                while time - self.window_start > interval {
                    let window_end = self.window_start + interval;
                    let average = self.close_window(window_end);
                    self.points.push(ResourcePoint {
                        value: average,
                        time: window_end,
                    });
                }
                if time > self.current_since {
                    self.accumulated += self.current * (time - self.current_since);
                    self.current_since = time;
                }
            }
            None => self.points.push(ResourcePoint {
                value: self.fraction(value),
                time,
            }),
        }
        self.current = value;
        previous
    }

    pub fn add(&mut self, delta: f64, time: f64) {
        self.update(self.current + delta, time);
    }

    fn close_window(&mut self, time: f64) -> f64 {
        self.accumulated += self.current * (time - self.current_since);
        let average = self.fraction(self.accumulated / (time - self.window_start));
        self.window_start = time;
        self.current_since = time;
        self.accumulated = 0.;
        average
    }

    fn fraction(&self, value: f64) -> f64 {
        if self.capacity > 0. {
            value / self.capacity
        } else {
            0.
        }
    }

    pub fn extend(&mut self, amount: f64) {
        self.capacity += amount;
    }

    pub fn dump(&mut self) -> Vec<ResourcePoint> {
        std::mem::take(&mut self.points)
    }
}

#[derive(Clone, Serialize, Debug)]
pub struct LoadInfo {
    pub mips: ResourceLoad,
    pub ram: ResourceLoad,
}

impl LoadInfo {
    pub fn new(start_time: f64, mips: f64, ram: f64, compression_time_interval: Option<f64>) -> Self {
        Self {
            mips: ResourceLoad::new(start_time, mips, compression_time_interval),
            ram: ResourceLoad::new(start_time, ram, compression_time_interval),
        }
    }

    pub fn extend(&mut self, other: &Self) {
        self.mips.extend(other.mips.capacity());
        self.ram.extend(other.ram.capacity());
    }

    pub fn update(&mut self, state: LoadState, time: f64) -> LoadState {
        LoadState {
            mips: self.mips.update(state.mips, time),
            ram: self.ram.update(state.ram, time),
        }
    }

    pub fn add(&mut self, delta: LoadState, time: f64) {
        self.mips.add(delta.mips, time);
        self.ram.add(delta.ram, time);
    }

    pub fn dump(&mut self) -> Vec<MonitoringPoint> {
        let mips = self.mips.dump();
        let ram = self.ram.dump();
        assert_eq!(mips.len(), ram.len());
        mips.into_iter()
            .zip(ram)
            .map(|(m, r)| MonitoringPoint {
                time: m.time,
                load: LoadState {
                    mips: m.value,
                    ram: r.value,
                },
            })
            .collect()
    }
}

pub const TOTAL: &str = "TOTAL";

/// Collects load points keyed by host (`datacenter/host`), datacenter and [`TOTAL`].
pub struct Monitoring {
    hosts: HashMap<String, LoadInfo>,
    datacenters: HashMap<String, LoadInfo>,
    total: LoadInfo,
    compression_time_interval: Option<f64>,
    history: HashMap<String, Vec<MonitoringPoint>>,
}

impl Monitoring {
    pub fn new(config: MonitoringConfig) -> Self {
        let compression_time_interval = config.host_load_compression_time_interval;
        Self {
            hosts: HashMap::new(),
            datacenters: HashMap::new(),
            total: LoadInfo::new(0., 0., 0., compression_time_interval),
            compression_time_interval,
            history: HashMap::new(),
        }
    }

    pub fn add_host(&mut self, datacenter: &str, host: &str, mips: f64, ram: u64) {
        let info = LoadInfo::new(0., mips, ram as f64, self.compression_time_interval);
        self.datacenters
            .entry(datacenter.to_string())
            .or_insert_with(|| LoadInfo::new(0., 0., 0., self.compression_time_interval))
            .extend(&info);
        self.total.extend(&info);
        self.hosts.insert(host_key(datacenter, host), info);
    }

    /// Records the absolute MIPS and RAM allocated on a host at `time`.
    pub fn update_host(&mut self, time: f64, datacenter: &str, host: &str, mips: f64, ram: u64) {
        let key = host_key(datacenter, host);
        let Some(info) = self.hosts.get_mut(&key) else {
            log::warn!("monitoring: unknown host {}", key);
            return;
        };
        let state = LoadState { mips, ram: ram as f64 };
        let delta = state.diff(&info.update(state, time));
        let host_points = info.dump();
        self.history.entry(key).or_default().extend(host_points);

        if let Some(dc) = self.datacenters.get_mut(datacenter) {
            dc.add(delta, time);
            let points = dc.dump();
            self.history.entry(datacenter.to_string()).or_default().extend(points);
        }

        self.total.add(delta, time);
        let points = self.total.dump();
        self.history.entry(TOTAL.to_string()).or_default().extend(points);
    }

    /// Points recorded so far for a host key, a datacenter name or [`TOTAL`].
    pub fn points(&self, name: &str) -> &[MonitoringPoint] {
        self.history.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn current_load(&self, datacenter: &str, host: &str) -> Option<LoadState> {
        self.hosts.get(&host_key(datacenter, host)).map(|info| LoadState {
            mips: info.mips.current(),
            ram: info.ram.current(),
        })
    }
}

pub fn host_key(datacenter: &str, host: &str) -> String {
    format!("{}/{}", datacenter, host)
}
