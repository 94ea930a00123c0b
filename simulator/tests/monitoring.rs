use cloudlet_sim::config::sim_config::MonitoringConfig;
use cloudlet_sim::monitoring::{Monitoring, ResourceLoad, ResourcePoint, TOTAL};

#[test]
fn test_compressed_load() {
    let mut load = ResourceLoad::new(0., 100.0, Some(10.0));
    load.update(50., 5.);
    load.update(0., 11.);
    load.update(100., 12.);

    let expected = vec![ResourcePoint { value: 0.25, time: 10. }];
    assert_eq!(load.dump(), expected);
}

#[test]
fn test_uncompressed_load_records_every_change() {
    let mut load = ResourceLoad::new(0., 200.0, None);
    load.update(50., 1.);
    load.add(150., 2.);
    assert_eq!(
        load.dump(),
        vec![
            ResourcePoint { value: 0.25, time: 1. },
            ResourcePoint { value: 1., time: 2. },
        ]
    );
}

#[test]
fn test_host_updates_roll_up() {
    let mut monitoring = Monitoring::new(MonitoringConfig::default());
    monitoring.add_host("dc-0", "host-0", 1000., 2048);
    monitoring.add_host("dc-0", "host-1", 1000., 2048);
    monitoring.add_host("dc-1", "host-0", 2000., 4096);

    monitoring.update_host(1., "dc-0", "host-0", 500., 1024);
    monitoring.update_host(2., "dc-1", "host-0", 2000., 0);

    let host = monitoring.points("dc-0/host-0");
    assert_eq!(host.len(), 1);
    assert_eq!(host[0].load.mips, 0.5);
    assert_eq!(host[0].load.ram, 0.5);

    let dc = monitoring.points("dc-0");
    assert_eq!(dc[0].load.mips, 0.25);

    let total = monitoring.points(TOTAL);
    assert_eq!(total.len(), 2);
    assert_eq!(total[1].load.mips, 2500. / 4000.);
    assert!(monitoring.points("dc-2").is_empty());
}
