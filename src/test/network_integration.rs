use crate::config::SimConfig;
use crate::net::{
    DeliverPacket, DropReason, EmitPacket, LossCause, NetWorld, NodeId, PacketStatus, PortIdx,
};
use crate::scenario::{self, Scenario};
use crate::sim::{SimTime, Simulator};
use crate::topo::fat_tree::build_fat_tree;
use crate::topo::simple_star::build_simple_star;
use crate::topo::{TopoOpts, Topology};
use std::collections::HashSet;
use std::net::Ipv4Addr;

fn fat_tree_world(k: usize, seed: u64, max_hops: u32) -> (Simulator, NetWorld, Topology) {
    let mut sim = Simulator::new(seed);
    let mut world = NetWorld::default();
    world.net.set_max_hops(max_hops);
    let opts = TopoOpts {
        k,
        ..TopoOpts::default()
    };
    let topo = build_fat_tree(&mut sim, &mut world, &opts).expect("build fat-tree");
    (sim, world, topo)
}

fn addr_of(world: &NetWorld, host: NodeId) -> Ipv4Addr {
    world.net.host(host).expect("host").addr()
}

fn send(sim: &mut Simulator, host: NodeId, dst: Ipv4Addr) {
    sim.schedule_in(SimTime::ZERO, EmitPacket { host, dst });
}

#[test]
fn cross_pod_packet_is_delivered_in_six_hops() {
    let (mut sim, mut world, topo) = fat_tree_world(4, 1, 16);
    let src = topo.host(0, 0, 0);
    let dst = topo.host(1, 0, 0);
    send(&mut sim, src, addr_of(&world, dst));
    sim.run(&mut world);

    let records = world.net.records();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.status, PacketStatus::Delivered);
    assert_eq!(r.hops, 6);
    assert_eq!(r.loss_marks, 0);
    assert_eq!(r.path[0], src);
    assert_eq!(r.path[1], topo.edge(0, 0));
    assert!(topo.agg_switches.contains(&r.path[2]));
    assert!(topo.core_switches.contains(&r.path[3]));
    assert!(topo.agg_switches.contains(&r.path[4]));
    assert_eq!(r.path[5], topo.edge(1, 0));
    assert!(r.finished_at.expect("finished") > r.created_at);

    let arrivals = world.net.host(dst).expect("host").arrivals();
    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].src, addr_of(&world, src));
    assert_eq!(arrivals[0].hops, 6);

    let carried: u64 = world.net.links().iter().map(|l| l.load.packets).sum();
    assert_eq!(carried, 6);
}

#[test]
fn same_edge_and_same_pod_paths_are_shorter() {
    let (mut sim, mut world, topo) = fat_tree_world(4, 1, 16);
    let src = topo.host(2, 1, 0);
    send(&mut sim, src, addr_of(&world, topo.host(2, 1, 1)));
    send(&mut sim, src, addr_of(&world, topo.host(2, 0, 1)));
    sim.run(&mut world);

    let mut hops: Vec<u32> = world.net.records().iter().map(|r| r.hops).collect();
    hops.sort();
    assert_eq!(hops, vec![2, 4]);
    assert!(
        world
            .net
            .records()
            .iter()
            .all(|r| r.status == PacketStatus::Delivered)
    );
}

#[test]
fn down_agg_core_link_is_routed_around() {
    let (mut sim, mut world, topo) = fat_tree_world(4, 9, 16);
    let link = world
        .net
        .link_between(topo.agg(0, 0), topo.core(0, 0))
        .expect("agg-core link");
    world.net.link_mut(link).expect("link").fail();

    let src = topo.host(0, 0, 0);
    let dst = addr_of(&world, topo.host(1, 0, 0));
    for _ in 0..64 {
        send(&mut sim, src, dst);
    }
    sim.run(&mut world);

    let records = world.net.records();
    assert_eq!(records.len(), 64);
    for r in records {
        assert_eq!(r.status, PacketStatus::Delivered, "pkt {} was not delivered", r.id);
        assert_eq!(r.hops, 6);
        assert!(!r.links.contains(&link));
    }
    assert!(records.iter().any(|r| r.loss_marks > 0));
    assert_eq!(world.net.link(link).expect("link").load.packets, 0);
}

#[test]
fn down_agg_edge_link_is_recovered_via_fallback() {
    let (mut sim, mut world, topo) = fat_tree_world(4, 5, 16);
    let link = world
        .net
        .link_between(topo.agg(1, 0), topo.edge(1, 0))
        .expect("agg-edge link");
    world.net.link_mut(link).expect("link").fail();

    let src = topo.host(0, 0, 0);
    let dst = addr_of(&world, topo.host(1, 0, 0));
    for _ in 0..64 {
        send(&mut sim, src, dst);
    }
    sim.run(&mut world);

    let records = world.net.records();
    assert_eq!(records.len(), 64);
    for r in records {
        assert_eq!(r.status, PacketStatus::Delivered, "pkt {} was not delivered", r.id);
        assert!(r.hops == 6 || r.hops == 8, "pkt {} took {} hops", r.id, r.hops);
        assert!(!r.links.contains(&link));
    }
    assert!(
        !records
            .iter()
            .any(|r| matches!(r.status, PacketStatus::Dropped(_)))
    );
    // 经过 agg(1,0) 的包横向绕到 edge(1,1)
    let detoured: Vec<_> = records.iter().filter(|r| r.loss_marks > 0).collect();
    assert!(!detoured.is_empty());
    for r in detoured {
        assert_eq!(r.hops, 8);
        assert!(r.path.contains(&topo.edge(1, 1)));
    }
    assert_eq!(world.net.link(link).expect("link").load.packets, 0);
}

#[test]
fn tight_hop_limit_drops_cross_pod_packet() {
    let (mut sim, mut world, topo) = fat_tree_world(4, 1, 3);
    send(&mut sim, topo.host(0, 0, 0), addr_of(&world, topo.host(3, 1, 1)));
    sim.run(&mut world);

    let r = &world.net.records()[0];
    assert_eq!(r.status, PacketStatus::Dropped(DropReason::HopLimit));
    assert_eq!(r.hops, 3);
    assert!(topo.core_switches.contains(&r.path[2]) || topo.agg_switches.contains(&r.path[2]));
    assert_eq!(world.net.stats.dropped, 1);
}

#[test]
fn misaddressed_packet_is_dropped_by_receiving_host() {
    let (mut sim, mut world, topo) = fat_tree_world(4, 1, 16);
    let host = topo.host(0, 0, 0);
    let sender = topo.host(1, 0, 0);
    let src = addr_of(&world, sender);
    let dst = addr_of(&world, topo.host(2, 0, 0));
    let pkt = world.net.make_packet(sender, src, dst, SimTime::ZERO);
    sim.schedule_in(
        SimTime::ZERO,
        DeliverPacket {
            to: host,
            ingress: PortIdx(0),
            pkt,
        },
    );
    sim.run(&mut world);

    assert_eq!(
        world.net.records()[0].status,
        PacketStatus::Dropped(DropReason::Misdelivered)
    );
    assert!(world.net.host(host).expect("host").arrivals().is_empty());
}

#[test]
fn healthy_fabric_delivers_everything() {
    let cfg = SimConfig {
        k: 4,
        packets_per_host: 10,
        ..SimConfig::default()
    };
    let report = scenario::run(&cfg).expect("run");
    let s = &report.summary;

    assert_eq!(s.total_packets, 160);
    assert_eq!(s.delivered, 160);
    assert_eq!(s.lost + s.dropped + s.in_flight, 0);
    assert_eq!(s.percent_lost, 0.0);
    assert_eq!(s.loss_marks, 0);
    assert!(s.min_path_len >= 2);
    assert!(s.max_path_len <= 6);
    assert_eq!(s.num_hosts, 16);
    assert_eq!(s.num_switches, 20);
    assert_eq!(s.num_links, 48);
}

#[test]
fn hop_bound_and_conservation_hold_under_failures() {
    let cfg = SimConfig {
        k: 4,
        link_failure_percent: 30.0,
        max_hops: 8,
        packets_per_host: 20,
        seed: 3,
        ..SimConfig::default()
    };
    let report = scenario::run(&cfg).expect("run");
    let s = &report.summary;

    assert_eq!(s.delivered + s.lost + s.dropped, s.total_packets);
    assert_eq!(s.in_flight, 0);
    assert_eq!(report.records.len() as u64, s.total_packets);
    for r in &report.records {
        assert!(r.status.is_terminal());
        assert!(r.hops <= 8, "pkt {} took {} hops", r.id, r.hops);
        assert_eq!(r.path.len(), r.hops as usize);
    }
}

#[test]
fn packet_never_leaves_the_same_port_twice() {
    let cfg = SimConfig {
        k: 6,
        link_failure_percent: 25.0,
        packets_per_host: 10,
        seed: 21,
        ..SimConfig::default()
    };
    let report = scenario::run(&cfg).expect("run");
    for r in &report.records {
        let mut seen = HashSet::new();
        for hop in r.path.iter().zip(&r.links) {
            assert!(seen.insert(hop), "pkt {} reused port {:?}", r.id, hop);
        }
    }
}

#[test]
fn same_seed_reproduces_the_run() {
    let cfg = SimConfig {
        k: 4,
        link_failure_percent: 15.0,
        packets_per_host: 15,
        seed: 77,
        ..SimConfig::default()
    };
    let a = scenario::run(&cfg).expect("run");
    let b = scenario::run(&cfg).expect("run");
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.records, b.records);
    assert_eq!(a.link_loads, b.link_loads);
    assert_eq!(a.final_time, b.final_time);
}

#[test]
fn certain_link_failure_loses_every_packet() {
    let cfg = SimConfig {
        k: 4,
        drop_prob: 1.0,
        packets_per_host: 3,
        ..SimConfig::default()
    };
    let report = scenario::run(&cfg).expect("run");
    assert_eq!(report.summary.lost, report.summary.total_packets);
    assert!(
        report
            .records
            .iter()
            .all(|r| r.status == PacketStatus::Lost(LossCause::LinkFailure) && r.hops == 1)
    );
}

#[test]
fn horizon_leaves_packets_in_flight() {
    let cfg = SimConfig {
        k: 4,
        packets_per_host: 5,
        until_ms: Some(0),
        ..SimConfig::default()
    };
    let mut scenario = Scenario::build(&cfg).expect("build");
    assert_eq!(scenario.seed_traffic(), 80);
    scenario.run();

    let s = scenario.summary();
    assert_eq!(s.total_packets, 16);
    assert_eq!(s.delivered, 0);
    assert_eq!(s.in_flight, 16);
    assert_eq!(s.percent_lost, 100.0);
    assert_eq!(scenario.sim.now(), SimTime::ZERO);

    let report = scenario.into_report();
    assert_eq!(report.records.len(), 16);
    assert!(report.records.iter().all(|r| r.status == PacketStatus::InFlight));
    assert!(report.records.iter().all(|r| r.finished_at.is_none()));
    let ids: HashSet<u64> = report.records.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 16);
}

#[test]
fn completed_run_reports_only_terminal_records() {
    let cfg = SimConfig {
        k: 4,
        packets_per_host: 3,
        ..SimConfig::default()
    };
    let mut scenario = Scenario::build(&cfg).expect("build");
    scenario.seed_traffic();
    scenario.run();
    assert_eq!(scenario.world.net.in_flight_records().count(), 0);

    let report = scenario.into_report();
    assert_eq!(report.records.len(), 48);
    assert!(report.records.iter().all(|r| r.status.is_terminal()));
}

#[test]
fn hosts_send_exactly_their_budget() {
    let cfg = SimConfig {
        k: 4,
        packets_per_host: 7,
        ..SimConfig::default()
    };
    let mut scenario = Scenario::build(&cfg).expect("build");
    scenario.seed_traffic();
    scenario.run();

    for &h in &scenario.topo.hosts {
        assert_eq!(scenario.world.net.host(h).expect("host").sent(), 7);
    }
    let received: usize = scenario
        .topo
        .hosts
        .iter()
        .map(|&h| scenario.world.net.host(h).expect("host").arrivals().len())
        .sum();
    assert_eq!(received, 16 * 7);
}

#[test]
fn simple_star_crosses_the_core() {
    let mut sim = Simulator::new(1);
    let mut world = NetWorld::default();
    let topo = build_simple_star(&mut sim, &mut world, &TopoOpts::default()).expect("build");

    let h1 = topo.hosts[0];
    send(&mut sim, h1, Ipv4Addr::new(10, 1, 1, 2));
    send(&mut sim, h1, Ipv4Addr::new(10, 2, 1, 2));
    sim.run(&mut world);

    let mut hops: Vec<u32> = world.net.records().iter().map(|r| r.hops).collect();
    hops.sort();
    assert_eq!(hops, vec![2, 4]);
}
