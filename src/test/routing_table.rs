use crate::net::{
    Candidate, DropReason, Egress, ForwardingTable, Hop, LinkId, LossCause, NodeId, Packet, Port,
    PortIdx, RoutingPolicy, Subnet, select_egress,
};
use crate::sim::SimTime;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::net::Ipv4Addr;

fn ports_with(subnets: &[&str]) -> Vec<Port> {
    subnets
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut p = Port::new(LinkId(i), NodeId(100 + i), 64);
            p.subnet = Some(s.parse().expect("subnet"));
            p
        })
        .collect()
}

fn pkt_to(id: u64, dst: Ipv4Addr) -> Packet {
    Packet::new(
        id,
        NodeId(0),
        Ipv4Addr::new(10, 9, 9, 9),
        dst,
        1500,
        16,
        SimTime::ZERO,
    )
}

fn never_down(_: LinkId) -> bool {
    false
}

#[test]
fn lookup_picks_narrowest_matching_subnet() {
    let ports = ports_with(&["0.0.0.0/0", "10.1.0.0/16", "10.1.2.0/24", "10.1.2.3/32"]);
    let table = ForwardingTable::from_ports(&ports);
    assert_eq!(table.len(), 4);

    let (s, ps) = table.lookup(Ipv4Addr::new(10, 1, 2, 3)).expect("match");
    assert_eq!(s.prefix_len(), 32);
    assert_eq!(ps, &[PortIdx(3)]);

    let (s, ps) = table.lookup(Ipv4Addr::new(10, 1, 2, 9)).expect("match");
    assert_eq!(s.prefix_len(), 24);
    assert_eq!(ps, &[PortIdx(2)]);

    let (s, _) = table.lookup(Ipv4Addr::new(10, 1, 9, 9)).expect("match");
    assert_eq!(s.prefix_len(), 16);

    let (s, ps) = table.lookup(Ipv4Addr::new(8, 8, 8, 8)).expect("match");
    assert_eq!(s, Subnet::DEFAULT_ROUTE);
    assert_eq!(ps, &[PortIdx(0)]);
}

#[test]
fn ports_sharing_a_subnet_form_one_ecmp_group() {
    let ports = ports_with(&["10.0.0.2/32", "0.0.0.0/0", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    assert_eq!(table.len(), 2);

    let (_, ps) = table.lookup(Ipv4Addr::new(10, 3, 0, 2)).expect("match");
    assert_eq!(ps, &[PortIdx(1), PortIdx(2)]);
}

#[test]
fn ports_without_subnet_are_not_routable() {
    let mut ports = ports_with(&["10.1.0.0/16"]);
    ports.push(Port::new(LinkId(9), NodeId(9), 64));
    let table = ForwardingTable::from_ports(&ports);
    assert_eq!(table.len(), 1);
    assert!(table.lookup(Ipv4Addr::new(10, 2, 0, 1)).is_none());
}

#[test]
fn plan_orders_fallback_by_specificity_and_puts_ingress_last() {
    let ports = ports_with(&["0.0.0.0/0", "10.1.0.0/16", "10.1.2.0/24", "10.1.2.3/32"]);
    let table = ForwardingTable::from_ports(&ports);
    let dst = Ipv4Addr::new(10, 1, 2, 9);

    let plan = table.plan(dst, None);
    assert_eq!(plan.preferred, vec![PortIdx(2)]);
    // /16，然后默认路由；不含 dst 的 /32 不参与回退
    assert_eq!(plan.fallback, vec![PortIdx(1), PortIdx(0)]);

    let plan = table.plan(dst, Some(PortIdx(1)));
    assert_eq!(plan.preferred, vec![PortIdx(2)]);
    assert_eq!(plan.fallback, vec![PortIdx(0), PortIdx(1)]);
}

#[test]
fn plan_tries_sideways_ports_before_default_route() {
    // 汇聚交换机：两个下行 /24，两个上行 /0
    let ports = ports_with(&["10.1.0.0/24", "10.1.1.0/24", "0.0.0.0/0", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);

    let plan = table.plan(Ipv4Addr::new(10, 1, 0, 2), Some(PortIdx(2)));
    assert_eq!(plan.preferred, vec![PortIdx(0)]);
    assert_eq!(plan.fallback, vec![PortIdx(1), PortIdx(3), PortIdx(2)]);
}

#[test]
fn plan_skips_other_hosts_routes() {
    // 接入交换机：两个主机 /32，一个上行 /0，上行作为入端口
    let ports = ports_with(&["10.0.0.2/32", "10.0.0.3/32", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);

    let plan = table.plan(Ipv4Addr::new(10, 0, 0, 2), Some(PortIdx(2)));
    assert_eq!(plan.preferred, vec![PortIdx(0)]);
    assert_eq!(plan.fallback, vec![PortIdx(2)]);

    // 从主机端口进入、目的在别处：主机端口不回弹
    let plan = table.plan(Ipv4Addr::new(10, 3, 0, 2), Some(PortIdx(0)));
    assert_eq!(plan.preferred, vec![PortIdx(2)]);
    assert!(plan.fallback.is_empty());
}

#[test]
fn down_host_port_bounces_back_instead_of_reaching_another_host() {
    let ports = ports_with(&["10.0.0.2/32", "10.0.0.3/32", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(1);

    let mut pkt = pkt_to(1, Ipv4Addr::new(10, 0, 0, 2));
    let egress = select_egress(
        &table,
        &ports,
        |l| l == LinkId(0),
        &mut pkt,
        Some(PortIdx(2)),
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Forward(Candidate::Fallback(PortIdx(2))));
    assert_eq!(pkt.loss_marks, 1);
}

#[test]
fn fallback_prefers_peers_not_yet_on_the_path() {
    // 两个横向 /24 端口，p2 原本排在前面，但其对端已在路径上
    let ports = ports_with(&["10.1.0.0/24", "10.1.1.0/24", "10.1.2.0/24", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(1);

    let mut pkt = pkt_to(1, Ipv4Addr::new(10, 1, 0, 2));
    pkt.record_hop(Hop {
        node: ports[2].peer,
        port: PortIdx(0),
        link: LinkId(50),
    });
    let egress = select_egress(
        &table,
        &ports,
        |l| l == LinkId(0),
        &mut pkt,
        None,
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Forward(Candidate::Fallback(PortIdx(1))));
    assert_eq!(pkt.loss_marks, 1);
}

#[test]
fn ingress_port_is_never_preferred() {
    let ports = ports_with(&["0.0.0.0/0", "0.0.0.0/0", "10.0.0.2/32"]);
    let table = ForwardingTable::from_ports(&ports);

    let plan = table.plan(Ipv4Addr::new(10, 1, 0, 2), Some(PortIdx(0)));
    assert_eq!(plan.preferred, vec![PortIdx(1)]);
    assert_eq!(plan.fallback.last(), Some(&PortIdx(0)));
}

#[test]
fn ecmp_choice_is_roughly_uniform() {
    let ports = ports_with(&["0.0.0.0/0", "0.0.0.0/0", "0.0.0.0/0", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(7);
    let dst = Ipv4Addr::new(10, 3, 1, 2);

    let trials = 10_000u64;
    let mut counts = [0u64; 4];
    for id in 0..trials {
        let mut pkt = pkt_to(id, dst);
        let egress = select_egress(
            &table,
            &ports,
            never_down,
            &mut pkt,
            None,
            RoutingPolicy::default(),
            &mut rng,
        );
        let Egress::Forward(Candidate::Preferred(p)) = egress else {
            panic!("expected a preferred port, got {egress:?}");
        };
        counts[p.0] += 1;
        assert_eq!(pkt.loss_marks, 0);
    }

    let expected = trials / 4;
    for (port, &c) in counts.iter().enumerate() {
        assert!(
            c.abs_diff(expected) < expected / 10,
            "port {port} chosen {c} times, expected about {expected}"
        );
    }
}

#[test]
fn loop_memory_hit_marks_loss_and_falls_back() {
    let mut ports = ports_with(&["10.1.0.0/16", "0.0.0.0/0"]);
    ports[0].loop_memory.remember(5);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(1);

    let mut pkt = pkt_to(5, Ipv4Addr::new(10, 1, 0, 2));
    let egress = select_egress(
        &table,
        &ports,
        never_down,
        &mut pkt,
        None,
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Forward(Candidate::Fallback(PortIdx(1))));
    assert_eq!(pkt.loss_marks, 1);

    // 其他数据包不受影响
    let mut other = pkt_to(6, Ipv4Addr::new(10, 1, 0, 2));
    let egress = select_egress(
        &table,
        &ports,
        never_down,
        &mut other,
        None,
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Forward(Candidate::Preferred(PortIdx(0))));
    assert_eq!(other.loss_marks, 0);
}

#[test]
fn down_link_on_preferred_port_recovers_through_ecmp_peer() {
    let ports = ports_with(&["0.0.0.0/0", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(3);

    let mut marked = 0;
    for id in 0..64 {
        let mut pkt = pkt_to(id, Ipv4Addr::new(10, 2, 0, 2));
        let egress = select_egress(
            &table,
            &ports,
            |l| l == LinkId(0),
            &mut pkt,
            None,
            RoutingPolicy::default(),
            &mut rng,
        );
        assert_eq!(egress, Egress::Forward(Candidate::Preferred(PortIdx(1))));
        marked += pkt.loss_marks;
    }
    assert!(marked > 0, "the down port should have been drawn at least once");
}

#[test]
fn exhausting_candidates_on_loops_drops_the_packet() {
    let mut ports = ports_with(&["0.0.0.0/0", "10.0.0.0/8"]);
    for p in &mut ports {
        p.loop_memory.remember(9);
    }
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(1);

    let mut pkt = pkt_to(9, Ipv4Addr::new(10, 1, 1, 1));
    let egress = select_egress(
        &table,
        &ports,
        never_down,
        &mut pkt,
        None,
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Dropped(DropReason::FallbackExhausted));
    assert_eq!(pkt.loss_marks, 2);
}

#[test]
fn all_links_down_reports_link_down_loss() {
    let ports = ports_with(&["0.0.0.0/0", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(1);

    let mut pkt = pkt_to(1, Ipv4Addr::new(10, 1, 1, 1));
    let egress = select_egress(
        &table,
        &ports,
        |_| true,
        &mut pkt,
        None,
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Lost(LossCause::LinkDown));
    assert_eq!(pkt.loss_marks, 2);
}

#[test]
fn fallback_budget_caps_attempts_per_hop() {
    let ports = ports_with(&["0.0.0.0/0", "0.0.0.0/0", "0.0.0.0/0", "0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(1);
    let policy = RoutingPolicy { fallback_budget: 1 };

    let mut pkt = pkt_to(1, Ipv4Addr::new(10, 1, 1, 1));
    let egress = select_egress(&table, &ports, |_| true, &mut pkt, None, policy, &mut rng);
    assert_eq!(egress, Egress::Lost(LossCause::LinkDown));
    assert_eq!(pkt.loss_marks, 2);
}

#[test]
fn hop_limit_is_checked_before_lookup() {
    let ports = ports_with(&["0.0.0.0/0"]);
    let table = ForwardingTable::from_ports(&ports);
    let mut rng = Pcg64::seed_from_u64(1);

    let mut pkt = pkt_to(1, Ipv4Addr::new(10, 1, 1, 1));
    pkt.hops = pkt.max_hops;
    let egress = select_egress(
        &table,
        &ports,
        never_down,
        &mut pkt,
        None,
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Dropped(DropReason::HopLimit));
    assert_eq!(pkt.loss_marks, 0);
}

#[test]
fn empty_table_has_no_route() {
    let table = ForwardingTable::default();
    let mut rng = Pcg64::seed_from_u64(1);

    let mut pkt = pkt_to(1, Ipv4Addr::new(10, 1, 1, 1));
    let egress = select_egress(
        &table,
        &[],
        never_down,
        &mut pkt,
        None,
        RoutingPolicy::default(),
        &mut rng,
    );
    assert_eq!(egress, Egress::Dropped(DropReason::NoRoute));
}
