//! 单包追踪模式
//!
//! 在 fat-tree 中只发送一个数据包，打印详细的执行流程和最终路径

use clap::Parser;
use fattree_sim::net::{EmitPacket, NetWorld, RoutingPolicy};
use fattree_sim::sim::{SimTime, Simulator};
use fattree_sim::topo::TopoOpts;
use fattree_sim::topo::fat_tree::build_fat_tree;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "trace-single-packet", about = "单包追踪模式：只发送一个数据包，打印详细的执行流程")]
struct Args {
    #[arg(long, default_value_t = 4)]
    k: usize,
    /// 源主机 (pod, edge, host)
    #[arg(long, num_args = 3, value_names = ["POD", "EDGE", "HOST"], default_values_t = [0, 0, 0])]
    src: Vec<usize>,
    /// 目的主机 (pod, edge, host)
    #[arg(long, num_args = 3, value_names = ["POD", "EDGE", "HOST"], default_values_t = [1, 0, 0])]
    dst: Vec<usize>,
    #[arg(long, default_value_t = 16)]
    max_hops: u32,
    /// 构建时静态故障的链路比例（0–100）
    #[arg(long, default_value_t = 0.0)]
    failure_percent: f64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut sim = Simulator::new(args.seed);
    let mut world = NetWorld::default();
    world.net.set_max_hops(args.max_hops);
    world.net.set_policy(RoutingPolicy::default());

    let opts = TopoOpts {
        k: args.k,
        link_failure_percent: args.failure_percent,
        ..TopoOpts::default()
    };
    let topo = match build_fat_tree(&mut sim, &mut world, &opts) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let half = args.k / 2;
    let in_range = |v: &[usize]| v[0] < args.k && v[1] < half && v[2] < half;
    if !in_range(&args.src) || !in_range(&args.dst) {
        eprintln!("error: host index out of range for k={}", args.k);
        std::process::exit(1);
    }
    let src = topo.host(args.src[0], args.src[1], args.src[2]);
    let dst = topo.host(args.dst[0], args.dst[1], args.dst[2]);
    let Some(dst_addr) = world.net.host(dst).map(|h| h.addr()) else {
        eprintln!("error: destination is not a host");
        std::process::exit(1);
    };

    info!("╔════════════════════════════════════════════════════════════════════════════════╗");
    info!("║                    单包追踪模式启动                                            ║");
    info!("╚════════════════════════════════════════════════════════════════════════════════╝");
    debug!(src = ?src, dst = ?dst, dst_addr = %dst_addr, failed_links = ?topo.failed_links, "路径端点");

    sim.schedule_in(SimTime::ZERO, EmitPacket { host: src, dst: dst_addr });
    sim.run(&mut world);

    for r in world.net.records() {
        let path: Vec<String> = r
            .path
            .iter()
            .filter_map(|&n| world.net.node(n).map(|node| node.name().to_string()))
            .collect();
        println!(
            "pkt {} {} -> {}: {:?} hops={} loss_marks={} path=[{}]",
            r.id,
            r.src,
            r.dst,
            r.status,
            r.hops,
            r.loss_marks,
            path.join(" -> ")
        );
    }
    println!("done @ {:?}", sim.now());
}
