//! 链路故障率扫描：每个故障比例独立构建一次场景并输出一行汇总

use std::process::ExitCode;

use clap::Parser;
use fattree_sim::config::SimConfig;
use fattree_sim::scenario::Scenario;
use fattree_sim::topo::TopologyKind;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "failure_sweep", about = "按链路故障比例扫描投递率")]
struct Args {
    #[arg(long, value_enum, default_value_t = TopologyKind::FatTree)]
    topology: TopologyKind,
    #[arg(long, default_value_t = 4)]
    k: usize,
    /// 起始故障比例（0–100）
    #[arg(long, default_value_t = 0.0)]
    from: f64,
    #[arg(long, default_value_t = 20.0)]
    to: f64,
    #[arg(long, default_value_t = 5.0)]
    step: f64,
    #[arg(long, default_value_t = 10)]
    packets_per_host: u64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    if args.step <= 0.0 || args.from > args.to {
        eprintln!("error: need step > 0 and from <= to");
        return ExitCode::FAILURE;
    }

    let mut percent = args.from;
    while percent <= args.to + f64::EPSILON {
        let cfg = SimConfig {
            topology: args.topology,
            k: args.k,
            link_failure_percent: percent.min(100.0),
            packets_per_host: args.packets_per_host,
            seed: args.seed,
            ..SimConfig::default()
        };
        let mut scenario = match Scenario::build(&cfg) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        };
        scenario.seed_traffic();
        scenario.run();
        let summary = scenario.summary();
        info!(percent, delivered = summary.delivered, "扫描点完成");

        if args.json {
            let row = serde_json::json!({ "link_failure_percent": percent, "summary": summary });
            println!("{row}");
        } else {
            println!("failure={percent:>6.2}% {}", summary.one_line());
        }
        percent += args.step;
    }
    ExitCode::SUCCESS
}
