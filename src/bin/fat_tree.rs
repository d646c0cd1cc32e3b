//! 单次运行：构建拓扑、每台主机发包、打印汇总

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fattree_sim::config::SimConfig;
use fattree_sim::scenario;
use fattree_sim::topo::TopologyKind;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fat_tree", about = "Fat-tree 数据中心网络离散事件仿真：单次运行")]
struct Args {
    /// JSON 配置文件；命令行参数会覆盖其中的字段
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    topology: Option<TopologyKind>,
    /// 每台交换机端口数（偶数）
    #[arg(long)]
    k: Option<usize>,
    /// 构建时静态故障的链路比例（0–100）
    #[arg(long)]
    failure_percent: Option<f64>,
    /// 每次传输失败的概率（0–1）
    #[arg(long)]
    drop_prob: Option<f64>,
    #[arg(long)]
    packets_per_host: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_hops: Option<u32>,
    #[arg(long)]
    fallback_budget: Option<usize>,
    #[arg(long)]
    until_ms: Option<u64>,
    /// 以 JSON 输出汇总
    #[arg(long, default_value_t = false)]
    json: bool,
    /// 与 --json 一起使用时附带逐包记录和链路负载
    #[arg(long, default_value_t = false)]
    full: bool,
}

impl Args {
    fn to_config(&self) -> Result<SimConfig, fattree_sim::config::ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::default(),
        };
        if let Some(v) = self.topology {
            cfg.topology = v;
        }
        if let Some(v) = self.k {
            cfg.k = v;
        }
        if let Some(v) = self.failure_percent {
            cfg.link_failure_percent = v;
        }
        if let Some(v) = self.drop_prob {
            cfg.drop_prob = v;
        }
        if let Some(v) = self.packets_per_host {
            cfg.packets_per_host = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.max_hops {
            cfg.max_hops = v;
        }
        if let Some(v) = self.fallback_budget {
            cfg.fallback_budget = v;
        }
        if self.until_ms.is_some() {
            cfg.until_ms = self.until_ms;
        }
        Ok(cfg)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    let cfg = match args.to_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(?cfg, "运行配置");

    let report = match scenario::run(&cfg) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        let out = if args.full {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string_pretty(&report.summary)
        };
        match out {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!(
            "done @ {:?}, events={}, {}",
            report.final_time,
            report.events,
            report.summary.one_line()
        );
    }
    ExitCode::SUCCESS
}
