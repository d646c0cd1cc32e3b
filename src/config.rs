//! 运行配置
//!
//! 可以从 JSON 文件读取，也可以由命令行参数拼装。未给出的字段取默认值。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::{DEFAULT_FALLBACK_BUDGET, DEFAULT_LOOP_MEMORY, DEFAULT_MAX_HOPS, DEFAULT_PKT_BYTES};
use crate::sim::SimTime;
use crate::topo::{TopoOpts, TopologyKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub topology: TopologyKind,
    pub k: usize,
    /// 构建时静态故障的链路比例（0–100）
    pub link_failure_percent: f64,
    pub packets_per_host: u64,
    pub seed: u64,
    pub max_hops: u32,
    pub pkt_bytes: u32,
    pub link_gbps: u64,
    pub link_latency_us: u64,
    /// 每次传输失败的概率（0–1）
    pub drop_prob: f64,
    pub fallback_budget: usize,
    pub loop_memory: usize,
    /// 仿真时间上限（毫秒）；None 表示跑到事件队列为空
    pub until_ms: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            topology: TopologyKind::FatTree,
            k: 4,
            link_failure_percent: 0.0,
            packets_per_host: 10,
            seed: 1,
            max_hops: DEFAULT_MAX_HOPS,
            pkt_bytes: DEFAULT_PKT_BYTES,
            link_gbps: 100,
            link_latency_us: 2,
            drop_prob: 0.0,
            fallback_budget: DEFAULT_FALLBACK_BUDGET,
            loop_memory: DEFAULT_LOOP_MEMORY,
            until_ms: None,
        }
    }
}

impl SimConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn topo_opts(&self) -> TopoOpts {
        TopoOpts {
            k: self.k,
            link_gbps: self.link_gbps,
            link_latency: SimTime::from_micros(self.link_latency_us),
            link_failure_percent: self.link_failure_percent,
            drop_prob: self.drop_prob,
        }
    }

    pub fn horizon(&self) -> Option<SimTime> {
        self.until_ms.map(SimTime::from_millis)
    }
}
