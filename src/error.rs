//! 构建期错误
//!
//! 拓扑构建或配置阶段发现的不变式破坏。这些错误会中止构建，
//! 并带上足够的上下文（拓扑、k、阶段、节点）以便定位。

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::net::{AddrParseError, NodeId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("{topology}: k={k} must be even and >= 2 (stage: {stage})")]
    InvalidK {
        topology: &'static str,
        k: usize,
        stage: &'static str,
    },
    #[error("{topology}: port {port} of `{node}` has no subnet assigned")]
    PortWithoutSubnet {
        topology: String,
        node: String,
        port: usize,
    },
    #[error("`{node}` already uses all {limit} ports")]
    PortLimitExceeded { node: String, limit: usize },
    #[error("{topology}: `{node}` has {actual} of {expected} ports wired")]
    PortsNotFull {
        topology: String,
        node: String,
        expected: usize,
        actual: usize,
    },
    #[error("address {0} is assigned to more than one host")]
    DuplicateAddress(Ipv4Addr),
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("`{node}` has no port towards `{peer}`")]
    NotConnected { node: String, peer: String },
    #[error("link failure percent {0} outside [0, 100]")]
    InvalidFailurePercent(f64),
    #[error("per-transmission drop probability {0} outside [0, 1]")]
    InvalidDropProbability(f64),
    #[error(transparent)]
    Address(#[from] AddrParseError),
}
