//! 地址与子网
//!
//! IPv4 地址 + 前缀长度的纯值类型，用于最长前缀（最窄子网）匹配。

use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrParseError {
    #[error("missing '/' in subnet `{0}`")]
    MissingPrefix(String),
    #[error("invalid IPv4 address `{0}`")]
    BadAddress(String),
    #[error("invalid prefix length `{0}`")]
    BadPrefix(String),
    #[error("prefix length {0} out of range [0, 32]")]
    BadPrefixLen(u32),
}

/// IPv4 子网（网络地址 + 前缀长度）。构造时会屏蔽掉主机位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Subnet {
    /// 匹配所有地址的默认路由
    pub const DEFAULT_ROUTE: Subnet = Subnet {
        network: Ipv4Addr::UNSPECIFIED,
        prefix_len: 0,
    };

    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, AddrParseError> {
        if prefix_len > 32 {
            return Err(AddrParseError::BadPrefixLen(prefix_len as u32));
        }
        let network = Ipv4Addr::from(u32::from(addr) & mask(prefix_len));
        Ok(Self {
            network,
            prefix_len,
        })
    }

    /// 单个主机的 /32 子网
    pub fn host(addr: Ipv4Addr) -> Self {
        Self {
            network: addr,
            prefix_len: 32,
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// 地址是否落在本子网内
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let m = mask(self.prefix_len);
        u32::from(addr) & m == u32::from(self.network)
    }

    /// 子网的具体程度：前缀越长越具体
    pub fn specificity(&self) -> u8 {
        self.prefix_len
    }

    /// `self` 是否比 `other` 更具体（更窄）
    pub fn is_narrower_than(&self, other: &Subnet) -> bool {
        self.prefix_len > other.prefix_len
    }
}

fn mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        n => u32::MAX << (32 - n as u32),
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Subnet {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| AddrParseError::MissingPrefix(s.to_string()))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| AddrParseError::BadAddress(addr.to_string()))?;
        let len: u32 = len
            .parse()
            .map_err(|_| AddrParseError::BadPrefix(len.to_string()))?;
        if len > 32 {
            return Err(AddrParseError::BadPrefixLen(len));
        }
        Subnet::new(addr, len as u8)
    }
}

impl Serialize for Subnet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
