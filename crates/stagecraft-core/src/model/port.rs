//! ポート定義

use serde::{Deserialize, Serialize};
use std::fmt;

/// ポート範囲（単一ポートは start == end）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn len(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    fn parse(s: &str) -> Result<Self, String> {
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (parse_port(start)?, parse_port(end)?),
            None => {
                let port = parse_port(s)?;
                (port, port)
            }
        };
        if start > end {
            return Err(format!("範囲の開始が終了より大きいです: {}", s));
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

fn parse_port(s: &str) -> Result<u16, String> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| format!("ポート番号ではありません: '{}'", s))?;
    if !(1..=65535).contains(&value) {
        return Err(format!("ポート番号は 1〜65535 です: {}", value));
    }
    Ok(value as u16)
}

/// `host:container` 形式のポートマッピング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host: PortRange,
    pub container: PortRange,
}

impl PortMapping {
    pub fn new(host: u16, container: u16) -> Self {
        Self {
            host: PortRange::single(host),
            container: PortRange::single(container),
        }
    }

    /// `8080:80` / `9000-9010:9000-9010` をパース
    pub fn parse(s: &str) -> Result<Self, String> {
        let (host, container) = s
            .split_once(':')
            .ok_or_else(|| format!("'host:container' 形式で指定してください: '{}'", s))?;
        let host = PortRange::parse(host)?;
        let container = PortRange::parse(container)?;
        if host.len() != container.len() {
            return Err(format!("ホストとコンテナの範囲の長さが一致しません: '{}'", s));
        }
        Ok(Self { host, container })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}
