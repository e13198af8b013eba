//! プロキシ設定

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROXY_ADDRESS: &str = "host.docker.internal";

/// プロキシ設定
///
/// すべてのフィールドは null 可。stage_2 で null のフィールドは
/// stage_1 の実効値を継承する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySpec {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub enable_globally: Option<bool>,
    pub remove_after_build: Option<bool>,
    pub use_https: Option<bool>,
}

impl ProxySpec {
    /// `top` で宣言されたフィールドを優先して重ねる
    pub fn overlay(&self, top: &ProxySpec) -> ProxySpec {
        ProxySpec {
            address: top.address.clone().or_else(|| self.address.clone()),
            port: top.port.or(self.port),
            enable_globally: top.enable_globally.or(self.enable_globally),
            remove_after_build: top.remove_after_build.or(self.remove_after_build),
            use_https: top.use_https.or(self.use_https),
        }
    }

    pub fn address_or_default(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_PROXY_ADDRESS)
    }

    /// `http://address:port`（ポート未設定なら None）
    pub fn http_url(&self) -> Option<String> {
        self.port
            .map(|port| format!("http://{}:{}", self.address_or_default(), port))
    }

    /// https_proxy 用の URL。use_https が false なら http スキームのまま
    pub fn https_url(&self) -> Option<String> {
        let scheme = if self.use_https.unwrap_or(false) {
            "https"
        } else {
            "http"
        };
        self.port
            .map(|port| format!("{}://{}:{}", scheme, self.address_or_default(), port))
    }
}
