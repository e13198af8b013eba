//! apt 設定

use serde::{Deserialize, Serialize};

/// apt 設定（stage_1 専用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AptSpec {
    pub mirror: AptMirror,
    pub keep_repo_after_build: bool,
    /// apt 実行時にステージのプロキシを使う
    pub use_proxy: bool,
    pub keep_proxy_after_build: bool,
}

impl Default for AptSpec {
    fn default() -> Self {
        Self {
            mirror: AptMirror::Disabled,
            keep_repo_after_build: true,
            use_proxy: false,
            keep_proxy_after_build: false,
        }
    }
}

/// apt ミラー
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AptMirror {
    /// ベースイメージの設定をそのまま使う（`""` または `default`）
    #[default]
    Disabled,
    Tuna,
    Aliyun,
    Netease,
    Ustc,
    /// `cn`: 国内向けの既定ミラー
    Cn,
    /// インストールルートからの相対パス、またはコンテナ内の絶対パス
    SourceFile(String),
}

impl AptMirror {
    /// エイリアスまたはパスをパース
    ///
    /// エイリアスでもパスらしくもない値（`/` を含まず `.list` / `.sources` で終わらない）は None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "" | "default" => Some(Self::Disabled),
            "tuna" => Some(Self::Tuna),
            "aliyun" => Some(Self::Aliyun),
            "163" => Some(Self::Netease),
            "ustc" => Some(Self::Ustc),
            "cn" => Some(Self::Cn),
            path if path.contains('/') || path.ends_with(".list") || path.ends_with(".sources") => {
                Some(Self::SourceFile(path.to_string()))
            }
            _ => None,
        }
    }

    /// ミラーの URL（エイリアス以外は None）
    pub fn url(&self) -> Option<&'static str> {
        match self {
            Self::Tuna => Some("https://mirrors.tuna.tsinghua.edu.cn/ubuntu/"),
            Self::Aliyun | Self::Cn => Some("http://mirrors.aliyun.com/ubuntu/"),
            Self::Netease => Some("http://mirrors.163.com/ubuntu/"),
            Self::Ustc => Some("https://mirrors.ustc.edu.cn/ubuntu/"),
            Self::Disabled | Self::SourceFile(_) => None,
        }
    }
}
