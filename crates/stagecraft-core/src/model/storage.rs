//! ストレージ・マウント定義

use serde::{Deserialize, Serialize};
use std::fmt;

/// ストレージ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageType {
    /// プロジェクト名とスロット名から自動命名されるボリューム
    AutoVolume,
    /// 名前を明示したボリューム
    ManualVolume,
    /// ホストディレクトリのバインド
    Host,
    /// イメージ内ディレクトリ（マウントなし）
    Image,
}

impl StorageType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto-volume" => Some(Self::AutoVolume),
            "manual-volume" => Some(Self::ManualVolume),
            "host" => Some(Self::Host),
            "image" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoVolume => "auto-volume",
            Self::ManualVolume => "manual-volume",
            Self::Host => "host",
            Self::Image => "image",
        }
    }
}

/// ストレージの実体
///
/// 種別ごとに必須の付随フィールドを型で表現する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StorageOption {
    AutoVolume,
    ManualVolume { volume_name: String },
    Host { host_path: String },
    Image,
}

impl StorageOption {
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::AutoVolume => StorageType::AutoVolume,
            Self::ManualVolume { .. } => StorageType::ManualVolume,
            Self::Host { .. } => StorageType::Host,
            Self::Image => StorageType::Image,
        }
    }
}

/// 固定ストレージスロット（stage_2 専用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageSlot {
    App,
    Data,
    Workspace,
}

impl StorageSlot {
    pub const ALL: [StorageSlot; 3] = [StorageSlot::App, StorageSlot::Data, StorageSlot::Workspace];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "app" => Some(Self::App),
            "data" => Some(Self::Data),
            "workspace" => Some(Self::Workspace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Data => "data",
            Self::Workspace => "workspace",
        }
    }
}

impl fmt::Display for StorageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 名前付きマウント
///
/// `type=image` は検証時に拒否されるため、ここに来る値は
/// ボリュームかホストバインドのいずれか。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    #[serde(flatten)]
    pub option: StorageOption,
    /// コンテナ内の絶対パス
    pub dst_path: String,
}
