//! ドキュメント定義

use super::apt::AptSpec;
use super::device::DeviceType;
use super::environment::EnvVar;
use super::port::PortMapping;
use super::proxy::ProxySpec;
use super::script::CustomScriptSpec;
use super::ssh::SshSpec;
use super::storage::{MountSpec, StorageOption, StorageSlot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 設定ドキュメント全体
///
/// `stage_1` は必須、`stage_2` は任意。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    pub stage_1: StageSpec,
    pub stage_2: Option<StageSpec>,
}

impl ConfigurationDocument {
    pub fn stage(&self, id: StageId) -> Option<&StageSpec> {
        match id {
            StageId::One => Some(&self.stage_1),
            StageId::Two => self.stage_2.as_ref(),
        }
    }
}

/// ステージ識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageId {
    #[serde(rename = "stage-1")]
    One,
    #[serde(rename = "stage-2")]
    Two,
}

impl StageId {
    pub const ALL: [StageId; 2] = [StageId::One, StageId::Two];

    /// マニフェストのサービス名・ディレクトリ名（`stage-1`）
    pub fn name(&self) -> &'static str {
        match self {
            StageId::One => "stage-1",
            StageId::Two => "stage-2",
        }
    }

    /// 設定ドキュメント上のキー（`stage_1`）
    pub fn key(&self) -> &'static str {
        match self {
            StageId::One => "stage_1",
            StageId::Two => "stage_2",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            StageId::One => 1,
            StageId::Two => 2,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// イメージ設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// ベースイメージ（stage_2 で未指定なら stage_1 の output を継承）
    pub base: Option<String>,
    /// 出力イメージタグ
    pub output: Option<String>,
}

/// ステージごとの設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSpec {
    pub image: ImageSpec,
    pub ssh: Option<SshSpec>,
    pub proxy: Option<ProxySpec>,
    pub apt: Option<AptSpec>,
    pub device: Option<DeviceType>,
    /// 宣言順を保持した環境変数
    pub environment: Option<Vec<EnvVar>>,
    pub ports: Option<Vec<PortMapping>>,
    pub storage: Option<BTreeMap<StorageSlot, StorageOption>>,
    pub mount: Option<BTreeMap<String, MountSpec>>,
    pub custom: CustomScriptSpec,
}
