//! SSH 設定

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ホームディレクトリの鍵を自動探索する指定
pub const SYSTEM_KEY_SENTINEL: &str = "~";

/// SSH 設定（stage_1 専用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSpec {
    pub enable: bool,
    /// コンテナ内の sshd ポート
    pub port: u16,
    /// ホスト側に公開するポート
    pub host_port: Option<u16>,
    /// ユーザー名 → ユーザー設定（出力順を安定させるため BTreeMap）
    pub users: BTreeMap<String, SshUserSpec>,
}

impl Default for SshSpec {
    fn default() -> Self {
        Self {
            enable: true,
            port: 22,
            host_port: None,
            users: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshUserSpec {
    pub password: Option<String>,
    pub uid: Option<u32>,
    pub key: KeySource,
}

/// 鍵の取得元
///
/// 1 ユーザーにつき高々 1 つ。複数指定は検証時に拒否される。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// パスワードのみ
    #[default]
    None,
    PublicText(String),
    PrivateText(String),
    PublicFile(String),
    PrivateFile(String),
}

impl KeySource {
    pub fn is_none(&self) -> bool {
        matches!(self, KeySource::None)
    }
}
