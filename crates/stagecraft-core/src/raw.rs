//! 未検証の設定ドキュメント
//!
//! YAML をそのままデシリアライズした形。すべてのフィールドが任意で、
//! 型の緩い値（数値で書かれたパスワードなど）もここでは受け入れる。
//! 検証と型付けは [`crate::parser`] が一括で行う。

use crate::model::SYSTEM_KEY_SENTINEL;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDocument {
    pub stage_1: Option<RawStage>,
    pub stage_2: Option<RawStage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStage {
    pub image: Option<RawImage>,
    pub ssh: Option<RawSsh>,
    pub proxy: Option<RawProxy>,
    pub apt: Option<RawApt>,
    pub device: Option<RawDevice>,
    pub environment: Option<RawEnvironment>,
    pub ports: Option<Vec<String>>,
    pub storage: Option<BTreeMap<String, RawStorage>>,
    pub mount: Option<BTreeMap<String, RawStorage>>,
    pub custom: Option<RawCustom>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawImage {
    pub base: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSsh {
    pub enable: Option<bool>,
    pub port: Option<i64>,
    pub host_port: Option<i64>,
    pub users: Option<BTreeMap<String, RawSshUser>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSshUser {
    /// `password: 123456` のように数値で書かれることがあるためスカラー値で受ける
    pub password: Option<serde_yaml::Value>,
    pub uid: Option<i64>,
    pub pubkey_text: Option<String>,
    pub privkey_text: Option<String>,
    /// `pubkey_file: ~` は YAML では null になるため、システム鍵の指定として扱う
    #[serde(default, deserialize_with = "key_file")]
    pub pubkey_file: Option<String>,
    #[serde(default, deserialize_with = "key_file")]
    pub privkey_file: Option<String>,
}

fn key_file<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(value.unwrap_or_else(|| SYSTEM_KEY_SENTINEL.to_string())))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProxy {
    pub address: Option<String>,
    pub port: Option<i64>,
    pub enable_globally: Option<bool>,
    pub remove_after_build: Option<bool>,
    pub use_https: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawApt {
    pub repo_source: Option<String>,
    pub keep_repo_after_build: Option<bool>,
    pub use_proxy: Option<bool>,
    pub keep_proxy_after_build: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDevice {
    #[serde(rename = "type")]
    pub device_type: Option<String>,
}

/// 環境変数は `KEY=VALUE` のリストとマッピングの両方を受け付ける
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawEnvironment {
    List(Vec<String>),
    Map(IndexMap<String, serde_yaml::Value>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStorage {
    #[serde(rename = "type")]
    pub storage_type: Option<String>,
    pub host_path: Option<String>,
    pub volume_name: Option<String>,
    pub dst_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCustom {
    pub on_build: Option<Vec<RawScript>>,
    pub on_first_run: Option<Vec<RawScript>>,
    pub on_every_run: Option<Vec<RawScript>>,
    pub on_user_login: Option<Vec<RawScript>>,
    pub on_entry: Option<OneOrMany<RawScript>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawScript {
    Command(String),
    Inline(RawInlineScript),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawInlineScript {
    pub name: Option<String>,
    pub script: Option<String>,
    pub args: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// YAML のスカラー値を文字列に変換（null は None、配列・マップは変換不可）
pub fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
