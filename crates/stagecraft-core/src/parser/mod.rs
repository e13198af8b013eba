//! 設定ドキュメントのパーサー
//!
//! YAML を [`RawDocument`] にデシリアライズしたあと、1 回の検証パスで
//! 型付きの [`ConfigurationDocument`] を組み立てます。
//! 検証エラーは途中で止めずにすべて集め、まとめて
//! [`ConfigError::Validation`] として返します。部分的なドキュメントは返しません。
//! セクションごとの処理はモジュールに分離されています。

mod script;
mod ssh;
mod stage;
mod storage;

use crate::error::{ConfigError, FieldError, FieldErrorKind, Result};
use crate::model::{ConfigurationDocument, StageId};
use crate::raw::RawDocument;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use tracing::debug;

/// 設定ファイルを読み込んでパース
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ConfigurationDocument> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_str(&content)
}

/// YAML 文字列をパース
pub fn parse_str(content: &str) -> Result<ConfigurationDocument> {
    let raw: RawDocument = serde_yaml::from_str(content)?;
    build_document(raw)
}

/// 未検証ドキュメントを検証して型付きドキュメントに変換
pub fn build_document(raw: RawDocument) -> Result<ConfigurationDocument> {
    let mut errors = Errors::default();

    let Some(raw_stage_1) = raw.stage_1 else {
        errors.push(StageId::One.key(), FieldErrorKind::Required);
        return Err(errors.into_error());
    };

    let stage_1 = stage::parse_stage(StageId::One, raw_stage_1, &mut errors);
    let stage_2 = raw
        .stage_2
        .map(|raw_stage| stage::parse_stage(StageId::Two, raw_stage, &mut errors));

    let doc = ConfigurationDocument { stage_1, stage_2 };
    stage::check_cross_stage(&doc, &mut errors);

    if !errors.is_empty() {
        debug!(count = errors.len(), "Validation failed");
        return Err(errors.into_error());
    }
    Ok(doc)
}

/// 検証エラーの収集
#[derive(Debug, Default)]
pub(crate) struct Errors(Vec<FieldError>);

impl Errors {
    pub fn push(&mut self, path: impl Into<String>, kind: FieldErrorKind) {
        self.0.push(FieldError::new(path, kind));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_error(self) -> ConfigError {
        ConfigError::Validation(self.0)
    }
}

/// フィールドパスを連結（`stage_1` + `ssh` → `stage_1.ssh`）
pub(crate) fn join(parent: &str, child: impl Display) -> String {
    format!("{}.{}", parent, child)
}

/// リスト要素のパス（`ports` + 0 → `ports[0]`）
pub(crate) fn index(parent: &str, i: usize) -> String {
    format!("{}[{}]", parent, i)
}

/// ポート番号の範囲チェック
pub(crate) fn port(path: &str, value: i64, errors: &mut Errors) -> Option<u16> {
    match u16::try_from(value) {
        Ok(port) if port >= 1 => Some(port),
        _ => {
            errors.push(
                path,
                FieldErrorKind::OutOfRange {
                    value,
                    min: 1,
                    max: 65535,
                },
            );
            None
        }
    }
}
