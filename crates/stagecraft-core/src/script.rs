//! カスタムスクリプトの解決
//!
//! `install.sh --name="my app" --verbose` のような宣言をシェルと同じ規則で
//! トークン化し、先頭をスクリプトのパス、残りを引数ベクタとして返します。
//! 引数の意味は解釈せず、クォートの除去以外はそのまま後段に渡します。

use crate::model::ScriptDecl;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("スクリプトのパスが空です")]
    Empty,

    #[error("{0}")]
    Tokenize(String),
}

/// 解決済みスクリプト
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedScript {
    File { path: String, args: Vec<String> },
    Inline {
        name: String,
        body: String,
        args: Vec<String>,
    },
}

impl ResolvedScript {
    pub fn args(&self) -> &[String] {
        match self {
            ResolvedScript::File { args, .. } | ResolvedScript::Inline { args, .. } => args,
        }
    }

    /// ログ表示用の名前
    pub fn display_name(&self) -> &str {
        match self {
            ResolvedScript::File { path, .. } => path,
            ResolvedScript::Inline { name, .. } => name,
        }
    }
}

/// シェル形式でトークン化
pub fn tokenize(line: &str) -> Result<Vec<String>, ScriptError> {
    shell_words::split(line).map_err(|e| ScriptError::Tokenize(e.to_string()))
}

/// 1 つの宣言を解決
pub fn resolve(decl: &ScriptDecl) -> Result<ResolvedScript, ScriptError> {
    match decl {
        ScriptDecl::Command(line) => {
            let mut tokens = tokenize(line)?.into_iter();
            let path = tokens
                .next()
                .filter(|p| !p.is_empty())
                .ok_or(ScriptError::Empty)?;
            Ok(ResolvedScript::File {
                path,
                args: tokens.collect(),
            })
        }
        ScriptDecl::Inline { name, body, args } => {
            let args = match args {
                Some(line) => tokenize(line)?,
                None => Vec::new(),
            };
            Ok(ResolvedScript::Inline {
                name: name.clone(),
                body: body.clone(),
                args,
            })
        }
    }
}

/// フックの宣言リストを宣言順のまま解決
pub fn resolve_all<'a>(
    decls: impl IntoIterator<Item = &'a ScriptDecl>,
) -> Result<Vec<ResolvedScript>, ScriptError> {
    decls.into_iter().map(resolve).collect()
}
