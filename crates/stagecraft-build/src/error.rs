use stagecraft_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("SSH key not found for user '{user}'")]
    KeyNotFound { user: String, searched: Vec<PathBuf> },

    #[error("SSH key source not found for user '{user}': {}", path.display())]
    SourceNotFound { user: String, path: PathBuf },

    #[error("Invalid SSH key for user '{user}' ({origin}): {reason}")]
    InvalidKeyFormat {
        user: String,
        origin: String,
        reason: String,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Emit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script error: {0}")]
    Script(#[from] stagecraft_core::ScriptError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Manifest serialization error: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::KeyNotFound { user, searched } => {
                let searched = searched
                    .iter()
                    .map(|p| format!("  - {}", p.display()))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "ユーザー '{}' の SSH 鍵が見つかりません\n\
                     \n\
                     探索したパス:\n{}\n\
                     \n\
                     解決方法:\n\
                     1. ssh-keygen で鍵を作成してください\n\
                     2. または user_config.yml で鍵ファイルのパスを明示してください",
                    user, searched
                )
            }
            BuildError::SourceNotFound { user, path } => {
                format!(
                    "ユーザー '{}' の鍵ファイルが見つかりません: {}\n\
                     \n\
                     相対パスは installation ディレクトリからの相対位置として解決されます。",
                    user,
                    path.display()
                )
            }
            BuildError::InvalidKeyFormat {
                user,
                origin,
                reason,
            } => {
                format!(
                    "ユーザー '{}' の SSH 鍵を読み込めません（{}）\n\
                     理由: {}\n\
                     \n\
                     OpenSSH 形式の公開鍵、または OpenSSH / PEM 形式の秘密鍵を指定してください。",
                    user, origin, reason
                )
            }
            BuildError::Emit { path, source } => {
                format!(
                    "ファイルを書き込めません: {}\n\
                     理由: {}\n\
                     \n\
                     原因を取り除いてから再度 compile を実行してください（出力は冪等です）。",
                    path.display(),
                    source
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
