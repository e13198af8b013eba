use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("YAMLパースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("設定の検証に失敗しました（{} 件）\n{}", .0.len(), FieldErrors(.0))]
    Validation(Vec<FieldError>),

    #[error(
        "設定ファイルが見つかりません\n探索開始位置: {0}\nヒント: user_config.yml を含むディレクトリで実行するか、STAGECRAFT_CONFIG_PATH を指定してください"
    )]
    ConfigNotFound(PathBuf),

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: STAGECRAFT_PROJECT_ROOT でプロジェクトディレクトリを指定できます"
    )]
    ProjectRootNotFound(PathBuf),
}

impl ConfigError {
    /// 検証エラーの一覧（検証エラー以外なら空）
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ConfigError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

/// フィールド単位の検証エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// 問題のあるフィールドのパス（例: `stage_1.ssh.users.me.uid`）
    pub path: String,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(path: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    #[error("必須フィールドです")]
    Required,

    #[error("{value} は範囲外です（{min}〜{max}）")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("鍵ソースは 1 つだけ指定できます（指定: {}）", .0.join(", "))]
    AmbiguousKeySource(Vec<String>),

    #[error("パスワードにカンマや空白は使用できません")]
    InvalidPassword,

    #[error("uid 0 は root ユーザー専用です")]
    ReservedUid,

    #[error("このセクションは {0} でのみ指定できます")]
    StageExclusive(&'static str),

    #[error("不明な apt ミラー '{0}'（tuna, aliyun, 163, ustc, cn, default またはファイルパス）")]
    UnknownMirror(String),

    #[error("絶対パスを指定してください: {0}")]
    NotAbsolute(String),

    #[error("type=image はストレージスロット（app, data, workspace）でのみ使用できます")]
    ImageMountNotAllowed,

    #[error("type={storage_type} には {field} が必要です")]
    MissingCompanion {
        storage_type: &'static str,
        field: &'static str,
    },

    #[error("重複しています: {0}")]
    Duplicate(String),

    #[error("予約済みのビルド引数名です: {0}")]
    ReservedKey(String),

    #[error("スクリプトの引数を解析できません: {0}")]
    Tokenize(String),

    #[error("{0}")]
    Invalid(String),
}

struct FieldErrors<'a>(&'a [FieldError]);

impl fmt::Display for FieldErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", error)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
