//! stagecraft の設定モデル
//!
//! 2 ステージ構成のコンテナビルド設定（`user_config.yml`）を読み込み、
//! 検証済みの型付きモデルに変換して、ステージごとの実効ビューを計算します。

pub mod build_args;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod merge;
pub mod model;
pub mod parser;
pub mod raw;
pub mod script;

pub use discovery::{find_config_file, find_project_root};
pub use error::{ConfigError, FieldError, FieldErrorKind, Result};
pub use loader::{LoadOptions, LoadedProject, load_project, load_project_from_root};
pub use merge::{EffectiveConfig, EffectiveStageView, MergeState, StagedScript, merge};
pub use model::*;
pub use parser::{parse_file, parse_str};
pub use script::{ResolvedScript, ScriptError};
