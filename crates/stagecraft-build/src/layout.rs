//! プロジェクトディレクトリの構成
//!
//! ```text
//! <project>/
//!   user_config.yml
//!   docker-compose.yml
//!   stage-1.Dockerfile, stage-2.Dockerfile
//!   installation/               -> コンテナ内 /opt/stagecraft
//!     stage-1/generated/...
//!     stage-2/generated/...
//! ```

use stagecraft_core::StageId;
use std::path::{Path, PathBuf};

/// installation ディレクトリのコンテナ内でのコピー先
pub const CONTAINER_INSTALL_ROOT: &str = "/opt/stagecraft";

pub const INSTALLATION_DIR: &str = "installation";
pub const GENERATED_DIR: &str = "generated";
pub const MANIFEST_FILE: &str = "docker-compose.yml";

/// 固定ストレージのルート（コンテナ内）
pub const STORAGE_HARD_ROOT: &str = "/hard";
pub const STORAGE_SOFT_ROOT: &str = "/soft";

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn installation_root(&self) -> PathBuf {
        self.root.join(INSTALLATION_DIR)
    }

    pub fn generated_dir(&self, stage: StageId) -> PathBuf {
        self.installation_root()
            .join(stage.name())
            .join(GENERATED_DIR)
    }

    /// ビルド定義ファイル（プロジェクトルートからの相対パス）
    pub fn dockerfile(stage: StageId) -> String {
        format!("{}.Dockerfile", stage.name())
    }

    /// ステージディレクトリ（プロジェクトルートからの相対パス）
    pub fn stage_host_dir(stage: StageId) -> String {
        format!("{}/{}", INSTALLATION_DIR, stage.name())
    }

    pub fn stage_container_dir(stage: StageId) -> String {
        format!("{}/{}", CONTAINER_INSTALL_ROOT, stage.name())
    }

    /// 生成ファイルのコンテナ内パス
    pub fn container_generated(stage: StageId, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            Self::stage_container_dir(stage),
            GENERATED_DIR,
            file_name
        )
    }

    /// installation ディレクトリからの相対パスをコンテナ内パスに変換
    pub fn container_path(relative: &str) -> String {
        if relative.starts_with('/') {
            relative.to_string()
        } else {
            format!(
                "{}/{}",
                CONTAINER_INSTALL_ROOT,
                relative.trim_start_matches("./")
            )
        }
    }
}
