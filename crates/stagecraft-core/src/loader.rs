//! 統合ローダー
//!
//! 設定ファイルの発見、パース、ステージのマージを統合

use crate::discovery::{find_config_file, find_project_root};
use crate::error::Result;
use crate::merge::{EffectiveConfig, merge};
use crate::model::ConfigurationDocument;
use crate::parser::parse_file;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// プロジェクト名が決められないときの既定値
pub const FALLBACK_PROJECT_NAME: &str = "stagecraft";

/// ロード済みプロジェクト
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub project_root: PathBuf,
    pub config_path: PathBuf,
    pub project_name: String,
    pub document: ConfigurationDocument,
    pub effective: EffectiveConfig,
}

/// ロード時の指定
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// 設定ファイルのパス（省略時は発見）
    pub config_path: Option<PathBuf>,
    /// プロジェクト名（省略時はディレクトリ名）
    pub project_name: Option<String>,
}

/// カレントディレクトリからプロジェクトを検出してロード
#[instrument]
pub fn load_project() -> Result<LoadedProject> {
    info!("Starting project load");
    let project_root = find_project_root()?;
    load_project_from_root(&project_root, &LoadOptions::default())
}

/// 指定されたルートディレクトリからプロジェクトをロード
///
/// 以下の処理を実行:
/// 1. 設定ファイルの発見
/// 2. YAML パースと検証
/// 3. ステージのマージ
#[instrument(skip(project_root, options), fields(project_root = %project_root.display()))]
pub fn load_project_from_root(project_root: &Path, options: &LoadOptions) -> Result<LoadedProject> {
    // 1. 設定ファイル
    debug!("Step 1: Locating config file");
    let config_path = match &options.config_path {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => project_root.join(path),
        None => find_config_file(project_root)?,
    };

    // 2. パース
    debug!(config = %config_path.display(), "Step 2: Parsing config");
    let document = parse_file(&config_path)?;

    // 3. マージ
    let project_name = options
        .project_name
        .as_deref()
        .map(sanitize_name)
        .unwrap_or_else(|| project_name_from_root(project_root));
    debug!(project_name = %project_name, "Step 3: Merging stages");
    let effective = merge(&document, &project_name);

    info!(
        stages = effective.views().count(),
        "Project loaded successfully"
    );

    Ok(LoadedProject {
        project_root: project_root.to_path_buf(),
        config_path,
        project_name,
        document,
        effective,
    })
}

/// ディレクトリ名からプロジェクト名を決める
pub fn project_name_from_root(project_root: &Path) -> String {
    let absolute = std::path::absolute(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    absolute
        .file_name()
        .and_then(|n| n.to_str())
        .map(sanitize_name)
        .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string())
}

/// イメージ名・ボリューム名に使える形へ正規化
///
/// 小文字英数字と `-` `_` 以外は `-` に置き換え、先頭は英数字にそろえる。
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect();
    let trimmed = replaced.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
    if trimmed.is_empty() {
        FALLBACK_PROJECT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergeState;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My Project"), "my-project");
        assert_eq!(sanitize_name("demo_app-2"), "demo_app-2");
        assert_eq!(sanitize_name(".hidden"), "hidden");
        assert_eq!(sanitize_name("日本"), FALLBACK_PROJECT_NAME);
        assert_eq!(sanitize_name(""), FALLBACK_PROJECT_NAME);
    }

    #[test]
    #[serial]
    fn test_load_project_from_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("Demo Project");
        fs::create_dir(&root).unwrap();
        fs::write(
            root.join("user_config.yml"),
            "stage_1:\n  image:\n    base: ubuntu:24.04\nstage_2:\n  image:\n    output: demo:dev\n",
        )
        .unwrap();

        let project = load_project_from_root(&root, &LoadOptions::default()).unwrap();
        assert_eq!(project.project_name, "demo-project");
        assert!(project.config_path.ends_with("user_config.yml"));
        assert_eq!(project.effective.state, MergeState::StageOneAndTwo);
        assert_eq!(project.effective.stage_1.image.output, "demo-project:stage-1");

        let stage_2 = project.effective.stage_2.unwrap();
        assert_eq!(stage_2.image.base, "demo-project:stage-1");
        assert_eq!(stage_2.image.output, "demo:dev");
    }

    #[test]
    fn test_load_project_with_explicit_config_and_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("custom.yml"),
            "stage_1:\n  image:\n    base: ubuntu:24.04\n",
        )
        .unwrap();

        let options = LoadOptions {
            config_path: Some(PathBuf::from("custom.yml")),
            project_name: Some("Named".to_string()),
        };
        let project = load_project_from_root(temp_dir.path(), &options).unwrap();
        assert_eq!(project.project_name, "named");
        assert_eq!(project.effective.stage_1.image.output, "named:stage-1");
        assert!(project.effective.stage_2.is_none());
    }
}
