//! 設定ファイルとプロジェクトルートの発見

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "STAGECRAFT_CONFIG_PATH";

/// プロジェクトルートを指定する環境変数
pub const PROJECT_ROOT_ENV: &str = "STAGECRAFT_PROJECT_ROOT";

/// プロジェクトディレクトリ内の設定ファイル候補（優先順）
pub const CONFIG_CANDIDATES: &[&str] = &[
    "user_config.yml",
    "user_config.yaml",
    ".stagecraft/user_config.yml",
];

/// プロジェクトディレクトリ内の設定ファイルを探す（環境変数は見ない）
pub fn find_config_in(project_root: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STAGECRAFT_CONFIG_PATH
/// 2. プロジェクトディレクトリ: user_config.yml, user_config.yaml
/// 3. プロジェクトディレクトリの .stagecraft/user_config.yml
#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn find_config_file(project_root: &Path) -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(&config_path);
        debug!(env_path = %config_path, "Checking STAGECRAFT_CONFIG_PATH");
        if path.is_file() {
            return Ok(path);
        }
        warn!(path = %path.display(), "STAGECRAFT_CONFIG_PATH does not point to a file");
    }

    match find_config_in(project_root) {
        Some(path) => {
            debug!(config = %path.display(), "Found config file");
            Ok(path)
        }
        None => Err(ConfigError::ConfigNotFound(project_root.to_path_buf())),
    }
}

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STAGECRAFT_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって設定ファイルを持つディレクトリを探す
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking STAGECRAFT_PROJECT_ROOT");
        if find_config_in(&path).is_some() {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    let start_dir = std::env::current_dir().map_err(|e| ConfigError::IoError {
        path: PathBuf::from("."),
        message: e.to_string(),
    })?;
    find_project_root_from(&start_dir)
}

/// 指定ディレクトリから上に向かってプロジェクトルートを探す
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    debug!(start_dir = %start_dir.display(), "Searching for project root");

    loop {
        if find_config_in(&current).is_some() {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(ConfigError::ProjectRootNotFound(start_dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_find_config_in_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let hidden = temp_dir.path().join(".stagecraft");
        fs::create_dir(&hidden).unwrap();
        fs::write(hidden.join("user_config.yml"), "# hidden").unwrap();
        fs::write(temp_dir.path().join("user_config.yaml"), "# yaml").unwrap();

        let found = find_config_in(temp_dir.path()).unwrap();
        assert!(found.ends_with("user_config.yaml"));

        fs::write(temp_dir.path().join("user_config.yml"), "# yml").unwrap();
        let found = find_config_in(temp_dir.path()).unwrap();
        assert!(found.ends_with("user_config.yml"));
        assert!(!found.ends_with(".stagecraft/user_config.yml"));
    }

    #[test]
    fn test_find_config_in_hidden_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let hidden = temp_dir.path().join(".stagecraft");
        fs::create_dir(&hidden).unwrap();
        fs::write(hidden.join("user_config.yml"), "# hidden").unwrap();

        let found = find_config_in(temp_dir.path()).unwrap();
        assert_eq!(found, hidden.join("user_config.yml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("user_config.yml"), "# local").unwrap();
        let other = temp_dir.path().join("other.yml");
        fs::write(&other, "# other").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(other.as_os_str()), || {
            let found = find_config_file(temp_dir.path()).unwrap();
            assert_eq!(found, other);
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_missing_falls_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("user_config.yml"), "# local").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some("/nonexistent/user_config.yml"), || {
            let found = find_config_file(temp_dir.path()).unwrap();
            assert!(found.ends_with("user_config.yml"));
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();

        temp_env::with_var_unset(CONFIG_PATH_ENV, || {
            let result = find_config_file(temp_dir.path());
            assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
        });
    }

    #[test]
    fn test_find_project_root_from_nested_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("user_config.yml"), "# root").unwrap();
        let nested = temp_dir.path().join("installation/stage-1/custom");
        fs::create_dir_all(&nested).unwrap();

        let root = find_project_root_from(&nested).unwrap();
        assert_eq!(root, temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_find_project_root_env_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("user_config.yml"), "# root").unwrap();

        temp_env::with_var(PROJECT_ROOT_ENV, Some(temp_dir.path().as_os_str()), || {
            let root = find_project_root().unwrap();
            assert_eq!(root, temp_dir.path());
        });
    }
}
