pub mod compile;
pub mod show;
pub mod validate;

use crate::ProjectArgs;
use colored::Colorize;
use stagecraft_build::{BuildError, CompileOptions};
use stagecraft_core::{ConfigError, LoadOptions, LoadedProject, find_project_root, load_project_from_root};
use std::path::PathBuf;

impl ProjectArgs {
    pub fn root(&self) -> Result<PathBuf, ConfigError> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => find_project_root(),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            project_name: self.project_name.clone(),
        }
    }

    pub fn compile_options(&self, home: Option<PathBuf>) -> CompileOptions {
        CompileOptions {
            project_dir: self.project_dir.clone(),
            config_path: self.config.clone(),
            home_dir: home,
            project_name: self.project_name.clone(),
        }
    }
}

/// 設定をロード（失敗したらエラーを表示して終了）
pub fn load_or_exit(project: &ProjectArgs) -> LoadedProject {
    let loaded = project
        .root()
        .and_then(|root| load_project_from_root(&root, &project.load_options()));
    match loaded {
        Ok(loaded) => loaded,
        Err(e) => exit_with_error(&BuildError::Config(e)),
    }
}

/// エラーを表示して終了
pub fn exit_with_error(err: &BuildError) -> ! {
    eprintln!();
    match err {
        BuildError::Config(ConfigError::Validation(errors)) => {
            eprintln!(
                "{}",
                format!("✗ 設定エラー（{} 件）", errors.len()).red().bold()
            );
            for error in errors {
                eprintln!("  - {}: {}", error.path.cyan(), error.kind);
            }
        }
        BuildError::Config(e) => {
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
        }
        other => {
            eprintln!("{}", "✗ コンパイルエラー".red().bold());
            for line in other.user_message().lines() {
                eprintln!("  {}", line);
            }
        }
    }
    std::process::exit(1);
}
