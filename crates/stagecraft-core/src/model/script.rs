//! カスタムスクリプト定義

use serde::{Deserialize, Serialize};
use std::fmt;

/// ライフサイクルフック
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleHook {
    OnBuild,
    OnFirstRun,
    OnEveryRun,
    OnUserLogin,
    OnEntry,
}

impl LifecycleHook {
    pub const ALL: [LifecycleHook; 5] = [
        LifecycleHook::OnBuild,
        LifecycleHook::OnFirstRun,
        LifecycleHook::OnEveryRun,
        LifecycleHook::OnUserLogin,
        LifecycleHook::OnEntry,
    ];

    /// 連結されるフック（on_entry 以外）
    pub const CONCATENATED: [LifecycleHook; 4] = [
        LifecycleHook::OnBuild,
        LifecycleHook::OnFirstRun,
        LifecycleHook::OnEveryRun,
        LifecycleHook::OnUserLogin,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::OnBuild => "on_build",
            Self::OnFirstRun => "on_first_run",
            Self::OnEveryRun => "on_every_run",
            Self::OnUserLogin => "on_user_login",
            Self::OnEntry => "on_entry",
        }
    }

    /// 生成されるラッパースクリプトのファイル名
    pub fn wrapper_name(&self) -> &'static str {
        match self {
            Self::OnBuild => "_custom-on-build.sh",
            Self::OnFirstRun => "_custom-on-first-run.sh",
            Self::OnEveryRun => "_custom-on-every-run.sh",
            Self::OnUserLogin => "_custom-on-user-login.sh",
            Self::OnEntry => "_custom-on-entry.sh",
        }
    }

    /// イメージのビルド中に実行されるフックか
    pub fn is_build_time(&self) -> bool {
        matches!(self, Self::OnBuild)
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// スクリプトの宣言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptDecl {
    /// `path arg1 "arg 2"` 形式のコマンドライン
    Command(String),
    /// 設定ファイル内に本文を持つスクリプト
    Inline {
        name: String,
        body: String,
        /// シェル形式の引数文字列
        args: Option<String>,
    },
}

/// ステージのカスタムスクリプト
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomScriptSpec {
    pub on_build: Vec<ScriptDecl>,
    pub on_first_run: Vec<ScriptDecl>,
    pub on_every_run: Vec<ScriptDecl>,
    pub on_user_login: Vec<ScriptDecl>,
    /// エントリーポイントはステージごとに高々 1 つ
    pub on_entry: Option<ScriptDecl>,
}

impl CustomScriptSpec {
    pub fn hook(&self, hook: LifecycleHook) -> &[ScriptDecl] {
        match hook {
            LifecycleHook::OnBuild => &self.on_build,
            LifecycleHook::OnFirstRun => &self.on_first_run,
            LifecycleHook::OnEveryRun => &self.on_every_run,
            LifecycleHook::OnUserLogin => &self.on_user_login,
            LifecycleHook::OnEntry => self.on_entry.as_slice(),
        }
    }

    pub fn is_empty(&self) -> bool {
        LifecycleHook::ALL.iter().all(|h| self.hook(*h).is_empty())
    }
}
