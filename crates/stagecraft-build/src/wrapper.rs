//! ライフサイクルフックのラッパースクリプト生成
//!
//! 各ステージの generated ディレクトリに、フックごとに 1 つずつ
//! `_custom-on-*.sh` を出力します。スクリプトが 1 つもないフックでも
//! ラッパーは必ず出力され、ビルド定義側は存在チェックなしで呼び出せます。

use crate::error::Result;
use crate::layout::{GENERATED_DIR, INSTALLATION_DIR};
use serde::Serialize;
use stagecraft_core::script::resolve;
use stagecraft_core::{EffectiveStageView, LifecycleHook, ResolvedScript, StageId, StagedScript};
use tera::{Context, Tera};
use tracing::debug;

/// インラインスクリプト本文のファイル名の接頭辞
pub const INLINE_PREFIX: &str = "_inline-";

const TEMPLATE_NAME: &str = "wrapper.sh";

const WRAPPER_TEMPLATE: &str = r#"#!/bin/bash
# {{ hook }} ({{ stage }}): stagecraft により生成されたファイルです
{% if strict -%}
set -e
{% endif -%}
STAGECRAFT_ROOT="$(cd "$(dirname "${BASH_SOURCE[0]}")/../.." && pwd)"
{% for command in commands %}
# {{ command.origin }}: {{ command.name }}
{{ command.line }}
{% endfor %}{% if commands | length == 0 %}
# 登録されたスクリプトはありません
{% endif -%}
"#;

/// 生成されたファイル 1 つ分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct WrapperCommand {
    origin: &'static str,
    name: String,
    line: String,
}

pub fn inline_file_name(name: &str) -> String {
    format!("{}{}", INLINE_PREFIX, name)
}

/// ラッパーのレンダラー
pub struct WrapperRenderer {
    tera: Tera,
}

impl WrapperRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(TEMPLATE_NAME, WRAPPER_TEMPLATE)?;
        Ok(Self { tera })
    }

    /// ステージの 5 つのラッパーを生成
    pub fn render_stage(&self, view: &EffectiveStageView) -> Result<Vec<GeneratedScript>> {
        LifecycleHook::ALL
            .iter()
            .map(|hook| {
                let content = self.render(view, *hook)?;
                Ok(GeneratedScript {
                    file_name: hook.wrapper_name().to_string(),
                    content,
                })
            })
            .collect()
    }

    pub fn render(&self, view: &EffectiveStageView, hook: LifecycleHook) -> Result<String> {
        let commands = hook_scripts(view, hook)
            .map(|staged| {
                let resolved = resolve(&staged.script)?;
                Ok(WrapperCommand {
                    origin: staged.origin.name(),
                    name: resolved.display_name().to_string(),
                    line: command_line(hook, staged.origin, &resolved),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            stage = %view.stage,
            hook = %hook,
            scripts = commands.len(),
            "Rendering wrapper"
        );

        let mut context = Context::new();
        context.insert("hook", hook.key());
        context.insert("stage", view.stage.name());
        // ログインシェルから source されるラッパーでは set -e を使わない
        context.insert("strict", &(hook != LifecycleHook::OnUserLogin));
        context.insert("commands", &commands);

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

/// ラッパーに含めるスクリプト
///
/// stage_2 の on_build は stage_2 の宣言分だけ。stage_1 の分は
/// ベースイメージのビルド時に実行済み。
fn hook_scripts(
    view: &EffectiveStageView,
    hook: LifecycleHook,
) -> impl Iterator<Item = &StagedScript> {
    let stage = view.stage;
    view.hook(hook)
        .iter()
        .filter(move |s| !hook.is_build_time() || s.origin == stage)
}

/// ステージが宣言したインラインスクリプトの本文
pub fn inline_scripts(view: &EffectiveStageView) -> Result<Vec<GeneratedScript>> {
    let mut scripts = Vec::new();
    for hook in LifecycleHook::ALL {
        for staged in view.hook(hook).iter().filter(|s| s.origin == view.stage) {
            if let ResolvedScript::Inline { name, body, .. } = resolve(&staged.script)? {
                let mut content = body;
                if !content.ends_with('\n') {
                    content.push('\n');
                }
                scripts.push(GeneratedScript {
                    file_name: inline_file_name(&name),
                    content,
                });
            }
        }
    }
    Ok(scripts)
}

/// スクリプトの呼び出し行
fn command_line(hook: LifecycleHook, origin: StageId, script: &ResolvedScript) -> String {
    let path = match script {
        ResolvedScript::File { path, .. } => script_path(path),
        ResolvedScript::Inline { name, .. } => format!(
            "\"$STAGECRAFT_ROOT\"/{}/{}/{}",
            origin.name(),
            GENERATED_DIR,
            shell_words::quote(&inline_file_name(name))
        ),
    };

    let mut line = match hook {
        LifecycleHook::OnUserLogin => format!(". {}", path),
        LifecycleHook::OnEntry => format!("exec bash {}", path),
        _ => format!("bash {}", path),
    };
    for arg in script.args() {
        line.push(' ');
        line.push_str(&shell_words::quote(arg));
    }
    if hook == LifecycleHook::OnEntry {
        line.push_str(" \"$@\"");
    }
    line
}

/// 相対パスは installation ディレクトリ（コンテナ内のインストールルート）から解決
fn script_path(path: &str) -> String {
    if path.starts_with('/') {
        return shell_words::quote(path).into_owned();
    }
    let relative = path.trim_start_matches("./");
    let relative = relative
        .strip_prefix(&format!("{}/", INSTALLATION_DIR))
        .unwrap_or(relative);
    format!("\"$STAGECRAFT_ROOT\"/{}", shell_words::quote(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecraft_core::{ConfigurationDocument, ImageSpec, ScriptDecl, StageSpec, merge};

    fn cmd(line: &str) -> ScriptDecl {
        ScriptDecl::Command(line.to_string())
    }

    fn two_stage_doc() -> ConfigurationDocument {
        let mut one = StageSpec {
            image: ImageSpec {
                base: Some("ubuntu:24.04".to_string()),
                output: None,
            },
            ..Default::default()
        };
        one.custom.on_build = vec![cmd("stage-1/custom/install-base.sh")];
        one.custom.on_first_run = vec![cmd("stage-1/custom/first.sh --name=\"my app\"")];
        one.custom.on_entry = Some(cmd("stage-1/custom/entry-1.sh"));

        let mut two = StageSpec::default();
        two.custom.on_build = vec![cmd("stage-2/custom/install-app.sh")];
        two.custom.on_first_run = vec![ScriptDecl::Inline {
            name: "hello.sh".to_string(),
            body: "echo hello".to_string(),
            args: Some("'a b' c".to_string()),
        }];
        two.custom.on_user_login = vec![cmd("/etc/profile.d/extra.sh")];
        two.custom.on_entry = Some(cmd("stage-2/custom/entry-2.sh --serve"));

        ConfigurationDocument {
            stage_1: one,
            stage_2: Some(two),
        }
    }

    #[test]
    fn test_always_emits_five_wrappers() {
        let doc = ConfigurationDocument {
            stage_1: StageSpec {
                image: ImageSpec {
                    base: Some("ubuntu:24.04".to_string()),
                    output: None,
                },
                ..Default::default()
            },
            stage_2: None,
        };
        let effective = merge(&doc, "demo");
        let renderer = WrapperRenderer::new().unwrap();
        let wrappers = renderer.render_stage(&effective.stage_1).unwrap();

        assert_eq!(wrappers.len(), 5);
        for wrapper in &wrappers {
            assert!(wrapper.content.starts_with("#!/bin/bash\n"));
            assert!(wrapper.content.contains("登録されたスクリプトはありません"));
        }
    }

    #[test]
    fn test_runtime_hooks_are_concatenated_in_order() {
        let effective = merge(&two_stage_doc(), "demo");
        let renderer = WrapperRenderer::new().unwrap();
        let two = effective.stage_2.as_ref().unwrap();

        let first_run = renderer.render(two, LifecycleHook::OnFirstRun).unwrap();
        let first = first_run.find("first.sh").unwrap();
        let inline = first_run.find("_inline-hello.sh").unwrap();
        assert!(first < inline);
        assert!(first_run.contains(
            "bash \"$STAGECRAFT_ROOT\"/stage-1/custom/first.sh '--name=my app'"
        ));
        assert!(first_run.contains(
            "bash \"$STAGECRAFT_ROOT\"/stage-2/generated/_inline-hello.sh 'a b' c"
        ));
    }

    #[test]
    fn test_stage_two_build_hook_only_has_own_scripts() {
        let effective = merge(&two_stage_doc(), "demo");
        let renderer = WrapperRenderer::new().unwrap();

        let one = renderer
            .render(&effective.stage_1, LifecycleHook::OnBuild)
            .unwrap();
        assert!(one.contains("install-base.sh"));

        let two = renderer
            .render(effective.stage_2.as_ref().unwrap(), LifecycleHook::OnBuild)
            .unwrap();
        assert!(two.contains("install-app.sh"));
        assert!(!two.contains("install-base.sh"));
    }

    #[test]
    fn test_entry_and_login_invocation() {
        let effective = merge(&two_stage_doc(), "demo");
        let renderer = WrapperRenderer::new().unwrap();
        let two = effective.stage_2.as_ref().unwrap();

        let entry = renderer.render(two, LifecycleHook::OnEntry).unwrap();
        assert!(entry.contains("exec bash \"$STAGECRAFT_ROOT\"/stage-2/custom/entry-2.sh --serve \"$@\""));
        assert!(!entry.contains("entry-1.sh"));

        let login = renderer.render(two, LifecycleHook::OnUserLogin).unwrap();
        assert!(login.contains(". /etc/profile.d/extra.sh"));
        assert!(!login.contains("set -e"));
    }

    #[test]
    fn test_inline_scripts_belong_to_origin_stage() {
        let effective = merge(&two_stage_doc(), "demo");

        assert!(inline_scripts(&effective.stage_1).unwrap().is_empty());
        let inline = inline_scripts(effective.stage_2.as_ref().unwrap()).unwrap();
        assert_eq!(
            inline,
            vec![GeneratedScript {
                file_name: "_inline-hello.sh".to_string(),
                content: "echo hello\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_script_path() {
        assert_eq!(
            script_path("./stage-1/custom/a.sh"),
            "\"$STAGECRAFT_ROOT\"/stage-1/custom/a.sh"
        );
        assert_eq!(
            script_path("installation/stage-1/custom/a.sh"),
            "\"$STAGECRAFT_ROOT\"/stage-1/custom/a.sh"
        );
        assert_eq!(script_path("/opt/my scripts/a.sh"), "'/opt/my scripts/a.sh'");
    }
}
