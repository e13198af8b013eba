//! カスタムスクリプトセクションのパース

use super::{Errors, index, join};
use crate::error::FieldErrorKind;
use crate::model::{CustomScriptSpec, LifecycleHook, ScriptDecl};
use crate::raw::{RawCustom, RawInlineScript, RawScript};
use crate::script::{ScriptError, resolve};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// インラインスクリプト名（生成ファイル名になる）
static INLINE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

pub(super) fn parse_custom(path: &str, raw: RawCustom, errors: &mut Errors) -> CustomScriptSpec {
    let mut names: HashMap<String, String> = HashMap::new();
    let mut parse_list = |hook: LifecycleHook, list: Option<Vec<RawScript>>, errors: &mut Errors| {
        let hook_path = join(path, hook.key());
        list.unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw_script)| {
                parse_script(&index(&hook_path, i), raw_script, &mut names, errors)
            })
            .collect::<Vec<_>>()
    };

    let on_build = parse_list(LifecycleHook::OnBuild, raw.on_build, errors);
    let on_first_run = parse_list(LifecycleHook::OnFirstRun, raw.on_first_run, errors);
    let on_every_run = parse_list(LifecycleHook::OnEveryRun, raw.on_every_run, errors);
    let on_user_login = parse_list(LifecycleHook::OnUserLogin, raw.on_user_login, errors);

    let entries = raw.on_entry.map(|entry| entry.into_vec());
    if let Some(entries) = &entries
        && entries.len() > 1
    {
        errors.push(
            join(path, LifecycleHook::OnEntry.key()),
            FieldErrorKind::Invalid(format!(
                "on_entry は 1 つだけ指定できます（{} 件指定されています）",
                entries.len()
            )),
        );
    }
    let on_entry = parse_list(LifecycleHook::OnEntry, entries, errors)
        .into_iter()
        .next();

    CustomScriptSpec {
        on_build,
        on_first_run,
        on_every_run,
        on_user_login,
        on_entry,
    }
}

fn parse_script(
    path: &str,
    raw: RawScript,
    names: &mut HashMap<String, String>,
    errors: &mut Errors,
) -> Option<ScriptDecl> {
    let decl = match raw {
        RawScript::Command(line) => ScriptDecl::Command(line.trim().to_string()),
        RawScript::Inline(inline) => parse_inline(path, inline, names, errors)?,
    };

    // 引数が解析できることをここで確認しておく
    match resolve(&decl) {
        Ok(_) => Some(decl),
        Err(ScriptError::Empty) => {
            errors.push(path, FieldErrorKind::Required);
            None
        }
        Err(ScriptError::Tokenize(message)) => {
            errors.push(path, FieldErrorKind::Tokenize(message));
            None
        }
    }
}

fn parse_inline(
    path: &str,
    raw: RawInlineScript,
    names: &mut HashMap<String, String>,
    errors: &mut Errors,
) -> Option<ScriptDecl> {
    let name = raw.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let body = raw.script.filter(|s| !s.trim().is_empty());

    let name_field = join(path, "name");
    let name = match name {
        None => {
            errors.push(name_field, FieldErrorKind::Required);
            None
        }
        Some(name) if !INLINE_NAME.is_match(&name) => {
            errors.push(
                name_field,
                FieldErrorKind::Invalid(format!("スクリプト名として使えません: '{}'", name)),
            );
            None
        }
        Some(name) => {
            if let Some(other) = names.insert(name.clone(), path.to_string()) {
                errors.push(
                    name_field,
                    FieldErrorKind::Duplicate(format!("{}（{} と重複）", name, other)),
                );
            }
            Some(name)
        }
    };
    if body.is_none() {
        errors.push(join(path, "script"), FieldErrorKind::Required);
    }

    Some(ScriptDecl::Inline {
        name: name?,
        body: body?,
        args: raw.args.filter(|a| !a.trim().is_empty()),
    })
}
