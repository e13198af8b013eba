//! ステージのパース

use super::script::parse_custom;
use super::ssh::parse_ssh;
use super::storage::{parse_mounts, parse_storage};
use super::{Errors, index, join, port};
use crate::build_args;
use crate::error::FieldErrorKind;
use crate::merge::{Section, exclusive_owner};
use crate::model::{
    AptMirror, AptSpec, ConfigurationDocument, DeviceType, EnvVar, ImageSpec, LifecycleHook,
    PortMapping, ProxySpec, StageId, StageSpec,
};
use crate::raw::{RawApt, RawEnvironment, RawImage, RawProxy, RawStage, scalar_to_string};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static ENV_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// ステージセクションをパース
pub(super) fn parse_stage(stage: StageId, mut raw: RawStage, errors: &mut Errors) -> StageSpec {
    let path = stage.key();
    reject_foreign_sections(stage, &mut raw, errors);

    StageSpec {
        image: parse_image(stage, raw.image, errors),
        ssh: raw.ssh.map(|ssh| parse_ssh(&join(path, "ssh"), ssh, errors)),
        proxy: raw
            .proxy
            .map(|proxy| parse_proxy(&join(path, "proxy"), proxy, errors)),
        apt: raw.apt.map(|apt| parse_apt(&join(path, "apt"), apt, errors)),
        device: raw.device.and_then(|device| {
            let value = device.device_type?;
            let parsed = DeviceType::parse(&value);
            if parsed.is_none() {
                errors.push(
                    join(path, "device.type"),
                    FieldErrorKind::Invalid(format!("cpu または gpu を指定してください: '{}'", value)),
                );
            }
            parsed
        }),
        environment: raw
            .environment
            .map(|env| parse_environment(&join(path, "environment"), env, errors)),
        ports: raw
            .ports
            .map(|ports| parse_ports(&join(path, "ports"), &ports, errors)),
        storage: raw
            .storage
            .map(|storage| parse_storage(&join(path, "storage"), storage, errors)),
        mount: raw
            .mount
            .map(|mount| parse_mounts(&join(path, "mount"), mount, errors)),
        custom: raw
            .custom
            .map(|custom| parse_custom(&join(path, "custom"), custom, errors))
            .unwrap_or_default(),
    }
}

/// このステージで宣言できないセクションをエラーにして取り除く
fn reject_foreign_sections(stage: StageId, raw: &mut RawStage, errors: &mut Errors) {
    let mut declared = vec![
        (Section::Image, raw.image.is_some()),
        (Section::Ssh, raw.ssh.is_some()),
        (Section::Apt, raw.apt.is_some()),
        (Section::Proxy, raw.proxy.is_some()),
        (Section::Device, raw.device.is_some()),
        (Section::Environment, raw.environment.is_some()),
        (Section::Ports, raw.ports.is_some()),
        (Section::Mount, raw.mount.is_some()),
        (Section::Storage, raw.storage.is_some()),
    ];
    if let Some(custom) = &raw.custom {
        declared.extend([
            (Section::Hook(LifecycleHook::OnBuild), custom.on_build.is_some()),
            (Section::Hook(LifecycleHook::OnFirstRun), custom.on_first_run.is_some()),
            (Section::Hook(LifecycleHook::OnEveryRun), custom.on_every_run.is_some()),
            (Section::Hook(LifecycleHook::OnUserLogin), custom.on_user_login.is_some()),
            (Section::Hook(LifecycleHook::OnEntry), custom.on_entry.is_some()),
        ]);
    }

    for (section, present) in declared {
        if !present {
            continue;
        }
        if let Some(owner) = exclusive_owner(section, stage) {
            errors.push(
                join(stage.key(), section.key()),
                FieldErrorKind::StageExclusive(owner.key()),
            );
            match section {
                Section::Ssh => raw.ssh = None,
                Section::Apt => raw.apt = None,
                Section::Storage => raw.storage = None,
                _ => {}
            }
        }
    }
}

fn parse_image(stage: StageId, raw: Option<RawImage>, errors: &mut Errors) -> ImageSpec {
    let raw = raw.unwrap_or_default();
    let base = raw.base.filter(|b| !b.trim().is_empty());
    let output = raw.output.filter(|o| !o.trim().is_empty());

    // stage_2 の base は stage_1 の output を継承できる
    if stage == StageId::One && base.is_none() {
        errors.push(join(stage.key(), "image.base"), FieldErrorKind::Required);
    }
    ImageSpec { base, output }
}

fn parse_proxy(path: &str, raw: RawProxy, errors: &mut Errors) -> ProxySpec {
    ProxySpec {
        address: raw.address.filter(|a| !a.trim().is_empty()),
        port: raw.port.and_then(|p| port(&join(path, "port"), p, errors)),
        enable_globally: raw.enable_globally,
        remove_after_build: raw.remove_after_build,
        use_https: raw.use_https,
    }
}

fn parse_apt(path: &str, raw: RawApt, errors: &mut Errors) -> AptSpec {
    let defaults = AptSpec::default();
    let mirror = match raw.repo_source {
        Some(source) => AptMirror::parse(&source).unwrap_or_else(|| {
            errors.push(
                join(path, "repo_source"),
                FieldErrorKind::UnknownMirror(source),
            );
            AptMirror::Disabled
        }),
        None => AptMirror::Disabled,
    };

    AptSpec {
        mirror,
        keep_repo_after_build: raw
            .keep_repo_after_build
            .unwrap_or(defaults.keep_repo_after_build),
        use_proxy: raw.use_proxy.unwrap_or(defaults.use_proxy),
        keep_proxy_after_build: raw
            .keep_proxy_after_build
            .unwrap_or(defaults.keep_proxy_after_build),
    }
}

fn parse_environment(path: &str, raw: RawEnvironment, errors: &mut Errors) -> Vec<EnvVar> {
    let mut vars = Vec::new();

    match raw {
        RawEnvironment::List(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                match EnvVar::parse(entry) {
                    Some(var) => vars.push((index(path, i), var)),
                    None => errors.push(
                        index(path, i),
                        FieldErrorKind::Invalid(format!(
                            "'KEY=VALUE' 形式で指定してください: '{}'",
                            entry
                        )),
                    ),
                }
            }
        }
        RawEnvironment::Map(entries) => {
            for (key, value) in entries {
                let entry_path = join(path, &key);
                let value = match &value {
                    serde_yaml::Value::Null => Some(String::new()),
                    other => scalar_to_string(other),
                };
                match value {
                    Some(value) => vars.push((entry_path, EnvVar::new(key, value))),
                    None => errors.push(
                        entry_path,
                        FieldErrorKind::Invalid("値はスカラーで指定してください".to_string()),
                    ),
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(vars.len());
    for (entry_path, var) in vars {
        if !ENV_KEY.is_match(&var.key) {
            errors.push(
                entry_path,
                FieldErrorKind::Invalid(format!("環境変数名として使えません: '{}'", var.key)),
            );
        } else if build_args::is_reserved(&var.key) {
            errors.push(entry_path, FieldErrorKind::ReservedKey(var.key));
        } else if !seen.insert(var.key.clone()) {
            errors.push(entry_path, FieldErrorKind::Duplicate(var.key));
        } else {
            result.push(var);
        }
    }
    result
}

fn parse_ports(path: &str, raw: &[String], errors: &mut Errors) -> Vec<PortMapping> {
    raw.iter()
        .enumerate()
        .filter_map(|(i, entry)| match PortMapping::parse(entry) {
            Ok(mapping) => Some(mapping),
            Err(message) => {
                errors.push(index(path, i), FieldErrorKind::Invalid(message));
                None
            }
        })
        .collect()
}

/// ステージをまたぐ整合性チェック
pub(super) fn check_cross_stage(doc: &ConfigurationDocument, errors: &mut Errors) {
    if let Some(proxy) = &doc.stage_1.proxy
        && proxy.port.is_none()
    {
        errors.push(join(StageId::One.key(), "proxy.port"), FieldErrorKind::Required);
    }

    if let Some(stage_2) = &doc.stage_2
        && let Some(proxy) = &stage_2.proxy
        && proxy.port.is_none()
        && doc.stage_1.proxy.is_none()
    {
        errors.push(join(StageId::Two.key(), "proxy.port"), FieldErrorKind::Required);
    }

    if let Some(apt) = &doc.stage_1.apt
        && apt.use_proxy
        && doc.stage_1.proxy.is_none()
    {
        errors.push(
            join(StageId::One.key(), "apt.use_proxy"),
            FieldErrorKind::Invalid("stage_1.proxy が宣言されていません".to_string()),
        );
    }
}
