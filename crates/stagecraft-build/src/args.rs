//! ステージごとのビルド引数
//!
//! キーの並びは固定で、同じ入力からは常に同じ順序の引数が得られます。
//! ユーザー一覧は `,` 区切りで渡すため、パスワードにカンマや空白は使えません。

use crate::layout::{CONTAINER_INSTALL_ROOT, ProjectLayout, STORAGE_HARD_ROOT, STORAGE_SOFT_ROOT};
use crate::ssh::{KeySlot, UserKeys};
use crate::storage::ResolvedStorage;
use indexmap::IndexMap;
use stagecraft_core::build_args::*;
use stagecraft_core::{AptMirror, EffectiveStageView, StageId, StorageSlot};
use std::collections::BTreeMap;
use tracing::warn;

pub type BuildArgs = IndexMap<String, String>;

fn flag(value: bool) -> String {
    value.to_string()
}

fn storage_key(slot: StorageSlot) -> &'static str {
    match slot {
        StorageSlot::App => STORAGE_APP_SOURCE,
        StorageSlot::Data => STORAGE_DATA_SOURCE,
        StorageSlot::Workspace => STORAGE_WORKSPACE_SOURCE,
    }
}

/// ステージのビルド引数を組み立てる
pub fn build_args(
    view: &EffectiveStageView,
    keys: &BTreeMap<String, UserKeys>,
    storage: &ResolvedStorage,
) -> BuildArgs {
    let stage = view.stage;
    let mut args = BuildArgs::new();
    let mut set = |key: &str, value: String| {
        args.insert(key.to_string(), value);
    };

    set(BASE_IMAGE, view.image.base.clone());
    set(INSTALL_ROOT, CONTAINER_INSTALL_ROOT.to_string());
    set(STAGE_HOST_DIR, ProjectLayout::stage_host_dir(stage));
    set(STAGE_CONTAINER_DIR, ProjectLayout::stage_container_dir(stage));
    set(DEVICE_TYPE, view.device.as_str().to_string());
    if !view.ports.is_empty() {
        let ports: Vec<String> = view.ports.iter().map(|p| p.to_string()).collect();
        set(PORT_MAPPINGS, ports.join(","));
    }

    if stage == StageId::One {
        let ssh = view.ssh.as_ref().filter(|ssh| ssh.enable);
        set(WITH_SSH, flag(ssh.is_some()));
        if let Some(ssh) = ssh {
            let names: Vec<&str> = ssh.users.keys().map(String::as_str).collect();
            let passwords: Vec<&str> = ssh
                .users
                .values()
                .map(|u| u.password.as_deref().unwrap_or(""))
                .collect();
            let uids: Vec<String> = ssh
                .users
                .values()
                .map(|u| u.uid.map(|uid| uid.to_string()).unwrap_or_default())
                .collect();

            set(SSH_CONTAINER_PORT, ssh.port.to_string());
            set(SSH_USER_NAME, names.join(","));
            set(SSH_USER_PASSWORD, passwords.join(","));
            set(SSH_USER_UID, uids.join(","));

            if passwords.iter().any(|p| !p.is_empty()) {
                warn!("SSH passwords are passed as build arguments and remain in the image history");
            }

            let key_files = |slot: KeySlot| -> Option<String> {
                let files: Vec<String> = names
                    .iter()
                    .map(|name| {
                        keys.get(*name)
                            .and_then(|k| match slot {
                                KeySlot::Public => k.public.as_ref(),
                                KeySlot::Private => k.private.as_ref(),
                            })
                            .map(|_| ProjectLayout::container_generated(stage, &slot.file_name(name)))
                            .unwrap_or_default()
                    })
                    .collect();
                files.iter().any(|f| !f.is_empty()).then(|| files.join(","))
            };
            if let Some(files) = key_files(KeySlot::Public) {
                set(SSH_PUBKEY_FILE, files);
            }
            if let Some(files) = key_files(KeySlot::Private) {
                set(SSH_PRIVKEY_FILE, files);
            }
        }
    }

    if let Some(proxy) = &view.proxy {
        if let Some(url) = proxy.http_url() {
            set(PROXY_HTTP, url);
        }
        if let Some(url) = proxy.https_url() {
            set(PROXY_HTTPS, url);
        }
        set(ENABLE_GLOBAL_PROXY, flag(proxy.enable_globally.unwrap_or(false)));
        set(
            REMOVE_GLOBAL_PROXY_AFTER_BUILD,
            flag(proxy.remove_after_build.unwrap_or(false)),
        );
    }

    match &view.apt_mirror {
        AptMirror::Disabled => {}
        AptMirror::SourceFile(path) => set(APT_SOURCE_FILE, ProjectLayout::container_path(path)),
        mirror => {
            if let Some(url) = mirror.url() {
                set(APT_MIRROR_URL, url.to_string());
            }
        }
    }
    if let Some(apt) = &view.apt {
        set(KEEP_APT_SOURCE_FILE, flag(apt.keep_repo_after_build));
        set(APT_USE_PROXY, flag(apt.use_proxy));
        set(KEEP_APT_PROXY_AFTER_BUILD, flag(apt.keep_proxy_after_build));
    }

    if stage == StageId::Two {
        set(STORAGE_HARD_ROOT, STORAGE_HARD_ROOT.to_string());
        set(STORAGE_SOFT_ROOT, STORAGE_SOFT_ROOT.to_string());
        for (slot, selection) in &storage.selections {
            set(storage_key(*slot), selection.as_str().to_string());
        }
    }

    // 環境変数は `${VAR:-default}` を含めてそのまま渡す
    for var in &view.environment {
        set(&var.key, var.value.clone());
    }

    args
}
