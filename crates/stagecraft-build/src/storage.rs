//! ストレージ・マウントの解決
//!
//! 固定スロット（app, data, workspace）は `/hard/volume/<slot>` にマウントされ、
//! コンテナ内の `/soft/<slot>` は外部ストレージがあればそちらを、
//! なければイメージ内の `/hard/image/<slot>` を指します。
//! このリンクの切り替え自体はコンテナ側で行われ、ここではビルド引数用の
//! 選択結果だけを決めます。

use crate::layout::STORAGE_HARD_ROOT;
use serde::Serialize;
use stagecraft_core::loader::sanitize_name;
use stagecraft_core::{EffectiveStageView, StorageOption, StorageSlot};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// マウント元
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MountSource {
    /// 名前付きボリューム（manual-volume は既存ボリュームを参照する）
    Volume { name: String, external: bool },
    Bind { host_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountDirective {
    pub source: MountSource,
    pub target: String,
}

impl fmt::Display for MountDirective {
    /// compose の短縮形式（`source:target`）
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            MountSource::Volume { name, .. } => write!(f, "{}:{}", name, self.target),
            MountSource::Bind { host_path } => write!(f, "{}:{}", host_path, self.target),
        }
    }
}

/// 固定スロットの実体の選択
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageSelection {
    Volume,
    Image,
}

impl StorageSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageSelection::Volume => "volume",
            StorageSelection::Image => "image",
        }
    }
}

/// 1 ステージ分の解決結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedStorage {
    /// 固定スロット → 名前付きマウントの順
    pub directives: Vec<MountDirective>,
    pub selections: BTreeMap<StorageSlot, StorageSelection>,
    pub warnings: Vec<String>,
}

impl ResolvedStorage {
    /// 参照される名前付きボリューム
    pub fn volumes(&self) -> impl Iterator<Item = (&str, bool)> {
        self.directives.iter().filter_map(|d| match &d.source {
            MountSource::Volume { name, external } => Some((name.as_str(), *external)),
            MountSource::Bind { .. } => None,
        })
    }
}

/// 自動ボリューム名（再コンパイルしても変わらない）
pub fn storage_volume_name(project_name: &str, slot: StorageSlot) -> String {
    format!("{}-storage-{}", sanitize_name(project_name), slot)
}

pub fn mount_volume_name(project_name: &str, mount: &str) -> String {
    format!("{}-mount-{}", sanitize_name(project_name), sanitize_name(mount))
}

/// 固定スロットのマウント先
pub fn slot_target(slot: StorageSlot) -> String {
    format!("{}/volume/{}", STORAGE_HARD_ROOT, slot)
}

/// ステージのストレージとマウントを解決
pub fn resolve_storage(
    view: &EffectiveStageView,
    project_name: &str,
    project_root: &Path,
) -> ResolvedStorage {
    let mut resolved = ResolvedStorage::default();

    for (slot, option) in &view.storage {
        let source = mount_source(option, || storage_volume_name(project_name, *slot));
        let selection = match source {
            Some(source) => {
                check_host_path(&source, project_root, &mut resolved.warnings);
                resolved.directives.push(MountDirective {
                    source,
                    target: slot_target(*slot),
                });
                StorageSelection::Volume
            }
            None => StorageSelection::Image,
        };
        debug!(slot = %slot, selection = selection.as_str(), "Resolved storage slot");
        resolved.selections.insert(*slot, selection);
    }

    for (name, mount) in &view.mounts {
        let Some(source) = mount_source(&mount.option, || mount_volume_name(project_name, name))
        else {
            continue;
        };
        check_host_path(&source, project_root, &mut resolved.warnings);
        resolved.directives.push(MountDirective {
            source,
            target: mount.dst_path.clone(),
        });
    }

    resolved
}

/// image はマウントしない
fn mount_source(option: &StorageOption, auto_name: impl FnOnce() -> String) -> Option<MountSource> {
    match option {
        StorageOption::Image => None,
        StorageOption::AutoVolume => Some(MountSource::Volume {
            name: auto_name(),
            external: false,
        }),
        StorageOption::ManualVolume { volume_name } => Some(MountSource::Volume {
            name: volume_name.clone(),
            external: true,
        }),
        StorageOption::Host { host_path } => Some(MountSource::Bind {
            host_path: host_path.clone(),
        }),
    }
}

/// ホストパスがなければ警告（ビルドマシンと実行マシンが違うことがあるためエラーにしない）
fn check_host_path(source: &MountSource, project_root: &Path, warnings: &mut Vec<String>) {
    let MountSource::Bind { host_path } = source else {
        return;
    };
    let path = Path::new(host_path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    };
    if !resolved.exists() {
        warn!(host_path = %host_path, "Host path does not exist");
        warnings.push(format!("ホストパスが存在しません: {}", host_path));
    }
}
