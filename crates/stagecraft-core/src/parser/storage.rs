//! ストレージ・マウントセクションのパース

use super::{Errors, join};
use crate::error::FieldErrorKind;
use crate::loader::sanitize_name;
use crate::model::{MountSpec, StorageOption, StorageSlot, StorageType};
use crate::raw::RawStorage;
use std::collections::{BTreeMap, HashMap};

/// 固定スロット（app, data, workspace）をパース
pub(super) fn parse_storage(
    path: &str,
    raw: BTreeMap<String, RawStorage>,
    errors: &mut Errors,
) -> BTreeMap<StorageSlot, StorageOption> {
    let mut storage = BTreeMap::new();

    for (name, raw_option) in raw {
        let slot_path = join(path, &name);
        let Some(slot) = StorageSlot::parse(&name) else {
            errors.push(
                slot_path,
                FieldErrorKind::Invalid(format!(
                    "不明なストレージスロット '{}'（app, data, workspace）",
                    name
                )),
            );
            continue;
        };
        if raw_option.dst_path.is_some() {
            errors.push(
                join(&slot_path, "dst_path"),
                FieldErrorKind::Invalid(
                    "ストレージスロットのマウント先は固定です".to_string(),
                ),
            );
        }
        if let Some(option) = parse_option(&slot_path, &raw_option, true, errors) {
            storage.insert(slot, option);
        }
    }
    storage
}

/// 任意の名前付きマウントをパース
pub(super) fn parse_mounts(
    path: &str,
    raw: BTreeMap<String, RawStorage>,
    errors: &mut Errors,
) -> BTreeMap<String, MountSpec> {
    let mut mounts = BTreeMap::new();
    let mut destinations: HashMap<String, String> = HashMap::new();
    // auto-volume の名前はマウント名を正規化して作るため、正規化後も一意であること
    let mut volume_keys: HashMap<String, String> = HashMap::new();

    for (name, raw_option) in raw {
        let mount_path = join(path, &name);
        let option = parse_option(&mount_path, &raw_option, false, errors);

        if option == Some(StorageOption::AutoVolume)
            && let Some(other) = volume_keys.insert(sanitize_name(&name), name.clone())
        {
            errors.push(
                mount_path.clone(),
                FieldErrorKind::Duplicate(format!(
                    "自動ボリューム名が {} と同じになります",
                    other
                )),
            );
        }

        let dst_field = join(&mount_path, "dst_path");
        let dst_path = match raw_option.dst_path.filter(|d| !d.trim().is_empty()) {
            None => {
                errors.push(dst_field, FieldErrorKind::Required);
                None
            }
            Some(dst) if !dst.starts_with('/') => {
                errors.push(dst_field, FieldErrorKind::NotAbsolute(dst));
                None
            }
            Some(dst) => {
                if let Some(other) = destinations.insert(dst.clone(), name.clone()) {
                    errors.push(
                        dst_field,
                        FieldErrorKind::Duplicate(format!("{}（{} と重複）", dst, other)),
                    );
                }
                Some(dst)
            }
        };

        if let (Some(option), Some(dst_path)) = (option, dst_path) {
            mounts.insert(name, MountSpec { option, dst_path });
        }
    }
    mounts
}

fn parse_option(
    path: &str,
    raw: &RawStorage,
    allow_image: bool,
    errors: &mut Errors,
) -> Option<StorageOption> {
    let type_field = join(path, "type");
    let Some(type_name) = raw.storage_type.as_deref() else {
        errors.push(type_field, FieldErrorKind::Required);
        return None;
    };
    let Some(storage_type) = StorageType::parse(type_name) else {
        errors.push(
            type_field,
            FieldErrorKind::Invalid(format!(
                "不明なストレージタイプ '{}'（auto-volume, manual-volume, host, image）",
                type_name
            )),
        );
        return None;
    };

    let companion = |value: &Option<String>, field: &'static str, errors: &mut Errors| {
        let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty());
        if value.is_none() {
            errors.push(
                join(path, field),
                FieldErrorKind::MissingCompanion {
                    storage_type: storage_type.as_str(),
                    field,
                },
            );
        }
        value.map(str::to_string)
    };

    match storage_type {
        StorageType::AutoVolume => Some(StorageOption::AutoVolume),
        StorageType::Image if allow_image => Some(StorageOption::Image),
        StorageType::Image => {
            errors.push(type_field, FieldErrorKind::ImageMountNotAllowed);
            None
        }
        StorageType::ManualVolume => companion(&raw.volume_name, "volume_name", errors)
            .map(|volume_name| StorageOption::ManualVolume { volume_name }),
        StorageType::Host => companion(&raw.host_path, "host_path", errors)
            .map(|host_path| StorageOption::Host { host_path }),
    }
}
