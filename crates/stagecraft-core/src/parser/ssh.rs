//! SSH セクションのパース

use super::{Errors, join, port};
use crate::error::FieldErrorKind;
use crate::model::{KeySource, SshSpec, SshUserSpec};
use crate::raw::{RawSsh, RawSshUser, scalar_to_string};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static USER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_-]*$").expect("valid regex"));

pub(super) fn parse_ssh(path: &str, raw: RawSsh, errors: &mut Errors) -> SshSpec {
    let defaults = SshSpec::default();
    let enable = raw.enable.unwrap_or(defaults.enable);
    let port_number = raw
        .port
        .and_then(|p| port(&join(path, "port"), p, errors))
        .unwrap_or(defaults.port);
    let host_port = raw
        .host_port
        .and_then(|p| port(&join(path, "host_port"), p, errors));

    let raw_users = raw.users.unwrap_or_default();
    if enable && raw_users.is_empty() {
        errors.push(join(path, "users"), FieldErrorKind::Required);
    }

    let mut users = BTreeMap::new();
    let mut uids: HashMap<u32, String> = HashMap::new();
    for (name, raw_user) in raw_users {
        let user_path = join(&join(path, "users"), &name);
        if !USER_NAME.is_match(&name) {
            errors.push(
                user_path.as_str(),
                FieldErrorKind::Invalid(format!("ユーザー名として使えません: '{}'", name)),
            );
        }

        let user = parse_user(&user_path, &name, raw_user, errors);
        if let Some(uid) = user.uid
            && let Some(other) = uids.insert(uid, name.clone())
        {
            errors.push(
                join(&user_path, "uid"),
                FieldErrorKind::Duplicate(format!("uid {}（{} と重複）", uid, other)),
            );
        }
        users.insert(name, user);
    }

    SshSpec {
        enable,
        port: port_number,
        host_port,
        users,
    }
}

fn parse_user(path: &str, name: &str, raw: RawSshUser, errors: &mut Errors) -> SshUserSpec {
    let password = raw.password.and_then(|value| {
        let field = join(path, "password");
        let Some(password) = scalar_to_string(&value) else {
            errors.push(
                field,
                FieldErrorKind::Invalid("パスワードは文字列で指定してください".to_string()),
            );
            return None;
        };
        if password.is_empty() || password.contains(',') || password.chars().any(char::is_whitespace) {
            errors.push(field, FieldErrorKind::InvalidPassword);
            return None;
        }
        Some(password)
    });

    let uid = raw.uid.and_then(|value| {
        let field = join(path, "uid");
        let Ok(uid) = u32::try_from(value) else {
            errors.push(
                field,
                FieldErrorKind::OutOfRange {
                    value,
                    min: 0,
                    max: i64::from(u32::MAX),
                },
            );
            return None;
        };
        if uid == 0 && name != "root" {
            errors.push(field, FieldErrorKind::ReservedUid);
            return None;
        }
        Some(uid)
    });

    let sources: Vec<(&'static str, String)> = [
        ("pubkey_text", raw.pubkey_text),
        ("privkey_text", raw.privkey_text),
        ("pubkey_file", raw.pubkey_file),
        ("privkey_file", raw.privkey_file),
    ]
    .into_iter()
    .filter_map(|(field, value)| {
        value
            .filter(|v| !v.trim().is_empty())
            .map(|v| (field, v))
    })
    .collect();

    let key = if sources.len() > 1 {
        errors.push(
            path,
            FieldErrorKind::AmbiguousKeySource(
                sources.iter().map(|(field, _)| field.to_string()).collect(),
            ),
        );
        KeySource::None
    } else {
        match sources.into_iter().next() {
            Some(("pubkey_text", text)) => KeySource::PublicText(text),
            Some(("privkey_text", text)) => KeySource::PrivateText(text),
            Some(("pubkey_file", file)) => KeySource::PublicFile(file.trim().to_string()),
            Some((_, file)) => KeySource::PrivateFile(file.trim().to_string()),
            None => KeySource::None,
        }
    };

    SshUserSpec { password, uid, key }
}
