//! 生成ファイルの書き込み
//!
//! 内容が変わらないファイルには触れないため、何度 compile しても
//! タイムスタンプやビルドキャッシュが無駄に更新されません。

use crate::error::{BuildError, Result};
use crate::wrapper::INLINE_PREFIX;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 鍵ファイル名の接頭辞（`temp-<user>-pubkey.pub` など）
const KEY_PREFIX: &str = "temp-";

pub const SCRIPT_MODE: u32 = 0o755;
pub const MANIFEST_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

fn emit_error(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Emit {
        path: path.to_path_buf(),
        source,
    }
}

/// 内容が異なる場合だけ書き込む
///
/// 内容が同じでもパーミッションが違えば直す。
pub fn write_if_changed(path: &Path, content: &[u8], mode: u32) -> Result<WriteOutcome> {
    let outcome = match fs::read(path) {
        Ok(existing) if existing == content => WriteOutcome::Unchanged,
        Ok(_) => WriteOutcome::Updated,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => WriteOutcome::Created,
        Err(e) => return Err(emit_error(path)(e)),
    };

    match outcome {
        WriteOutcome::Created => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(emit_error(parent))?;
            }
            write_new(path, content, mode)?;
        }
        WriteOutcome::Updated => {
            // 秘密鍵の上書きでは、内容を書く前にパーミッションを絞る
            set_mode(path, mode)?;
            fs::write(path, content).map_err(emit_error(path))?;
        }
        WriteOutcome::Unchanged => {}
    }
    set_mode(path, mode)?;

    debug!(path = %path.display(), ?outcome, "Wrote file");
    Ok(outcome)
}

/// 作成時点から指定のパーミッションで書く（umask 分はあとで set_mode が直す）
#[cfg(unix)]
fn write_new(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .map_err(emit_error(path))?;
    file.write_all(content).map_err(emit_error(path))
}

#[cfg(not(unix))]
fn write_new(path: &Path, content: &[u8], _mode: u32) -> Result<()> {
    fs::write(path, content).map_err(emit_error(path))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path).map_err(emit_error(path))?.permissions();
    if perms.mode() & 0o777 != mode {
        perms.set_mode(mode);
        fs::set_permissions(path, perms).map_err(emit_error(path))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// generated ディレクトリから今回出力しなかった鍵・インラインスクリプトを削除
///
/// 設定から消えたユーザーの鍵がイメージに残らないようにする。
/// それ以外のファイルには触れない。
pub fn prune_stale(dir: &Path, keep: &BTreeSet<String>) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(emit_error(dir)(e)),
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(emit_error(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let managed = name.starts_with(KEY_PREFIX) || name.starts_with(INLINE_PREFIX);
        if !managed || keep.contains(&name) || !entry.path().is_file() {
            continue;
        }
        let path = entry.path();
        fs::remove_file(&path).map_err(emit_error(&path))?;
        debug!(path = %path.display(), "Removed stale generated file");
        removed.push(path);
    }
    removed.sort();
    Ok(removed)
}
