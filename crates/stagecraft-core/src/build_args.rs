//! ビルド引数のキー
//!
//! ビルド定義（Dockerfile）側がこの名前で受け取るため、変更しないこと。

pub const BASE_IMAGE: &str = "BASE_IMAGE";
pub const INSTALL_ROOT: &str = "INSTALL_ROOT";
pub const STAGE_HOST_DIR: &str = "STAGE_HOST_DIR";
pub const STAGE_CONTAINER_DIR: &str = "STAGE_CONTAINER_DIR";
pub const DEVICE_TYPE: &str = "DEVICE_TYPE";
pub const PORT_MAPPINGS: &str = "PORT_MAPPINGS";

pub const WITH_SSH: &str = "WITH_SSH";
pub const SSH_CONTAINER_PORT: &str = "SSH_CONTAINER_PORT";
pub const SSH_USER_NAME: &str = "SSH_USER_NAME";
pub const SSH_USER_PASSWORD: &str = "SSH_USER_PASSWORD";
pub const SSH_USER_UID: &str = "SSH_USER_UID";
pub const SSH_PUBKEY_FILE: &str = "SSH_PUBKEY_FILE";
pub const SSH_PRIVKEY_FILE: &str = "SSH_PRIVKEY_FILE";

pub const PROXY_HTTP: &str = "PROXY_HTTP";
pub const PROXY_HTTPS: &str = "PROXY_HTTPS";
pub const ENABLE_GLOBAL_PROXY: &str = "ENABLE_GLOBAL_PROXY";
pub const REMOVE_GLOBAL_PROXY_AFTER_BUILD: &str = "REMOVE_GLOBAL_PROXY_AFTER_BUILD";

pub const APT_MIRROR_URL: &str = "APT_MIRROR_URL";
pub const APT_SOURCE_FILE: &str = "APT_SOURCE_FILE";
pub const KEEP_APT_SOURCE_FILE: &str = "KEEP_APT_SOURCE_FILE";
pub const APT_USE_PROXY: &str = "APT_USE_PROXY";
pub const KEEP_APT_PROXY_AFTER_BUILD: &str = "KEEP_APT_PROXY_AFTER_BUILD";

pub const STORAGE_HARD_ROOT: &str = "STORAGE_HARD_ROOT";
pub const STORAGE_SOFT_ROOT: &str = "STORAGE_SOFT_ROOT";
pub const STORAGE_APP_SOURCE: &str = "STORAGE_APP_SOURCE";
pub const STORAGE_DATA_SOURCE: &str = "STORAGE_DATA_SOURCE";
pub const STORAGE_WORKSPACE_SOURCE: &str = "STORAGE_WORKSPACE_SOURCE";

/// 環境変数名として使えない予約キー
pub const RESERVED: &[&str] = &[
    BASE_IMAGE,
    INSTALL_ROOT,
    STAGE_HOST_DIR,
    STAGE_CONTAINER_DIR,
    DEVICE_TYPE,
    PORT_MAPPINGS,
    WITH_SSH,
    SSH_CONTAINER_PORT,
    SSH_USER_NAME,
    SSH_USER_PASSWORD,
    SSH_USER_UID,
    SSH_PUBKEY_FILE,
    SSH_PRIVKEY_FILE,
    PROXY_HTTP,
    PROXY_HTTPS,
    ENABLE_GLOBAL_PROXY,
    REMOVE_GLOBAL_PROXY_AFTER_BUILD,
    APT_MIRROR_URL,
    APT_SOURCE_FILE,
    KEEP_APT_SOURCE_FILE,
    APT_USE_PROXY,
    KEEP_APT_PROXY_AFTER_BUILD,
    STORAGE_HARD_ROOT,
    STORAGE_SOFT_ROOT,
    STORAGE_APP_SOURCE,
    STORAGE_DATA_SOURCE,
    STORAGE_WORKSPACE_SOURCE,
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED.contains(&key)
}
