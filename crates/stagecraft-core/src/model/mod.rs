//! モデル定義
//!
//! 検証済みの設定ドキュメントを表す型を定義します。
//! ここにある値はすべて検証を通過したもので、後段のリゾルバーは
//! 存在チェックなどの防御的な処理を必要としません。

mod apt;
mod device;
mod document;
mod environment;
mod port;
mod proxy;
mod script;
mod ssh;
mod storage;

// Re-exports
pub use apt::*;
pub use device::*;
pub use document::*;
pub use environment::*;
pub use port::*;
pub use proxy::*;
pub use script::*;
pub use ssh::*;
pub use storage::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_id_names() {
        assert_eq!(StageId::One.name(), "stage-1");
        assert_eq!(StageId::Two.name(), "stage-2");
        assert_eq!(StageId::One.key(), "stage_1");
        assert_eq!(StageId::Two.number(), 2);
    }

    #[test]
    fn test_lifecycle_hook_wrapper_names() {
        assert_eq!(LifecycleHook::OnBuild.wrapper_name(), "_custom-on-build.sh");
        assert_eq!(
            LifecycleHook::OnUserLogin.wrapper_name(),
            "_custom-on-user-login.sh"
        );
        assert_eq!(LifecycleHook::OnEntry.wrapper_name(), "_custom-on-entry.sh");
        assert_eq!(LifecycleHook::ALL.len(), 5);
    }

    #[test]
    fn test_storage_type_parse() {
        assert_eq!(StorageType::parse("auto-volume"), Some(StorageType::AutoVolume));
        assert_eq!(StorageType::parse("manual-volume"), Some(StorageType::ManualVolume));
        assert_eq!(StorageType::parse("host"), Some(StorageType::Host));
        assert_eq!(StorageType::parse("image"), Some(StorageType::Image));
        assert_eq!(StorageType::parse("tmpfs"), None);
    }

    #[test]
    fn test_apt_mirror_aliases() {
        assert_eq!(AptMirror::parse("tuna"), Some(AptMirror::Tuna));
        assert_eq!(AptMirror::parse("163"), Some(AptMirror::Netease));
        assert_eq!(AptMirror::parse(""), Some(AptMirror::Disabled));
        assert_eq!(AptMirror::parse("default"), Some(AptMirror::Disabled));
        assert_eq!(
            AptMirror::parse("stage-1/system/apt/custom.list"),
            Some(AptMirror::SourceFile("stage-1/system/apt/custom.list".to_string()))
        );
        assert_eq!(AptMirror::parse("tsinghua"), None);
        assert!(AptMirror::Ustc.url().unwrap().contains("ustc"));
    }

    #[test]
    fn test_proxy_overlay_fieldwise() {
        let base = ProxySpec {
            address: Some("proxy.local".to_string()),
            port: Some(7890),
            enable_globally: Some(true),
            remove_after_build: None,
            use_https: Some(false),
        };
        let top = ProxySpec {
            port: Some(8080),
            ..Default::default()
        };

        let merged = base.overlay(&top);
        assert_eq!(merged.address.as_deref(), Some("proxy.local"));
        assert_eq!(merged.port, Some(8080));
        assert_eq!(merged.enable_globally, Some(true));
    }

    #[test]
    fn test_device_type_parse() {
        assert_eq!(DeviceType::parse("GPU"), Some(DeviceType::Gpu));
        assert_eq!(DeviceType::parse("cpu"), Some(DeviceType::Cpu));
        assert_eq!(DeviceType::parse("tpu"), None);
    }
}
