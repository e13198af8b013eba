//! compose マニフェスト（docker-compose.yml）の生成
//!
//! マップはすべて `IndexMap` で保持し、挿入順のまま出力します。
//! 同じ入力からは常にバイト単位で同じ YAML が得られます。

use crate::args::BuildArgs;
use crate::error::Result;
use crate::layout::ProjectLayout;
use crate::storage::ResolvedStorage;
use indexmap::IndexMap;
use serde::Serialize;
use stagecraft_core::{DeviceType, EffectiveStageView, StageId};

/// ファイル先頭に付けるコメント
pub const MANIFEST_HEADER: &str =
    "# stagecraft により生成されたファイルです。直接編集せず stagecraft compile を再実行してください。\n";

/// プロキシの既定アドレスをコンテナから引けるようにする
const HOST_GATEWAY: &str = "host.docker.internal:host-gateway";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeManifest {
    pub services: IndexMap<String, ServiceEntry>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub volumes: IndexMap<String, VolumeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub image: String,
    pub build: BuildSection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    pub extra_hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,
    pub stdin_open: bool,
    pub tty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSection {
    pub context: String,
    pub dockerfile: String,
    pub args: BuildArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deploy {
    pub resources: Resources,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resources {
    pub reservations: Reservations,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reservations {
    pub devices: Vec<DeviceReservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReservation {
    pub driver: String,
    pub count: String,
    pub capabilities: Vec<String>,
}

impl Deploy {
    /// すべての GPU を予約
    pub fn gpu() -> Self {
        Self {
            resources: Resources {
                reservations: Reservations {
                    devices: vec![DeviceReservation {
                        driver: "nvidia".to_string(),
                        count: "all".to_string(),
                        capabilities: vec!["gpu".to_string()],
                    }],
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeEntry {
    /// compose のプロジェクト名を前置させないため明示する
    pub name: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

impl ComposeManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// ステージのサービスを追加
    pub fn add_stage(
        &mut self,
        view: &EffectiveStageView,
        args: &BuildArgs,
        storage: &ResolvedStorage,
    ) {
        for (name, external) in storage.volumes() {
            self.volumes
                .entry(name.to_string())
                .or_insert_with(|| VolumeEntry {
                    name: name.to_string(),
                    external,
                });
        }
        self.services
            .insert(view.stage.name().to_string(), service(view, args, storage));
    }

    pub fn service(&self, stage: StageId) -> Option<&ServiceEntry> {
        self.services.get(stage.name())
    }

    /// ヘッダー付きの YAML 文字列
    pub fn to_yaml(&self) -> Result<String> {
        let body = serde_yaml::to_string(self)?;
        Ok(format!("{}{}", MANIFEST_HEADER, body))
    }
}

/// compose の変数展開から守るため `$` を `$$` にする
pub fn escape_interpolation(value: &str) -> String {
    value.replace('$', "$$")
}

fn service(view: &EffectiveStageView, args: &BuildArgs, storage: &ResolvedStorage) -> ServiceEntry {
    let mut ports = Vec::new();
    if let Some(ssh) = view.ssh.as_ref().filter(|ssh| ssh.enable)
        && let Some(host_port) = ssh.host_port
    {
        ports.push(format!("{}:{}", host_port, ssh.port));
    }
    for port in view.ports.iter().map(|p| p.to_string()) {
        if !ports.contains(&port) {
            ports.push(port);
        }
    }

    // 展開をそのまま通すのは環境変数だけ
    let is_env = |key: &str| view.environment.iter().any(|var| var.key == key);
    let args = args
        .iter()
        .map(|(key, value)| {
            let value = if is_env(key) {
                value.clone()
            } else {
                escape_interpolation(value)
            };
            (key.clone(), value)
        })
        .collect();

    ServiceEntry {
        image: escape_interpolation(&view.image.output),
        build: BuildSection {
            context: ".".to_string(),
            dockerfile: ProjectLayout::dockerfile(view.stage),
            args,
        },
        ports,
        environment: view
            .environment
            .iter()
            .map(|var| (var.key.clone(), var.value.clone()))
            .collect(),
        volumes: storage
            .directives
            .iter()
            .map(|d| escape_interpolation(&d.to_string()))
            .collect(),
        extra_hosts: vec![HOST_GATEWAY.to_string()],
        deploy: (view.device == DeviceType::Gpu).then(Deploy::gpu),
        stdin_open: true,
        tty: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::build_args;
    use crate::storage::resolve_storage;
    use stagecraft_core::{
        ConfigurationDocument, EnvVar, ImageSpec, MountSpec, PortMapping, SshSpec, SshUserSpec,
        StageSpec, StorageOption, StorageSlot, merge,
    };
    use std::collections::BTreeMap;
    use std::path::Path;

    fn manifest_for(doc: &ConfigurationDocument) -> ComposeManifest {
        let effective = merge(doc, "demo");
        let mut manifest = ComposeManifest::new();
        for view in effective.views() {
            let storage = resolve_storage(view, "demo", Path::new("/nonexistent"));
            let args = build_args(view, &BTreeMap::new(), &storage);
            manifest.add_stage(view, &args, &storage);
        }
        manifest
    }

    fn stage_1() -> StageSpec {
        StageSpec {
            image: ImageSpec {
                base: Some("ubuntu:24.04".to_string()),
                output: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_single_stage_service() {
        let mut spec = stage_1();
        let mut ssh = SshSpec {
            host_port: Some(2222),
            ..Default::default()
        };
        ssh.users.insert(
            "me".to_string(),
            SshUserSpec {
                password: Some("123456".to_string()),
                ..Default::default()
            },
        );
        spec.ssh = Some(ssh);
        spec.ports = Some(vec![PortMapping::new(8080, 80)]);
        spec.environment = Some(vec![
            EnvVar::new("B", "2"),
            EnvVar::new("A", "${A:-1}"),
        ]);
        let doc = ConfigurationDocument {
            stage_1: spec,
            stage_2: None,
        };

        let manifest = manifest_for(&doc);
        assert_eq!(manifest.services.len(), 1);
        assert!(manifest.volumes.is_empty());

        let service = manifest.service(StageId::One).unwrap();
        assert_eq!(service.image, "demo:stage-1");
        assert_eq!(service.build.dockerfile, "stage-1.Dockerfile");
        assert_eq!(service.ports, vec!["2222:22", "8080:80"]);
        assert_eq!(
            service.environment.keys().collect::<Vec<_>>(),
            vec!["B", "A"]
        );
        assert!(service.deploy.is_none());
    }

    #[test]
    fn test_two_stages_with_volumes_and_gpu() {
        let mut storage = BTreeMap::new();
        storage.insert(StorageSlot::Data, StorageOption::AutoVolume);
        let mut mounts = BTreeMap::new();
        mounts.insert(
            "shared".to_string(),
            MountSpec {
                option: StorageOption::ManualVolume {
                    volume_name: "team-shared".to_string(),
                },
                dst_path: "/shared".to_string(),
            },
        );
        let doc = ConfigurationDocument {
            stage_1: StageSpec {
                device: Some(DeviceType::Gpu),
                ..stage_1()
            },
            stage_2: Some(StageSpec {
                storage: Some(storage),
                mount: Some(mounts),
                ..Default::default()
            }),
        };

        let manifest = manifest_for(&doc);
        assert_eq!(
            manifest.services.keys().collect::<Vec<_>>(),
            vec!["stage-1", "stage-2"]
        );

        let two = manifest.service(StageId::Two).unwrap();
        assert_eq!(two.build.args["BASE_IMAGE"], "demo:stage-1");
        assert_eq!(
            two.volumes,
            vec!["demo-storage-data:/hard/volume/data", "team-shared:/shared"]
        );
        // device は継承される
        assert_eq!(two.deploy, Some(Deploy::gpu()));

        assert!(!manifest.volumes["demo-storage-data"].external);
        assert!(manifest.volumes["team-shared"].external);

        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.starts_with(MANIFEST_HEADER));
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            value["volumes"]["team-shared"]["external"],
            serde_yaml::Value::Bool(true)
        );
        assert!(value["volumes"]["demo-storage-data"].get("external").is_none());
        assert_eq!(
            value["services"]["stage-2"]["deploy"]["resources"]["reservations"]["devices"][0]
                ["capabilities"][0],
            serde_yaml::Value::String("gpu".to_string())
        );
    }

    #[test]
    fn test_dollar_is_escaped_outside_environment() {
        let mut spec = stage_1();
        let mut ssh = SshSpec::default();
        ssh.users.insert(
            "me".to_string(),
            SshUserSpec {
                password: Some("pa$word".to_string()),
                ..Default::default()
            },
        );
        spec.ssh = Some(ssh);
        spec.environment = Some(vec![EnvVar::new("CACHE", "${HOME:-/tmp}/cache")]);
        let mut mounts = BTreeMap::new();
        mounts.insert(
            "data".to_string(),
            MountSpec {
                option: StorageOption::Host {
                    host_path: "/srv/$data".to_string(),
                },
                dst_path: "/data".to_string(),
            },
        );
        spec.mount = Some(mounts);
        let doc = ConfigurationDocument {
            stage_1: spec,
            stage_2: None,
        };

        let manifest = manifest_for(&doc);
        let service = manifest.service(StageId::One).unwrap();
        assert_eq!(service.build.args["SSH_USER_PASSWORD"], "pa$$word");
        assert_eq!(service.build.args["CACHE"], "${HOME:-/tmp}/cache");
        assert_eq!(service.environment["CACHE"], "${HOME:-/tmp}/cache");
        assert_eq!(service.volumes, vec!["/srv/$$data:/data"]);

        let value: serde_yaml::Value = serde_yaml::from_str(&manifest.to_yaml().unwrap()).unwrap();
        assert_eq!(
            value["services"]["stage-1"]["build"]["args"]["SSH_USER_PASSWORD"].as_str(),
            Some("pa$$word")
        );
    }

    #[test]
    fn test_ssh_port_not_published_twice() {
        let mut spec = stage_1();
        spec.ssh = Some(SshSpec {
            host_port: Some(2222),
            ..Default::default()
        });
        spec.ports = Some(vec![PortMapping::new(2222, 22), PortMapping::new(8080, 80)]);
        let doc = ConfigurationDocument {
            stage_1: spec,
            stage_2: None,
        };

        let manifest = manifest_for(&doc);
        assert_eq!(
            manifest.service(StageId::One).unwrap().ports,
            vec!["2222:22", "8080:80"]
        );
    }

    #[test]
    fn test_yaml_is_deterministic() {
        let doc = ConfigurationDocument {
            stage_1: stage_1(),
            stage_2: Some(StageSpec::default()),
        };
        assert_eq!(
            manifest_for(&doc).to_yaml().unwrap(),
            manifest_for(&doc).to_yaml().unwrap()
        );
    }
}
