//! ステージのマージ
//!
//! セクションごとの伝播規則を [`PROPAGATION`] 表に集約し、
//! 検証（ステージ専用セクションのチェック）と実効ビューの計算の両方が
//! この表を参照します。新しいセクションを追加するときは表に 1 行足すだけです。

use crate::model::{
    AptMirror, AptSpec, ConfigurationDocument, CustomScriptSpec, DeviceType, EnvVar,
    LifecycleHook, MountSpec, PortMapping, ProxySpec, ScriptDecl, SshSpec, StageId, StageSpec,
    StorageOption, StorageSlot,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// 設定セクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Image,
    Ssh,
    Apt,
    /// apt 設定から導出されるミラー情報
    AptMirror,
    Proxy,
    Device,
    Environment,
    Ports,
    Mount,
    Storage,
    Hook(LifecycleHook),
}

impl Section {
    /// 設定ドキュメント上のパス（ステージ以下）
    pub fn key(&self) -> String {
        match self {
            Section::Image => "image".to_string(),
            Section::Ssh => "ssh".to_string(),
            Section::Apt => "apt".to_string(),
            Section::AptMirror => "apt.repo_source".to_string(),
            Section::Proxy => "proxy".to_string(),
            Section::Device => "device".to_string(),
            Section::Environment => "environment".to_string(),
            Section::Ports => "ports".to_string(),
            Section::Mount => "mount".to_string(),
            Section::Storage => "storage".to_string(),
            Section::Hook(hook) => format!("custom.{}", hook.key()),
        }
    }
}

/// 伝播規則
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// stage_2 の base が未指定なら stage_1 の output を使う
    ChainedImage,
    /// stage_1 でのみ宣言可能。stage_2 のビューには現れない
    StageOneExclusive,
    /// stage_2 でのみ宣言可能
    StageTwoExclusive,
    /// stage_2 が宣言していれば置き換え、なければ stage_1 の実効値を継承
    OverrideIfPresent,
    /// 継承もマージもしない
    IndependentPerStage,
    /// stage_2 が優先、なければ stage_1。連結はしない
    EntryPoint,
    /// stage_1 → stage_2 の順に連結
    Concatenate,
}

pub const PROPAGATION: &[(Section, Propagation)] = &[
    (Section::Image, Propagation::ChainedImage),
    (Section::Ssh, Propagation::StageOneExclusive),
    (Section::Apt, Propagation::StageOneExclusive),
    (Section::AptMirror, Propagation::OverrideIfPresent),
    (Section::Proxy, Propagation::OverrideIfPresent),
    (Section::Device, Propagation::OverrideIfPresent),
    (Section::Environment, Propagation::IndependentPerStage),
    (Section::Ports, Propagation::IndependentPerStage),
    (Section::Mount, Propagation::IndependentPerStage),
    (Section::Storage, Propagation::StageTwoExclusive),
    (Section::Hook(LifecycleHook::OnEntry), Propagation::EntryPoint),
    (Section::Hook(LifecycleHook::OnBuild), Propagation::Concatenate),
    (Section::Hook(LifecycleHook::OnFirstRun), Propagation::Concatenate),
    (Section::Hook(LifecycleHook::OnEveryRun), Propagation::Concatenate),
    (Section::Hook(LifecycleHook::OnUserLogin), Propagation::Concatenate),
];

/// セクションの伝播規則（表にないセクションはステージ独立として扱う）
pub fn propagation(section: Section) -> Propagation {
    PROPAGATION
        .iter()
        .find(|(s, _)| *s == section)
        .map(|(_, p)| *p)
        .unwrap_or(Propagation::IndependentPerStage)
}

/// 指定ステージで宣言できないセクションなら、宣言できるステージを返す
pub fn exclusive_owner(section: Section, stage: StageId) -> Option<StageId> {
    match (propagation(section), stage) {
        (Propagation::StageOneExclusive, StageId::Two) => Some(StageId::One),
        (Propagation::StageTwoExclusive, StageId::One) => Some(StageId::Two),
        _ => None,
    }
}

/// セクション値の合成方法
pub trait SectionValue: Clone {
    /// OverrideIfPresent で両ステージが宣言しているときの合成
    fn overlay(&self, top: &Self) -> Self {
        top.clone()
    }

    /// Concatenate での連結
    fn concat(&self, next: &Self) -> Self {
        next.clone()
    }
}

impl SectionValue for String {}
impl SectionValue for SshSpec {}
impl SectionValue for AptSpec {}
impl SectionValue for AptMirror {}
impl SectionValue for DeviceType {}
impl<K: Clone, V: Clone> SectionValue for BTreeMap<K, V> {}

impl SectionValue for ProxySpec {
    fn overlay(&self, top: &Self) -> Self {
        ProxySpec::overlay(self, top)
    }
}

impl<T: Clone> SectionValue for Vec<T> {
    fn concat(&self, next: &Self) -> Self {
        self.iter().chain(next.iter()).cloned().collect()
    }
}

impl Propagation {
    /// stage_1 の実効値と stage_2 の宣言値から stage_2 の実効値を求める
    pub fn apply<T: SectionValue>(self, one: Option<&T>, two: Option<&T>) -> Option<T> {
        match self {
            Propagation::StageOneExclusive => None,
            Propagation::StageTwoExclusive | Propagation::IndependentPerStage => two.cloned(),
            Propagation::ChainedImage | Propagation::OverrideIfPresent => match (one, two) {
                (Some(one), Some(two)) => Some(one.overlay(two)),
                (one, two) => two.or(one).cloned(),
            },
            Propagation::EntryPoint => two.or(one).cloned(),
            Propagation::Concatenate => match (one, two) {
                (Some(one), Some(two)) => Some(one.concat(two)),
                (one, two) => two.or(one).cloned(),
            },
        }
    }
}

/// マージ状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeState {
    StageOneOnly,
    StageOneAndTwo,
}

/// 宣言元ステージ付きのスクリプト
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedScript {
    pub origin: StageId,
    pub script: ScriptDecl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveImage {
    pub base: String,
    pub output: String,
}

/// ステージの実効ビュー
///
/// 継承の解決はここで完了しており、後段はこの値をそのまま使う。
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveStageView {
    pub stage: StageId,
    pub image: EffectiveImage,
    pub ssh: Option<SshSpec>,
    pub apt: Option<AptSpec>,
    pub apt_mirror: AptMirror,
    pub proxy: Option<ProxySpec>,
    pub device: DeviceType,
    pub environment: Vec<EnvVar>,
    pub ports: Vec<PortMapping>,
    /// stage_2 では 3 スロットすべてが埋まる（未宣言は image）
    pub storage: BTreeMap<StorageSlot, StorageOption>,
    pub mounts: BTreeMap<String, MountSpec>,
    /// on_entry を含む全フック（on_entry は高々 1 件）
    pub hooks: BTreeMap<LifecycleHook, Vec<StagedScript>>,
}

impl EffectiveStageView {
    pub fn hook(&self, hook: LifecycleHook) -> &[StagedScript] {
        self.hooks.get(&hook).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entry(&self) -> Option<&StagedScript> {
        self.hook(LifecycleHook::OnEntry).first()
    }
}

/// マージ結果
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub state: MergeState,
    pub stage_1: EffectiveStageView,
    pub stage_2: Option<EffectiveStageView>,
}

impl EffectiveConfig {
    pub fn views(&self) -> impl Iterator<Item = &EffectiveStageView> {
        std::iter::once(&self.stage_1).chain(self.stage_2.iter())
    }
}

/// 既定の出力イメージタグ
pub fn default_output_tag(project_name: &str, stage: StageId) -> String {
    format!("{}:{}", project_name, stage.name())
}

/// 実効ビューを計算
#[tracing::instrument(skip(doc))]
pub fn merge(doc: &ConfigurationDocument, project_name: &str) -> EffectiveConfig {
    let stage_1 = stage_one_view(&doc.stage_1, project_name);
    let stage_2 = doc
        .stage_2
        .as_ref()
        .map(|spec| stage_two_view(&stage_1, spec, project_name));

    let state = if stage_2.is_some() {
        MergeState::StageOneAndTwo
    } else {
        MergeState::StageOneOnly
    };
    debug!(?state, "Stages merged");

    EffectiveConfig {
        state,
        stage_1,
        stage_2,
    }
}

fn staged_hooks(
    origin: StageId,
    custom: &CustomScriptSpec,
) -> BTreeMap<LifecycleHook, Vec<StagedScript>> {
    LifecycleHook::ALL
        .iter()
        .map(|hook| {
            let scripts = custom
                .hook(*hook)
                .iter()
                .map(|script| StagedScript {
                    origin,
                    script: script.clone(),
                })
                .collect();
            (*hook, scripts)
        })
        .collect()
}

fn stage_one_view(spec: &StageSpec, project_name: &str) -> EffectiveStageView {
    EffectiveStageView {
        stage: StageId::One,
        image: EffectiveImage {
            base: spec.image.base.clone().unwrap_or_default(),
            output: spec
                .image
                .output
                .clone()
                .unwrap_or_else(|| default_output_tag(project_name, StageId::One)),
        },
        ssh: spec.ssh.clone(),
        apt: spec.apt.clone(),
        apt_mirror: spec
            .apt
            .as_ref()
            .map(|apt| apt.mirror.clone())
            .unwrap_or_default(),
        proxy: spec.proxy.clone(),
        device: spec.device.unwrap_or_default(),
        environment: spec.environment.clone().unwrap_or_default(),
        ports: spec.ports.clone().unwrap_or_default(),
        storage: BTreeMap::new(),
        mounts: spec.mount.clone().unwrap_or_default(),
        hooks: staged_hooks(StageId::One, &spec.custom),
    }
}

fn stage_two_view(
    one: &EffectiveStageView,
    spec: &StageSpec,
    project_name: &str,
) -> EffectiveStageView {
    let rule = propagation;

    let own_hooks = staged_hooks(StageId::Two, &spec.custom);
    let hooks = LifecycleHook::ALL
        .iter()
        .map(|hook| {
            let scripts = rule(Section::Hook(*hook))
                .apply(one.hooks.get(hook), own_hooks.get(hook))
                .unwrap_or_default();
            (*hook, scripts)
        })
        .collect();

    let mut storage = rule(Section::Storage)
        .apply(None, spec.storage.as_ref())
        .unwrap_or_default();
    for slot in StorageSlot::ALL {
        storage.entry(slot).or_insert(StorageOption::Image);
    }

    EffectiveStageView {
        stage: StageId::Two,
        image: EffectiveImage {
            base: rule(Section::Image)
                .apply(Some(&one.image.output), spec.image.base.as_ref())
                .unwrap_or_default(),
            output: spec
                .image
                .output
                .clone()
                .unwrap_or_else(|| default_output_tag(project_name, StageId::Two)),
        },
        ssh: rule(Section::Ssh).apply(one.ssh.as_ref(), spec.ssh.as_ref()),
        apt: rule(Section::Apt).apply(one.apt.as_ref(), spec.apt.as_ref()),
        apt_mirror: rule(Section::AptMirror)
            .apply(Some(&one.apt_mirror), None)
            .unwrap_or_default(),
        proxy: rule(Section::Proxy).apply(one.proxy.as_ref(), spec.proxy.as_ref()),
        device: rule(Section::Device)
            .apply(Some(&one.device), spec.device.as_ref())
            .unwrap_or_default(),
        environment: rule(Section::Environment)
            .apply(Some(&one.environment), spec.environment.as_ref())
            .unwrap_or_default(),
        ports: rule(Section::Ports)
            .apply(Some(&one.ports), spec.ports.as_ref())
            .unwrap_or_default(),
        storage,
        mounts: rule(Section::Mount)
            .apply(Some(&one.mounts), spec.mount.as_ref())
            .unwrap_or_default(),
        hooks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageSpec, SshUserSpec};

    fn stage(base: Option<&str>) -> StageSpec {
        StageSpec {
            image: ImageSpec {
                base: base.map(str::to_string),
                output: None,
            },
            ..Default::default()
        }
    }

    fn cmd(line: &str) -> ScriptDecl {
        ScriptDecl::Command(line.to_string())
    }

    fn script_names(scripts: &[StagedScript]) -> Vec<String> {
        scripts
            .iter()
            .map(|s| match &s.script {
                ScriptDecl::Command(line) => line.clone(),
                ScriptDecl::Inline { name, .. } => name.clone(),
            })
            .collect()
    }

    #[test]
    fn test_every_section_has_a_rule() {
        let sections = [
            Section::Image,
            Section::Ssh,
            Section::Apt,
            Section::AptMirror,
            Section::Proxy,
            Section::Device,
            Section::Environment,
            Section::Ports,
            Section::Mount,
            Section::Storage,
        ];
        for section in sections
            .into_iter()
            .chain(LifecycleHook::ALL.map(Section::Hook))
        {
            assert!(
                PROPAGATION.iter().any(|(s, _)| *s == section),
                "missing rule for {:?}",
                section
            );
        }
    }

    #[test]
    fn test_exclusive_owner() {
        assert_eq!(exclusive_owner(Section::Ssh, StageId::Two), Some(StageId::One));
        assert_eq!(exclusive_owner(Section::Apt, StageId::Two), Some(StageId::One));
        assert_eq!(exclusive_owner(Section::Storage, StageId::One), Some(StageId::Two));
        assert_eq!(exclusive_owner(Section::Ssh, StageId::One), None);
        assert_eq!(exclusive_owner(Section::Proxy, StageId::Two), None);
    }

    #[test]
    fn test_stage_one_only() {
        let doc = ConfigurationDocument {
            stage_1: stage(Some("ubuntu:24.04")),
            stage_2: None,
        };
        let config = merge(&doc, "demo");

        assert_eq!(config.state, MergeState::StageOneOnly);
        assert!(config.stage_2.is_none());
        assert_eq!(config.stage_1.image.base, "ubuntu:24.04");
        assert_eq!(config.stage_1.image.output, "demo:stage-1");
        assert!(config.stage_1.storage.is_empty());
        assert_eq!(config.views().count(), 1);
    }

    #[test]
    fn test_stage_two_base_inherits_stage_one_output() {
        let mut one = stage(Some("ubuntu:24.04"));
        one.image.output = Some("me/base:1".to_string());
        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(stage(None)),
        };
        let config = merge(&doc, "demo");
        let two = config.stage_2.unwrap();

        assert_eq!(two.image.base, "me/base:1");
        assert_eq!(two.image.output, "demo:stage-2");
    }

    #[test]
    fn test_ssh_is_not_copied_into_stage_two() {
        let mut one = stage(Some("ubuntu:24.04"));
        let mut ssh = SshSpec::default();
        ssh.users.insert("me".to_string(), SshUserSpec::default());
        one.ssh = Some(ssh);
        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(stage(None)),
        };
        let config = merge(&doc, "demo");

        assert!(config.stage_1.ssh.is_some());
        assert!(config.stage_2.unwrap().ssh.is_none());
    }

    #[test]
    fn test_apt_mirror_is_inherited() {
        let mut one = stage(Some("ubuntu:24.04"));
        one.apt = Some(AptSpec {
            mirror: AptMirror::Tuna,
            ..Default::default()
        });
        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(stage(None)),
        };
        let two = merge(&doc, "demo").stage_2.unwrap();

        assert!(two.apt.is_none());
        assert_eq!(two.apt_mirror, AptMirror::Tuna);
    }

    #[test]
    fn test_proxy_override_is_fieldwise() {
        let mut one = stage(Some("ubuntu:24.04"));
        one.proxy = Some(ProxySpec {
            address: Some("10.0.0.1".to_string()),
            port: Some(7890),
            enable_globally: Some(true),
            ..Default::default()
        });
        let mut two = stage(None);
        two.proxy = Some(ProxySpec {
            enable_globally: Some(false),
            ..Default::default()
        });
        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(two),
        };
        let proxy = merge(&doc, "demo").stage_2.unwrap().proxy.unwrap();

        assert_eq!(proxy.address.as_deref(), Some("10.0.0.1"));
        assert_eq!(proxy.port, Some(7890));
        assert_eq!(proxy.enable_globally, Some(false));
    }

    #[test]
    fn test_device_override_if_present() {
        let mut one = stage(Some("ubuntu:24.04"));
        one.device = Some(DeviceType::Gpu);
        let doc = ConfigurationDocument {
            stage_1: one.clone(),
            stage_2: Some(stage(None)),
        };
        assert_eq!(merge(&doc, "d").stage_2.unwrap().device, DeviceType::Gpu);

        let mut two = stage(None);
        two.device = Some(DeviceType::Cpu);
        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(two),
        };
        assert_eq!(merge(&doc, "d").stage_2.unwrap().device, DeviceType::Cpu);
    }

    #[test]
    fn test_environment_and_ports_are_independent() {
        let mut one = stage(Some("ubuntu:24.04"));
        one.environment = Some(vec![EnvVar::new("A", "1")]);
        one.ports = Some(vec![PortMapping::new(8080, 80)]);
        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(stage(None)),
        };
        let two = merge(&doc, "demo").stage_2.unwrap();

        assert!(two.environment.is_empty());
        assert!(two.ports.is_empty());
        assert!(two.mounts.is_empty());
    }

    #[test]
    fn test_entry_point_override_not_concatenation() {
        let mut one = stage(Some("ubuntu:24.04"));
        one.custom.on_entry = Some(cmd("a.sh"));
        let mut two = stage(None);
        two.custom.on_entry = Some(cmd("b.sh"));
        let doc = ConfigurationDocument {
            stage_1: one.clone(),
            stage_2: Some(two),
        };
        let view = merge(&doc, "demo").stage_2.unwrap();
        assert_eq!(script_names(view.hook(LifecycleHook::OnEntry)), vec!["b.sh"]);
        assert_eq!(view.entry().unwrap().origin, StageId::Two);

        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(stage(None)),
        };
        let view = merge(&doc, "demo").stage_2.unwrap();
        assert_eq!(script_names(view.hook(LifecycleHook::OnEntry)), vec!["a.sh"]);
        assert_eq!(view.entry().unwrap().origin, StageId::One);
    }

    #[test]
    fn test_lifecycle_hooks_concatenate_in_stage_order() {
        let mut one = stage(Some("ubuntu:24.04"));
        one.custom.on_build = vec![cmd("x.sh")];
        one.custom.on_first_run = vec![cmd("first-1.sh")];
        let mut two = stage(None);
        two.custom.on_build = vec![cmd("y.sh")];
        let doc = ConfigurationDocument {
            stage_1: one,
            stage_2: Some(two),
        };
        let config = merge(&doc, "demo");
        let view = config.stage_2.unwrap();

        assert_eq!(script_names(view.hook(LifecycleHook::OnBuild)), vec!["x.sh", "y.sh"]);
        assert_eq!(
            view.hook(LifecycleHook::OnBuild)
                .iter()
                .map(|s| s.origin)
                .collect::<Vec<_>>(),
            vec![StageId::One, StageId::Two]
        );
        assert_eq!(
            script_names(view.hook(LifecycleHook::OnFirstRun)),
            vec!["first-1.sh"]
        );
        assert_eq!(
            script_names(config.stage_1.hook(LifecycleHook::OnBuild)),
            vec!["x.sh"]
        );
    }

    #[test]
    fn test_storage_slots_default_to_image() {
        let mut two = stage(None);
        let mut storage = BTreeMap::new();
        storage.insert(StorageSlot::Data, StorageOption::AutoVolume);
        two.storage = Some(storage);
        let doc = ConfigurationDocument {
            stage_1: stage(Some("ubuntu:24.04")),
            stage_2: Some(two),
        };
        let view = merge(&doc, "demo").stage_2.unwrap();

        assert_eq!(view.storage.len(), 3);
        assert_eq!(view.storage[&StorageSlot::Data], StorageOption::AutoVolume);
        assert_eq!(view.storage[&StorageSlot::App], StorageOption::Image);
        assert_eq!(view.storage[&StorageSlot::Workspace], StorageOption::Image);
    }
}
