//! コンパイル全体の統合
//!
//! 設定のロードから鍵・ストレージ・スクリプトの解決、ビルド引数と
//! マニフェストの組み立てまでをすべてメモリ上で行い（[`CompilePlan`]）、
//! 失敗しうる処理がすべて終わってからファイルを書き込みます。

use crate::args::{BuildArgs, build_args};
use crate::error::Result;
use crate::layout::ProjectLayout;
use crate::manifest::ComposeManifest;
use crate::ssh::{KeySlot, SshKeyResolver, UserKeys};
use crate::storage::resolve_storage;
use crate::wrapper::{GeneratedScript, WrapperRenderer, inline_scripts};
use crate::writer::{MANIFEST_MODE, SCRIPT_MODE, WriteOutcome, prune_stale, write_if_changed};
use serde::Serialize;
use stagecraft_core::{
    EffectiveStageView, LoadOptions, LoadedProject, StageId, find_project_root,
    load_project_from_root,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// 生成ファイルの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Manifest,
    Wrapper,
    InlineScript,
    PublicKey,
    PrivateKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub kind: FileKind,
    pub content: String,
    pub mode: u32,
}

/// ステージごとの解決結果
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub stage: StageId,
    pub args: BuildArgs,
    pub keys: BTreeMap<String, UserKeys>,
}

/// 書き込み前の計画
#[derive(Debug, Clone)]
pub struct CompilePlan {
    pub project: LoadedProject,
    pub manifest: ComposeManifest,
    pub stages: Vec<StagePlan>,
    pub files: Vec<PlannedFile>,
    pub warnings: Vec<String>,
}

impl CompilePlan {
    pub fn file(&self, path: &Path) -> Option<&PlannedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn stage(&self, stage: StageId) -> Option<&StagePlan> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub kind: FileKind,
    pub outcome: WriteOutcome,
}

/// コンパイル結果
#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub project_name: String,
    pub manifest_path: PathBuf,
    pub files: Vec<EmittedFile>,
    /// 設定から消えたため削除した生成ファイル
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl CompileReport {
    pub fn changed(&self) -> impl Iterator<Item = &EmittedFile> {
        self.files
            .iter()
            .filter(|f| f.outcome != WriteOutcome::Unchanged)
    }
}

/// コンパイルの指定
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// プロジェクトディレクトリ（省略時は発見）
    pub project_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    /// システム鍵を探すホームディレクトリ（省略時は `dirs::home_dir()`）
    pub home_dir: Option<PathBuf>,
    pub project_name: Option<String>,
}

impl CompileOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: Some(project_dir.into()),
            ..Default::default()
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_home_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(path.into());
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }
}

pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// すべてを解決し、書き込む内容を決める（ファイルには触れない）
    #[instrument(skip(self))]
    pub fn plan(&self) -> Result<CompilePlan> {
        let project_root = match &self.options.project_dir {
            Some(dir) => dir.clone(),
            None => find_project_root()?,
        };
        let project = load_project_from_root(
            &project_root,
            &LoadOptions {
                config_path: self.options.config_path.clone(),
                project_name: self.options.project_name.clone(),
            },
        )?;
        let home_dir = self.options.home_dir.clone().or_else(dirs::home_dir);
        let layout = ProjectLayout::new(&project.project_root);
        let renderer = WrapperRenderer::new()?;

        let mut manifest = ComposeManifest::new();
        let mut stages = Vec::new();
        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for view in project.effective.views() {
            let stage = view.stage;
            debug!(stage = %stage, "Resolving stage");

            let keys = resolve_keys(view, &layout, home_dir.clone())?;
            let storage = resolve_storage(view, &project.project_name, &project.project_root);
            warnings.extend(storage.warnings.iter().cloned());

            let args = build_args(view, &keys, &storage);
            manifest.add_stage(view, &args, &storage);

            let generated_dir = layout.generated_dir(stage);
            let scripts: [(FileKind, Vec<GeneratedScript>); 2] = [
                (FileKind::Wrapper, renderer.render_stage(view)?),
                (FileKind::InlineScript, inline_scripts(view)?),
            ];
            for (kind, scripts) in scripts {
                files.extend(scripts.into_iter().map(|s| PlannedFile {
                    path: generated_dir.join(&s.file_name),
                    kind,
                    content: s.content,
                    mode: SCRIPT_MODE,
                }));
            }

            for key in keys.values().flat_map(UserKeys::iter) {
                files.push(PlannedFile {
                    path: key.path.clone(),
                    kind: match key.slot {
                        KeySlot::Public => FileKind::PublicKey,
                        KeySlot::Private => FileKind::PrivateKey,
                    },
                    content: key.content.clone(),
                    mode: key.slot.mode(),
                });
            }

            stages.push(StagePlan { stage, args, keys });
        }

        files.push(PlannedFile {
            path: layout.manifest_path(),
            kind: FileKind::Manifest,
            content: manifest.to_yaml()?,
            mode: MANIFEST_MODE,
        });

        info!(
            files = files.len(),
            warnings = warnings.len(),
            "Compile plan ready"
        );

        Ok(CompilePlan {
            project,
            manifest,
            stages,
            files,
            warnings,
        })
    }

    /// 計画を立ててから書き込む
    #[instrument(skip(self))]
    pub fn compile(&self) -> Result<CompileReport> {
        let plan = self.plan()?;
        write_plan(plan)
    }
}

/// SSH が有効なステージのユーザー鍵を解決
fn resolve_keys(
    view: &EffectiveStageView,
    layout: &ProjectLayout,
    home_dir: Option<PathBuf>,
) -> Result<BTreeMap<String, UserKeys>> {
    let Some(ssh) = view.ssh.as_ref().filter(|ssh| ssh.enable) else {
        return Ok(BTreeMap::new());
    };
    let resolver = SshKeyResolver::new(
        layout.installation_root(),
        layout.generated_dir(view.stage),
        home_dir,
    );
    ssh.users
        .iter()
        .map(|(user, spec)| Ok((user.clone(), resolver.resolve(user, spec)?)))
        .collect()
}

/// 計画をディスクに書き込む
pub fn write_plan(plan: CompilePlan) -> Result<CompileReport> {
    let layout = ProjectLayout::new(&plan.project.project_root);

    let mut emitted = Vec::with_capacity(plan.files.len());
    for file in &plan.files {
        let outcome = write_if_changed(&file.path, file.content.as_bytes(), file.mode)?;
        emitted.push(EmittedFile {
            path: file.path.clone(),
            kind: file.kind,
            outcome,
        });
    }

    let mut removed = Vec::new();
    for stage in StageId::ALL {
        let dir = layout.generated_dir(stage);
        let keep: BTreeSet<String> = plan
            .files
            .iter()
            .filter(|f| f.path.parent() == Some(dir.as_path()))
            .filter_map(|f| f.path.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        removed.extend(prune_stale(&dir, &keep)?);
    }

    let report = CompileReport {
        project_name: plan.project.project_name.clone(),
        manifest_path: layout.manifest_path(),
        files: emitted,
        removed,
        warnings: plan.warnings,
    };
    info!(
        project = %report.project_name,
        changed = report.changed().count(),
        removed = report.removed.len(),
        "Compile completed"
    );
    Ok(report)
}

/// 指定に従ってコンパイル
pub fn compile(options: CompileOptions) -> Result<CompileReport> {
    Compiler::new(options).compile()
}
