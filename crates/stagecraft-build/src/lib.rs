//! stagecraft build artifact generation
//!
//! This crate turns a validated two-stage configuration into the files the
//! container build consumes: the compose manifest, per-stage lifecycle
//! wrapper scripts, inline script bodies and SSH key files.

pub mod args;
pub mod compiler;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod ssh;
pub mod storage;
pub mod wrapper;
pub mod writer;

pub use args::{BuildArgs, build_args};
pub use compiler::{
    CompileOptions, CompilePlan, CompileReport, Compiler, EmittedFile, FileKind, PlannedFile,
    compile, write_plan,
};
pub use error::{BuildError, Result};
pub use layout::ProjectLayout;
pub use manifest::ComposeManifest;
pub use ssh::{KeyOrigin, KeySlot, ResolvedKey, SshKeyResolver, UserKeys};
pub use storage::{ResolvedStorage, resolve_storage};
pub use wrapper::WrapperRenderer;
pub use writer::{WriteOutcome, write_if_changed};
