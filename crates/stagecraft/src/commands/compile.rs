use super::exit_with_error;
use crate::ProjectArgs;
use colored::Colorize;
use stagecraft_build::{Compiler, WriteOutcome, write_plan};
use std::path::{Path, PathBuf};

fn relative<'a>(path: &'a Path, root: &Path) -> std::borrow::Cow<'a, str> {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy()
}

pub fn handle(project: &ProjectArgs, home: Option<PathBuf>, dry_run: bool) -> anyhow::Result<()> {
    println!("{}", "設定をコンパイル中...".blue());

    let compiler = Compiler::new(project.compile_options(home));
    let plan = compiler.plan().unwrap_or_else(|e| exit_with_error(&e));
    let root = plan.project.project_root.clone();

    println!(
        "プロジェクト: {} ({})",
        plan.project.project_name.cyan(),
        root.display()
    );
    println!(
        "設定ファイル: {}",
        plan.project.config_path.display().to_string().cyan()
    );

    if dry_run {
        println!();
        println!("出力予定のファイル:");
        for file in &plan.files {
            println!("  • {}", relative(&file.path, &root));
        }
        print_warnings(&plan.warnings);
        return Ok(());
    }

    let report = write_plan(plan).unwrap_or_else(|e| exit_with_error(&e));

    println!();
    for file in &report.files {
        let path = relative(&file.path, &root);
        match file.outcome {
            WriteOutcome::Created => println!("  {} {}", "+".green(), path),
            WriteOutcome::Updated => println!("  {} {}", "~".yellow(), path),
            WriteOutcome::Unchanged => println!("  {} {}", "=".dimmed(), (&*path).dimmed()),
        }
    }
    for path in &report.removed {
        println!("  {} {}", "-".red(), relative(path, &root));
    }
    print_warnings(&report.warnings);

    println!();
    let changed = report.changed().count();
    if changed == 0 && report.removed.is_empty() {
        println!("{}", "✓ 変更はありません".green().bold());
    } else {
        println!(
            "{}",
            format!("✓ コンパイル完了（{} 件更新）", changed + report.removed.len())
                .green()
                .bold()
        );
    }
    println!(
        "マニフェスト: {}",
        report.manifest_path.display().to_string().cyan()
    );

    Ok(())
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    for warning in warnings {
        println!("  {} {}", "⚠".yellow(), warning);
    }
}
