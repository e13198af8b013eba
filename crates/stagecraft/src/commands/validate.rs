use super::load_or_exit;
use crate::ProjectArgs;
use colored::Colorize;
use stagecraft_core::MergeState;

pub fn handle(project: &ProjectArgs) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());

    let loaded = load_or_exit(project);
    println!(
        "設定ファイル: {}",
        loaded.config_path.display().to_string().cyan()
    );
    println!("{}", "✓ 設定ファイルは正常です！".green().bold());
    println!();

    println!("サマリー:");
    println!("  プロジェクト: {}", loaded.project_name.cyan());
    let stages = match loaded.effective.state {
        MergeState::StageOneOnly => 1,
        MergeState::StageOneAndTwo => 2,
    };
    println!("  ステージ: {}個", stages);
    for view in loaded.effective.views() {
        let users = view.ssh.as_ref().map(|ssh| ssh.users.len()).unwrap_or(0);
        let mut details = vec![format!("base: {}", view.image.base)];
        if users > 0 {
            details.push(format!("SSH ユーザー {}人", users));
        }
        if !view.mounts.is_empty() {
            details.push(format!("マウント {}個", view.mounts.len()));
        }
        println!(
            "    - {} → {} ({})",
            view.stage.name().cyan(),
            view.image.output,
            details.join(", ")
        );
    }

    Ok(())
}
