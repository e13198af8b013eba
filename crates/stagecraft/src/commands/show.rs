use super::load_or_exit;
use crate::ProjectArgs;
use colored::Colorize;
use stagecraft_core::{EffectiveStageView, StageId};

pub fn handle(project: &ProjectArgs, stage: Option<u8>, json: bool) -> anyhow::Result<()> {
    let loaded = load_or_exit(project);

    let views: Vec<&EffectiveStageView> = match stage {
        Some(number) => {
            let id = if number == 1 { StageId::One } else { StageId::Two };
            match loaded.effective.views().find(|v| v.stage == id) {
                Some(view) => vec![view],
                None => {
                    eprintln!(
                        "{}",
                        format!("✗ {} は宣言されていません", id.key()).red().bold()
                    );
                    std::process::exit(1);
                }
            }
        }
        None => loaded.effective.views().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    for view in views {
        println!("{}", format!("# {}", view.stage.name()).bold());
        print!("{}", serde_yaml::to_string(view)?);
    }
    Ok(())
}
