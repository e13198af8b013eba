mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stagecraft")]
#[command(about = "2 ステージのコンテナ作業環境を、1 つの設定ファイルから組み立てる", long_about = None)]
struct Cli {
    /// 詳細ログを表示（RUST_LOG より優先）
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// プロジェクトの指定（全コマンド共通）
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// プロジェクトディレクトリ（省略時はカレントから上方向に探索）
    #[arg(short = 'p', long = "project-dir")]
    pub project_dir: Option<PathBuf>,

    /// 設定ファイル（相対パスはプロジェクトディレクトリから解決）
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// プロジェクト名（イメージタグ・ボリューム名の接頭辞。省略時はディレクトリ名）
    #[arg(long)]
    pub project_name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 設定をコンパイルし、マニフェストと生成スクリプトを出力
    Compile {
        #[command(flatten)]
        project: ProjectArgs,
        /// システム鍵（`~`）を探すホームディレクトリ
        #[arg(long)]
        home: Option<PathBuf>,
        /// 書き込まずに出力予定のファイルだけ表示
        #[arg(long)]
        dry_run: bool,
    },
    /// 設定を検証（ファイルは書き込まない）
    Validate {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// ステージの実効設定を表示
    Show {
        #[command(flatten)]
        project: ProjectArgs,
        /// 表示するステージ（1 または 2。省略時は両方）
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=2))]
        stage: Option<u8>,
        /// YAML ではなく JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile {
            project,
            home,
            dry_run,
        } => commands::compile::handle(&project, home, dry_run),
        Commands::Validate { project } => commands::validate::handle(&project),
        Commands::Show {
            project,
            stage,
            json,
        } => commands::show::handle(&project, stage, json),
        Commands::Version => {
            println!("stagecraft {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
