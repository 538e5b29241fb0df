use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use treehouse::core::organizer::{self, OrganizeMode};
use treehouse::utils::{logger, validation};
use treehouse::{Result, TreehouseError};

#[derive(Debug, Parser)]
#[command(name = "file-organizer")]
#[command(about = "Organize files by type or date")]
#[command(group(ArgGroup::new("layout").args(["mode", "by_type", "by_date", "hybrid"])))]
struct Args {
    /// 來源目錄
    source: PathBuf,

    /// 目的目錄
    destination: PathBuf,

    #[arg(long, value_enum)]
    mode: Option<OrganizeMode>,

    #[arg(long, help = "Organize by file type")]
    by_type: bool,

    #[arg(long, help = "Organize by date")]
    by_date: bool,

    #[arg(long, help = "Organize by type, then date")]
    hybrid: bool,

    #[arg(long, help = "Show what would be done without moving")]
    dry_run: bool,

    #[arg(long, help = "Output results to JSON file")]
    output_json: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

impl Args {
    fn organize_mode(&self) -> OrganizeMode {
        if let Some(mode) = self.mode {
            mode
        } else if self.by_date {
            OrganizeMode::ByDate
        } else if self.hybrid {
            OrganizeMode::Hybrid
        } else {
            OrganizeMode::ByType
        }
    }
}

/// 有檔案處理失敗時回傳 false
fn run(args: &Args) -> Result<bool> {
    validation::validate_path("source", &args.source.to_string_lossy())?;
    if !args.source.is_dir() {
        return Err(TreehouseError::InvalidConfigValueError {
            field: "source".to_string(),
            value: args.source.display().to_string(),
            reason: "Source directory does not exist".to_string(),
        });
    }

    if !args.dry_run {
        std::fs::create_dir_all(&args.destination)?;
    }

    let mode = args.organize_mode();
    tracing::info!(
        "🚀 Organizing {} -> {} ({:?})",
        args.source.display(),
        args.destination.display(),
        mode
    );

    let result = organizer::organize(&args.source, &args.destination, mode, args.dry_run);

    println!("\nSummary:");
    println!("  Moved: {} files", result.moved.len());
    println!("  Skipped: {} files", result.skipped.len());
    println!("  Errors: {} files", result.errors.len());

    if let Some(path) = &args.output_json {
        std::fs::write(path, serde_json::to_string_pretty(&result)?)?;
        tracing::info!("💾 Results written to {}", path.display());
    }

    Ok(result.is_success())
}

fn main() {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("❌ {} (Category: {:?})", e, e.category());
            eprintln!("{}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    }
}
