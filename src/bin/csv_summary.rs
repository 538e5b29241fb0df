use clap::Parser;
use std::path::PathBuf;
use treehouse::core::csv_summary::{self, AnalysisType, CsvTable, ReportFormat};
use treehouse::utils::logger;
use treehouse::{Result, TreehouseError};

#[derive(Debug, Parser)]
#[command(name = "csv-summary")]
#[command(about = "Analyze CSV data")]
struct Args {
    /// 輸入的 CSV 檔
    input: PathBuf,

    #[arg(long = "type", value_enum, default_value_t = AnalysisType::Full)]
    analysis_type: AnalysisType,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// 另存分析結果（JSON）
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

fn run(args: &Args) -> Result<()> {
    let table = CsvTable::from_path(&args.input).map_err(|e| TreehouseError::ProcessingError {
        message: format!("Error reading CSV: {}", e),
    })?;
    tracing::info!(
        "📊 Loaded {} row(s) x {} column(s) from {}",
        table.rows.len(),
        table.headers.len(),
        args.input.display()
    );

    let analysis = csv_summary::analyze(&table, args.analysis_type);
    println!("{}", csv_summary::generate_report(&analysis, args.format)?);

    if let Some(output) = &args.output {
        std::fs::write(output, csv_summary::generate_report(&analysis, ReportFormat::Json)?)?;
        println!("\nAnalysis saved to: {}", output.display());
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(&args) {
        tracing::error!(
            "❌ CSV summary failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("{}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.severity().exit_code().max(1));
    }
}
