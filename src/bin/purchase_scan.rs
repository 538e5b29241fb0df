use clap::Parser;
use treehouse::app::report;
use treehouse::core::extraction::PurchaseExtractor;
use treehouse::utils::{logger, validation::Validate};
use treehouse::{
    EtlEngine, LocalMailbox, LocalStorage, PurchasePipeline, Result, ScanConfig, ScanReport,
    TreehouseConfig,
};

async fn scan(args: &ScanConfig, config: &TreehouseConfig) -> Result<ScanReport> {
    let catalog = config.vendor_catalog()?;
    args.validate_vendors(&catalog)?;

    // validate() 已確認 mailbox 存在
    let mailbox_dir = args.mailbox.clone().unwrap_or_default();
    let mailbox = LocalMailbox::open(mailbox_dir, catalog.clone()).await?;

    let extractor = PurchaseExtractor::new(catalog, config.property_table(), config.category_table());
    let settings = args.settings(config);

    // 輸出路徑相對於目前目錄
    let storage = LocalStorage::new(".");
    let mut pipeline = PurchasePipeline::new(storage, mailbox, extractor, settings);
    if args.enqueue {
        pipeline = pipeline.with_review_queue(config.review_queue());
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, args.monitor);
    engine.run().await
}

#[tokio::main]
async fn main() {
    let args = ScanConfig::parse();

    let loaded = TreehouseConfig::load(args.config.as_deref());
    let log_dir = loaded.as_ref().ok().map(TreehouseConfig::log_dir);

    // 初始化日誌
    let log_guard = logger::init(
        args.verbose,
        args.log_json,
        log_dir.as_deref().map(|dir| (dir, "purchase_scan.log")),
    );

    tracing::info!("🚀 Starting purchase scan");
    if args.verbose {
        tracing::debug!("CLI config: {:?}", args);
    }

    // 驗證配置
    if let Err(e) = args.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.severity().exit_code().max(1));
    }

    let config = match loaded.and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    };

    if args.list_vendors {
        match config.vendor_catalog() {
            Ok(catalog) => print!("{}", report::vendor_list(&catalog)),
            Err(e) => {
                eprintln!("❌ {}", e.user_friendly_message());
                std::process::exit(e.severity().exit_code().max(1));
            }
        }
        return;
    }

    match scan(&args, &config).await {
        Ok(scan_report) => {
            if args.table {
                print!("{}", report::scan_table(&scan_report.records));
            } else {
                print!("{}", report::scan_summary(&scan_report.records));
            }

            match &scan_report.output_path {
                Some(path) => println!(
                    "\n✅ Saved {} record(s) to {}",
                    scan_report.records.len(),
                    path
                ),
                None => println!("\n[DRY RUN] Results not saved."),
            }
            if args.enqueue && !args.dry_run {
                println!(
                    "📝 Queued {} record(s) for review ({} already queued)",
                    scan_report.enqueued.len(),
                    scan_report.already_queued
                );
            }
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Purchase scan failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                drop(log_guard);
                std::process::exit(exit_code);
            }
        }
    }
}
