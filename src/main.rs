use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use treehouse::app::report;
use treehouse::core::review_queue::{ListFilter, ReviewQueue};
use treehouse::domain::model::{ItemStatus, ItemType};
use treehouse::utils::{logger, validation, validation::Validate};
use treehouse::{Result, TreehouseConfig, TreehouseError};

#[derive(Debug, Parser)]
#[command(name = "treehouse-queue")]
#[command(about = "Review queue manager for the Treehouse asset pipeline")]
#[command(group(ArgGroup::new("action").required(true)))]
struct Args {
    #[arg(long, group = "action", help = "List review items")]
    list: bool,

    #[arg(long, group = "action", value_name = "ID", help = "Show item details")]
    show: Option<String>,

    #[arg(long, group = "action", value_name = "ID", help = "Approve an item")]
    approve: Option<String>,

    #[arg(long, group = "action", value_name = "ID", help = "Reject an item")]
    reject: Option<String>,

    #[arg(long, group = "action", value_name = "ID", help = "Modify an item's data")]
    modify: Option<String>,

    #[arg(long, group = "action", help = "Add a new item")]
    add: bool,

    #[arg(long, group = "action", value_name = "FILE", help = "Export approved items to file")]
    export: Option<PathBuf>,

    #[arg(long, group = "action", help = "Show queue statistics")]
    stats: bool,

    #[arg(long, group = "action", help = "Archive approved/rejected items")]
    clear_approved: bool,

    #[arg(long, group = "action", value_name = "ID", help = "Archive a synced approved item")]
    mark_processed: Option<String>,

    /// 包含所有狀態（搭配 --list）
    #[arg(long)]
    all: bool,

    #[arg(long, value_enum)]
    status: Option<ItemStatus>,

    #[arg(long = "type", value_enum)]
    item_type: Option<ItemType>,

    #[arg(long, help = "Rejection reason (with --reject)")]
    reason: Option<String>,

    #[arg(long = "json", value_name = "JSON", help = "JSON data (with --add/--modify)")]
    json_data: Option<String>,

    #[arg(long)]
    suggested_action: Option<String>,

    #[arg(long, help = "Notes (with --add/--approve)")]
    notes: Option<String>,

    #[arg(long, help = "Output in JSON format")]
    output_json: bool,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    log_json: bool,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn required_json(args: &Args, action: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    let raw = args
        .json_data
        .as_deref()
        .ok_or_else(|| TreehouseError::MissingConfigError {
            field: format!("--json (with {})", action),
        })?;
    validation::validate_json_object(raw)
}

fn run(args: &Args, queue: &ReviewQueue, config: &TreehouseConfig) -> Result<()> {
    let notes = args.notes.as_deref().unwrap_or("");

    if args.list {
        let filter = ListFilter {
            include_all: args.all,
            status: args.status,
            item_type: args.item_type,
        };
        let items = queue.list_items(&filter)?;
        if args.output_json {
            print_json(&items)?;
        } else {
            print!("{}", report::queue_table(&items));
        }
    } else if let Some(id) = &args.show {
        let item = queue.get_item(id)?;
        if args.output_json {
            print_json(&item)?;
        } else {
            print!("{}", report::item_details(&item));
        }
    } else if let Some(id) = &args.approve {
        let item = queue.approve_item(id, notes)?;
        println!("Approved: {}", item.id);
        println!("Summary: {}", item.summary());
    } else if let Some(id) = &args.reject {
        let reason = args.reason.as_deref().unwrap_or("");
        let item = queue.reject_item(id, reason)?;
        println!("Rejected: {}", item.id);
        println!("Summary: {}", item.summary());
        if !reason.is_empty() {
            println!("Reason: {}", reason);
        }
    } else if let Some(id) = &args.modify {
        let modifications = required_json(args, "--modify")?;
        let item = queue.modify_item(id, modifications)?;
        println!("Modified: {}", item.id);
        println!("Status changed to: {}", item.status);
        if args.output_json {
            print_json(&item)?;
        }
    } else if args.add {
        let item_type = validation::validate_required_field("--type (with --add)", &args.item_type)?;
        let data = required_json(args, "--add")?;
        let item = queue.add_item(
            *item_type,
            data,
            args.suggested_action.as_deref().unwrap_or(""),
            notes,
        )?;
        println!("Added: {}", item.id);
        println!("Type: {}", item.item_type);
        println!("Summary: {}", item.summary());
    } else if let Some(path) = &args.export {
        let count = queue.export_approved(path)?;
        println!("Exported {} approved item(s) to: {}", count, path.display());
    } else if args.stats {
        let stats = queue.statistics()?;
        if args.output_json {
            print_json(&stats)?;
        } else {
            print!("{}", report::statistics(&stats));
        }
    } else if args.clear_approved {
        let count = queue.clear_approved()?;
        println!("Archived {} item(s) (approved + rejected)", count);
        println!("Archive location: {}", config.archive_file().display());
    } else if let Some(id) = &args.mark_processed {
        if queue.mark_item_processed(id)? {
            println!("Processed: {}", id);
        } else {
            return Err(TreehouseError::ValidationError {
                message: format!("Item {} is not an approved item in the queue", id),
            });
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    let loaded = TreehouseConfig::load(args.config.as_deref());
    let log_dir = loaded.as_ref().ok().map(TreehouseConfig::log_dir);

    // 初始化日誌
    let log_guard = logger::init(
        args.verbose,
        args.log_json,
        log_dir.as_deref().map(|dir| (dir, "treehouse_queue.log")),
    );
    tracing::debug!("CLI args: {:?}", args);

    let result = loaded.and_then(|config| {
        config.validate()?;
        let queue = config.review_queue();
        tracing::debug!("Using review queue at {}", queue.queue_path().display());
        run(&args, &queue, &config)
    });

    if let Err(e) = result {
        tracing::error!(
            "❌ Review queue operation failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());

        let exit_code = e.severity().exit_code();
        if exit_code > 0 {
            // exit 不會執行 drop，先把日誌檔寫完
            drop(log_guard);
            std::process::exit(exit_code);
        }
    }
}
