use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// 函式庫與各 binary 的 tracing target
const TARGETS: [&str; 4] = ["treehouse", "purchase_scan", "csv_summary", "file_organizer"];

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

fn console_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// 每日輪替的日誌檔 `<log_dir>/<file_name>.YYYY-MM-DD`，一律記錄 debug
///
/// 回傳的 guard 必須存活到程式結束，否則尾端的日誌不會寫出。
pub fn file_layer<S>(log_dir: &Path, file_name: &str) -> std::io::Result<(impl Layer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer::<S>()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .json()
        .with_filter(EnvFilter::new(default_directives(true)));
    Ok((layer, guard))
}

/// 初始化 console 日誌；給了 `log_file`（目錄, 檔名）時另外寫一份到日誌檔
///
/// 日誌目錄無法建立時只警告，console 照常輸出。
pub fn init(verbose: bool, json: bool, log_file: Option<(&Path, &str)>) -> Option<WorkerGuard> {
    let (file, guard) = match log_file.map(|(dir, name)| (dir, file_layer::<Registry>(dir, name))) {
        Some((_, Ok((layer, guard)))) => (Some(layer), Some(guard)),
        Some((dir, Err(e))) => {
            eprintln!("⚠️ Could not create log file in {}: {}", dir.display(), e);
            (None, None)
        }
        None => (None, None),
    };

    let compact = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_filter(console_filter(verbose))
    });

    // 給排程（cron）使用的 JSON 行格式
    let json_lines = json.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json()
            .with_filter(console_filter(verbose))
    });

    tracing_subscriber::registry()
        .with(file)
        .with(compact)
        .with(json_lines)
        .init();

    guard
}

pub fn init_cli_logger(verbose: bool) {
    init(verbose, false, None);
}
