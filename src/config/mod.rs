pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::app::pipelines::purchase_pipeline::{ScanSettings, DEFAULT_OUTPUT};
#[cfg(feature = "cli")]
use crate::core::vendors::{self, VendorCatalog};
#[cfg(feature = "cli")]
use crate::domain::ports::SearchQuery;
#[cfg(feature = "cli")]
use crate::utils::error::{Result, TreehouseError};
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use toml_config::TreehouseConfig;

/// `purchase-scan` 的命令列參數；未指定的數值由設定檔補上
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "purchase-scan")]
#[command(about = "Scan a mailbox export for purchase confirmations")]
pub struct ScanConfig {
    /// 郵件匯出目錄（*.json）
    #[arg(long)]
    pub mailbox: Option<PathBuf>,

    /// 掃描最近幾天
    #[arg(long)]
    pub days: Option<i64>,

    /// 只掃描指定廠商，例如 amazon,homedepot
    #[arg(long, value_delimiter = ',')]
    pub vendors: Vec<String>,

    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: String,

    #[arg(long, help = "Preview without saving results or updating the queue")]
    pub dry_run: bool,

    /// 只處理單一封信
    #[arg(long)]
    pub email_id: Option<String>,

    #[arg(long)]
    pub max_results: Option<usize>,

    #[arg(long, help = "List supported vendors and exit")]
    pub list_vendors: bool,

    #[arg(long, help = "Print every record as a table")]
    pub table: bool,

    #[arg(long, help = "Add low-confidence records to the review queue")]
    pub enqueue: bool,

    /// 低於此信心值才進審核佇列
    #[arg(long)]
    pub threshold: Option<f64>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub log_json: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ScanConfig {
    /// `--vendors "Amazon, HomeDepot"` 與 `amazon,homedepot` 視為相同
    pub fn vendor_keys(&self) -> Vec<String> {
        self.vendors
            .iter()
            .map(|key| vendors::normalize_key(key))
            .filter(|key| !key.is_empty())
            .collect()
    }

    /// 合併命令列與設定檔；命令列優先
    pub fn settings(&self, config: &TreehouseConfig) -> ScanSettings {
        ScanSettings {
            query: SearchQuery::for_vendors(
                self.vendor_keys(),
                self.days.unwrap_or_else(|| config.days()),
                self.max_results.unwrap_or_else(|| config.max_results()),
            ),
            email_id: self.email_id.clone(),
            output: self.output.clone(),
            dry_run: self.dry_run,
            enqueue: self.enqueue,
            review_threshold: self
                .threshold
                .unwrap_or_else(|| config.review_threshold()),
        }
    }

    /// 廠商 key 必須存在於目錄中
    pub fn validate_vendors(&self, catalog: &VendorCatalog) -> Result<()> {
        for key in self.vendor_keys() {
            if catalog.get(&key).is_none() {
                return Err(TreehouseError::InvalidConfigValueError {
                    field: "vendors".to_string(),
                    value: key,
                    reason: format!("Unknown vendor. Available: {}", catalog.keys().join(", ")),
                });
            }
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
impl Validate for ScanConfig {
    fn validate(&self) -> Result<()> {
        if self.list_vendors {
            return Ok(());
        }

        let mailbox = validation::validate_required_field("mailbox", &self.mailbox)?;
        validation::validate_path("mailbox", &mailbox.to_string_lossy())?;
        validation::validate_path("output", &self.output)?;

        if let Some(days) = self.days {
            validation::validate_range("days", days, 1, 36500)?;
        }
        if let Some(max_results) = self.max_results {
            validation::validate_positive_number("max_results", max_results, 1)?;
        }
        if let Some(threshold) = self.threshold {
            validation::validate_range("threshold", threshold, 0.0, 1.0)?;
        }
        if let Some(email_id) = &self.email_id {
            validation::validate_non_empty_string("email_id", email_id)?;
        }

        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ScanConfig {
        ScanConfig::parse_from(std::iter::once("purchase-scan").chain(args.iter().copied()))
    }

    #[test]
    fn test_mailbox_required_unless_listing() {
        assert!(matches!(
            parse(&[]).validate(),
            Err(TreehouseError::MissingConfigError { .. })
        ));
        assert!(parse(&["--list-vendors"]).validate().is_ok());
        assert!(parse(&["--mailbox", "/tmp/mail"]).validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let config = TreehouseConfig::from_toml_str(
            "[scanner]\ndays = 30\nmax_results = 50\nreview_threshold = 0.6\n",
        )
        .unwrap();

        let defaults = parse(&["--mailbox", "m"]).settings(&config);
        assert_eq!(defaults.query.days, 30);
        assert_eq!(defaults.query.max_results, 50);
        assert_eq!(defaults.review_threshold, 0.6);
        assert_eq!(defaults.output, DEFAULT_OUTPUT);

        let overridden = parse(&[
            "--mailbox",
            "m",
            "--days",
            "7",
            "--threshold",
            "0.9",
            "--vendors",
            "amazon,costco",
        ])
        .settings(&config);
        assert_eq!(overridden.query.days, 7);
        assert_eq!(overridden.review_threshold, 0.9);
        assert_eq!(overridden.query.vendors, vec!["amazon", "costco"]);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse(&["--mailbox", "m", "--threshold", "2"]).validate().is_err());
        assert!(parse(&["--mailbox", "m", "--days", "0"]).validate().is_err());

        let catalog = VendorCatalog::builtin().unwrap();
        assert!(parse(&["--vendors", "amazon"]).validate_vendors(&catalog).is_ok());
        assert!(parse(&["--vendors", "sears"]).validate_vendors(&catalog).is_err());
    }

    #[test]
    fn test_vendor_list_with_spaces_and_capitals() {
        let args = parse(&["--mailbox", "m", "--vendors", "Amazon, HomeDepot,"]);
        let catalog = VendorCatalog::builtin().unwrap();

        assert_eq!(args.vendor_keys(), vec!["amazon", "homedepot"]);
        assert!(args.validate_vendors(&catalog).is_ok());

        let settings = args.settings(&TreehouseConfig::default());
        assert_eq!(settings.query.vendors, vec!["amazon", "homedepot"]);
    }
}
