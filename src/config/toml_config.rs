use crate::core::review_queue::ReviewQueue;
use crate::core::vendors::{KeywordRule, KeywordTable, VendorCatalog, VendorDefinition};
use crate::utils::error::{Result, TreehouseError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_ENV: &str = "TREEHOUSE_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "treehouse.toml";
pub const QUEUE_FILE_NAME: &str = "review_queue.json";
pub const ARCHIVE_FILE_NAME: &str = "review_queue_archive.json";

pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.8;
pub const DEFAULT_SCAN_DAYS: i64 = 365;
pub const DEFAULT_MAX_RESULTS: usize = 500;

/// `treehouse.toml`；所有區段都可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreehouseConfig {
    pub paths: PathsConfig,
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub config_dir: Option<PathBuf>,
    pub queue_file: Option<PathBuf>,
    pub archive_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub review_threshold: Option<f64>,
    pub days: Option<i64>,
    pub max_results: Option<usize>,
    /// 額外的廠商；同 key 會取代內建設定
    pub vendors: Vec<VendorDefinition>,
    pub property_keywords: Option<Vec<KeywordRule>>,
    pub category_keywords: Option<Vec<KeywordRule>>,
}

/// `$TREEHOUSE_CONFIG_DIR`，否則 `~/.config/treehouse`
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".config").join("treehouse"))
        .unwrap_or_else(|| PathBuf::from(".treehouse"))
}

impl TreehouseConfig {
    /// 明確指定的檔案必須存在；預設位置沒有檔案時使用內建預設值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::debug!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        let path = default_config_dir().join(CONFIG_FILE_NAME);
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            Self::from_file(&path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TreehouseError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TreehouseError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${HOME})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn config_dir(&self) -> PathBuf {
        self.paths
            .config_dir
            .clone()
            .unwrap_or_else(default_config_dir)
    }

    pub fn queue_file(&self) -> PathBuf {
        self.paths
            .queue_file
            .clone()
            .unwrap_or_else(|| self.config_dir().join(QUEUE_FILE_NAME))
    }

    pub fn archive_file(&self) -> PathBuf {
        self.paths
            .archive_file
            .clone()
            .unwrap_or_else(|| self.config_dir().join(ARCHIVE_FILE_NAME))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.paths
            .log_dir
            .clone()
            .unwrap_or_else(|| self.config_dir().join("logs"))
    }

    pub fn review_threshold(&self) -> f64 {
        self.scanner
            .review_threshold
            .unwrap_or(DEFAULT_REVIEW_THRESHOLD)
    }

    pub fn days(&self) -> i64 {
        self.scanner.days.unwrap_or(DEFAULT_SCAN_DAYS)
    }

    pub fn max_results(&self) -> usize {
        self.scanner.max_results.unwrap_or(DEFAULT_MAX_RESULTS)
    }

    pub fn review_queue(&self) -> ReviewQueue {
        ReviewQueue::new(self.queue_file(), self.archive_file())
    }

    pub fn vendor_catalog(&self) -> Result<VendorCatalog> {
        VendorCatalog::with_extra(self.scanner.vendors.clone())
    }

    pub fn property_table(&self) -> KeywordTable {
        let table = KeywordTable::property_defaults();
        match &self.scanner.property_keywords {
            Some(rules) => table.with_overrides(rules.clone()),
            None => table,
        }
    }

    pub fn category_table(&self) -> KeywordTable {
        let table = KeywordTable::category_defaults();
        match &self.scanner.category_keywords {
            Some(rules) => table.with_overrides(rules.clone()),
            None => table,
        }
    }
}

impl Validate for TreehouseConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_range(
            "scanner.review_threshold",
            self.review_threshold(),
            0.0,
            1.0,
        )?;
        validation::validate_range("scanner.days", self.days(), 1, 36500)?;
        validation::validate_positive_number("scanner.max_results", self.max_results(), 1)?;

        for (field, path) in [
            ("paths.queue_file", self.queue_file()),
            ("paths.archive_file", self.archive_file()),
        ] {
            validation::validate_path(field, &path.to_string_lossy())?;
        }

        if self.queue_file() == self.archive_file() {
            return Err(TreehouseError::ConfigValidationError {
                field: "paths.archive_file".to_string(),
                message: "Archive file must differ from the queue file".to_string(),
            });
        }

        for vendor in &self.scanner.vendors {
            validation::validate_non_empty_string("scanner.vendors.key", &vendor.key)?;
            validation::validate_non_empty_string("scanner.vendors.name", &vendor.name)?;
        }
        // 正規表達式在建立目錄時編譯檢查
        self.vendor_catalog()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TreehouseConfig::from_toml_str("").unwrap();

        assert_eq!(config.review_threshold(), 0.8);
        assert_eq!(config.days(), 365);
        assert_eq!(config.max_results(), 500);
        assert!(config.queue_file().ends_with("review_queue.json"));
        assert!(config.archive_file().ends_with("review_queue_archive.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[paths]
config_dir = "/srv/treehouse"
archive_file = "/srv/archive/done.json"

[scanner]
review_threshold = 0.7
days = 30

[[scanner.vendors]]
key = "harborfreight"
name = "Harbor Freight"
domains = ["harborfreight.com"]
subject_patterns = ["Your Harbor Freight Order"]

[[scanner.property_keywords]]
code = "LAKE"
keywords = ["lake house", "Lakeway"]

[[scanner.category_keywords]]
code = "TOOL"
keywords = ["impact driver"]
"#;

        let config = TreehouseConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.queue_file(), PathBuf::from("/srv/treehouse/review_queue.json"));
        assert_eq!(config.archive_file(), PathBuf::from("/srv/archive/done.json"));
        assert_eq!(config.review_threshold(), 0.7);
        assert_eq!(config.days(), 30);
        assert_eq!(config.max_results(), 500);

        let catalog = config.vendor_catalog().unwrap();
        assert_eq!(
            catalog.identify("deals@harborfreight.com").map(|v| v.key.as_str()),
            Some("harborfreight")
        );

        assert_eq!(config.property_table().best_match("Lakeway TX"), Some("LAKE"));
        let categories = config.category_table();
        assert_eq!(categories.best_match("Milwaukee impact driver"), Some("TOOL"));
        assert_eq!(categories.best_match("cordless drill"), None);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TREEHOUSE_TEST_QUEUE", "/tmp/env-queue.json");

        let config =
            TreehouseConfig::from_toml_str("[paths]\nqueue_file = \"${TREEHOUSE_TEST_QUEUE}\"\n")
                .unwrap();
        assert_eq!(config.queue_file(), PathBuf::from("/tmp/env-queue.json"));

        std::env::remove_var("TREEHOUSE_TEST_QUEUE");
    }

    #[test]
    fn test_config_validation() {
        let config = TreehouseConfig::from_toml_str("[scanner]\nreview_threshold = 1.5\n").unwrap();
        assert!(config.validate().is_err());

        let config = TreehouseConfig::from_toml_str("[scanner]\nmax_results = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = TreehouseConfig::from_toml_str(
            "[[scanner.vendors]]\nkey = \"bad\"\nname = \"Bad\"\nfrom_patterns = [\"(\"]\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(TreehouseError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = TreehouseConfig::from_toml_str("[scanner\nbroken");
        assert!(matches!(
            result,
            Err(TreehouseError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[scanner]\nmax_results = 25\n")
            .unwrap();

        let config = TreehouseConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.max_results(), 25);

        let explicit = TreehouseConfig::load(Some(temp_file.path())).unwrap();
        assert_eq!(explicit.max_results(), 25);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = TreehouseConfig::load(Some(Path::new("/nonexistent/treehouse.toml")));
        assert!(matches!(result, Err(TreehouseError::IoError(_))));
    }
}
