//! 依類型或日期整理目錄裡的檔案

use crate::utils::error::Result;
use chrono::{DateTime, Datelike, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 檔名關鍵字優先於副檔名
const KEYWORD_RULES: [(&str, &[&str]); 5] = [
    ("Invoices", &["invoice", "inv-", "inv_", "bill"]),
    ("Statements", &["statement", "stmt", "bank"]),
    ("Receipts", &["receipt", "rcpt", "purchase"]),
    ("Contracts", &["contract", "agreement", "lease", "msa"]),
    ("Tax", &["tax", "1099", "w2", "w-2", "1040"]),
];

const CATEGORY_RULES: [(&str, &[&str]); 6] = [
    ("Financial", &["pdf", "csv", "xlsx", "xls"]),
    ("Images", &["jpg", "jpeg", "png", "heic", "gif", "webp"]),
    ("Documents", &["doc", "docx", "txt", "rtf", "md"]),
    ("Archives", &["zip", "tar", "gz", "rar", "7z"]),
    ("Presentations", &["ppt", "pptx", "key"]),
    ("Spreadsheets", &["xlsx", "xls", "csv", "numbers"]),
];

pub const OTHER: &str = "Other";

#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrganizeMode {
    /// `Category/`
    #[default]
    ByType,
    /// `YYYY/MM/`，遞迴掃描
    ByDate,
    /// `Category/YYYY/MM/`
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedFile {
    pub file: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeResult {
    pub moved: Vec<MovedFile>,
    pub skipped: Vec<String>,
    pub errors: Vec<FailedFile>,
}

impl OrganizeResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn categorize_file(file_name: &str) -> &'static str {
    let name_lower = file_name.to_lowercase();

    if let Some((category, _)) = KEYWORD_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| name_lower.contains(kw)))
    {
        return *category;
    }

    let ext = Path::new(&name_lower)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    CATEGORY_RULES
        .iter()
        .find(|(_, extensions)| extensions.contains(&ext))
        .map(|(category, _)| *category)
        .unwrap_or(OTHER)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn modified_month(path: &Path) -> Result<PathBuf> {
    let modified: DateTime<Local> = fs::metadata(path)?.modified()?.into();
    Ok(PathBuf::from(modified.year().to_string()).join(format!("{:02}", modified.month())))
}

/// rename 失敗時（例如跨檔案系統）改用複製後刪除
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// 無法解析（例如尚不存在）時沿用原路徑
fn resolved(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn candidates(source: &Path, dest: &Path, mode: OrganizeMode) -> Vec<PathBuf> {
    let depth = match mode {
        OrganizeMode::ByDate => usize::MAX,
        OrganizeMode::ByType | OrganizeMode::Hybrid => 1,
    };
    let dest = resolved(dest);

    WalkDir::new(source)
        .min_depth(1)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        // 目的地在來源底下時不要重複整理；`./sorted`、`a/../sorted` 也算同一處
        .filter_entry(|e| !(e.file_type().is_dir() && resolved(e.path()) == dest))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("⚠️ Cannot read entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && !is_hidden(e.path()))
        .map(|e| e.into_path())
        .collect()
}

fn target_dir(file: &Path, mode: OrganizeMode) -> Result<PathBuf> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    Ok(match mode {
        OrganizeMode::ByType => PathBuf::from(categorize_file(name)),
        OrganizeMode::ByDate => modified_month(file)?,
        OrganizeMode::Hybrid => PathBuf::from(categorize_file(name)).join(modified_month(file)?),
    })
}

pub fn organize(source: &Path, dest: &Path, mode: OrganizeMode, dry_run: bool) -> OrganizeResult {
    let mut result = OrganizeResult::default();

    for file in candidates(source, dest, mode) {
        let Some(file_name) = file.file_name().map(|n| n.to_os_string()) else {
            continue;
        };

        let relative = match target_dir(&file, mode) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!("❌ Error processing {}: {}", file.display(), e);
                result.errors.push(FailedFile {
                    file: file.display().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        let target = dest.join(&relative).join(&file_name);

        if target.exists() {
            tracing::warn!("⚠️ {} already exists, skipping", target.display());
            result.skipped.push(file.display().to_string());
            continue;
        }

        if dry_run {
            tracing::info!(
                "[DRY RUN] Would move {} -> {}/",
                file_name.to_string_lossy(),
                relative.display()
            );
        } else if let Err(e) = move_file(&file, &target) {
            tracing::error!("❌ Error moving {}: {}", file.display(), e);
            result.errors.push(FailedFile {
                file: file.display().to_string(),
                error: e.to_string(),
            });
            continue;
        } else {
            tracing::info!(
                "Moved {} -> {}/",
                file_name.to_string_lossy(),
                relative.display()
            );
        }

        result.moved.push(MovedFile {
            file: file.display().to_string(),
            destination: target.display().to_string(),
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_categorize_by_keyword_first() {
        assert_eq!(categorize_file("invoice-2024-001.pdf"), "Invoices");
        assert_eq!(categorize_file("tax-return-2024.pdf"), "Tax");
        assert_eq!(categorize_file("receipt-amazon-march.pdf"), "Receipts");
        assert_eq!(categorize_file("contract-client-abc.docx"), "Contracts");
        assert_eq!(categorize_file("bank-statement-jan.pdf"), "Statements");
        assert_eq!(categorize_file("invoice-photo.jpg"), "Invoices");
        assert_eq!(categorize_file("INVOICE-2024.PDF"), "Invoices");
    }

    #[test]
    fn test_categorize_by_extension() {
        assert_eq!(categorize_file("random-document.pdf"), "Financial");
        assert_eq!(categorize_file("photo.jpg"), "Images");
        assert_eq!(categorize_file("notes.docx"), "Documents");
        assert_eq!(categorize_file("backup.zip"), "Archives");
        assert_eq!(categorize_file("slides.pptx"), "Presentations");
        assert_eq!(categorize_file("model.numbers"), "Spreadsheets");
        assert_eq!(categorize_file("data.xyz"), OTHER);
        assert_eq!(categorize_file("README"), OTHER);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("invoice-1.pdf"), "x").unwrap();
        fs::write(source.path().join("photo.png"), "x").unwrap();
        fs::write(source.path().join(".DS_Store"), "x").unwrap();

        let result = organize(source.path(), dest.path(), OrganizeMode::ByType, true);

        assert_eq!(result.moved.len(), 2);
        assert!(result.errors.is_empty());
        assert!(source.path().join("invoice-1.pdf").exists());
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_by_type_moves_top_level_only() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::create_dir(source.path().join("nested")).unwrap();
        fs::write(source.path().join("nested/deep.pdf"), "x").unwrap();
        fs::write(source.path().join("lease-2024.pdf"), "x").unwrap();

        let result = organize(source.path(), dest.path(), OrganizeMode::ByType, false);

        assert_eq!(result.moved.len(), 1);
        assert!(dest.path().join("Contracts/lease-2024.pdf").exists());
        assert!(!source.path().join("lease-2024.pdf").exists());
        assert!(source.path().join("nested/deep.pdf").exists());
    }

    #[test]
    fn test_by_date_is_recursive() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::create_dir(source.path().join("sub")).unwrap();
        fs::write(source.path().join("sub/scan.jpg"), "x").unwrap();

        let result = organize(source.path(), dest.path(), OrganizeMode::ByDate, false);

        let now = Local::now();
        let expected = dest
            .path()
            .join(now.year().to_string())
            .join(format!("{:02}", now.month()))
            .join("scan.jpg");
        assert_eq!(result.moved.len(), 1);
        assert!(expected.exists());
    }

    #[test]
    fn test_existing_target_is_skipped() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("notes.txt"), "new").unwrap();
        fs::create_dir_all(dest.path().join("Documents")).unwrap();
        fs::write(dest.path().join("Documents/notes.txt"), "old").unwrap();

        let result = organize(source.path(), dest.path(), OrganizeMode::ByType, false);

        assert!(result.moved.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(
            fs::read_to_string(dest.path().join("Documents/notes.txt")).unwrap(),
            "old"
        );
    }
}
