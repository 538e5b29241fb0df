//! CSV 資料摘要與財務分析

use crate::utils::error::{Result, TreehouseError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

const DATE_KEYWORDS: [&str; 5] = ["date", "time", "created", "updated", "timestamp"];
const AMOUNT_KEYWORDS: [&str; 7] = ["amount", "balance", "total", "price", "cost", "revenue", "fee"];
const CATEGORY_KEYWORDS: [&str; 5] = ["category", "type", "status", "group", "class"];
const ID_KEYWORDS: [&str; 4] = ["id", "number", "ref", "code"];

/// 視為缺值的儲存格內容
const MISSING_MARKERS: [&str; 7] = ["", "na", "n/a", "nan", "null", "none", "#n/a"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisType {
    Basic,
    Financial,
    #[default]
    Full,
}

#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim().to_lowercase().as_str())
}

/// 讀進記憶體的 CSV；缺值以 `None` 表示
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl CsvTable {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let row = (0..headers.len())
                .map(|i| {
                    record
                        .get(i)
                        .filter(|cell| !is_missing(cell))
                        .map(|cell| cell.trim().to_string())
                })
                .collect();
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows.iter().map(move |row| row[index].as_deref())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 依內容推斷欄位型別
    pub fn dtype(&self, index: usize) -> &'static str {
        let values: Vec<&str> = self.column(index).flatten().collect();
        let has_missing = values.len() < self.rows.len();

        if values.is_empty() {
            return "float64";
        }
        if values.iter().all(|v| v.parse::<i64>().is_ok()) {
            // 有缺值的整數欄會升為浮點
            return if has_missing { "float64" } else { "int64" };
        }
        if values.iter().all(|v| v.parse::<f64>().is_ok()) {
            return "float64";
        }
        if !has_missing && values.iter().all(|v| matches!(*v, "True" | "False" | "true" | "false")) {
            return "bool";
        }
        "object"
    }

    fn numeric_values(&self, index: usize) -> Vec<f64> {
        self.column(index)
            .flatten()
            .filter_map(|v| v.parse::<f64>().ok())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypes {
    pub date_cols: Vec<String>,
    pub amount_cols: Vec<String>,
    pub category_cols: Vec<String>,
    pub id_cols: Vec<String>,
}

/// 依欄名判斷用途，第一個符合的群組勝出
pub fn detect_column_types(headers: &[String]) -> ColumnTypes {
    let mut types = ColumnTypes::default();

    for col in headers {
        let lower = col.to_lowercase();
        let has = |keywords: &[&str]| keywords.iter().any(|kw| lower.contains(kw));

        if has(&DATE_KEYWORDS) {
            types.date_cols.push(col.clone());
        } else if has(&AMOUNT_KEYWORDS) {
            types.amount_cols.push(col.clone());
        } else if has(&CATEGORY_KEYWORDS) {
            types.category_cols.push(col.clone());
        } else if has(&ID_KEYWORDS) {
            types.id_cols.push(col.clone());
        }
    }

    types
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicSummary {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub dtypes: BTreeMap<String, String>,
    pub missing_values: BTreeMap<String, usize>,
    pub memory_usage_mb: f64,
}

pub fn basic_summary(table: &CsvTable) -> BasicSummary {
    let mut dtypes = BTreeMap::new();
    let mut missing_values = BTreeMap::new();

    for (i, col) in table.headers.iter().enumerate() {
        dtypes.insert(col.clone(), table.dtype(i).to_string());
        missing_values.insert(col.clone(), table.column(i).filter(Option::is_none).count());
    }

    // 概算：儲存格位元組 + 每格一個指標 + 索引
    let cell_bytes: usize = table
        .rows
        .iter()
        .flatten()
        .map(|cell| cell.as_ref().map_or(0, String::len))
        .sum();
    let pointer_bytes = table.rows.len() * table.headers.len() * std::mem::size_of::<usize>();
    let bytes = cell_bytes + pointer_bytes + 128;

    BasicSummary {
        row_count: table.rows.len(),
        column_count: table.headers.len(),
        columns: table.headers.clone(),
        dtypes,
        missing_values,
        memory_usage_mb: bytes as f64 / 1024.0 / 1024.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub count: usize,
    pub mean: f64,
    /// 少於兩筆時無樣本標準差
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

impl NumericStats {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;
        let std = (count > 1).then(|| {
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            round2(variance.sqrt())
        });

        Some(Self {
            count,
            mean: round2(mean),
            std,
            min: round2(values.iter().cloned().fold(f64::INFINITY, f64::min)),
            max: round2(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
            sum: round2(sum),
        })
    }
}

pub fn numeric_summary(table: &CsvTable) -> BTreeMap<String, NumericStats> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| matches!(table.dtype(*i), "int64" | "float64"))
        .filter_map(|(i, col)| {
            NumericStats::from_values(&table.numeric_values(i)).map(|s| (col.clone(), s))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub column: String,
    pub start: String,
    pub end: String,
    pub span_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountSummary {
    pub column: String,
    pub total: f64,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
    pub average: f64,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub sum: f64,
    pub count: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub column: String,
    pub breakdown: BTreeMap<String, CategoryStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amounts: Option<AmountSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_category: Option<CategoryBreakdown>,
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// 去掉貨幣符號與千分位
pub fn parse_amount(value: &str) -> Option<f64> {
    value.replace(['$', ','], "").trim().parse::<f64>().ok()
}

fn date_range(table: &CsvTable, column: &str) -> Option<DateRange> {
    let index = table.column_index(column)?;
    // 任何一格無法解析就放棄這一欄
    let dates: Option<Vec<NaiveDate>> = table.column(index).flatten().map(parse_date).collect();
    let dates = dates?;

    let start = *dates.iter().min()?;
    let end = *dates.iter().max()?;
    Some(DateRange {
        column: column.to_string(),
        start: start.format("%Y-%m-%d").to_string(),
        end: end.format("%Y-%m-%d").to_string(),
        span_days: (end - start).num_days(),
    })
}

fn amount_values(table: &CsvTable, index: usize) -> Vec<Option<f64>> {
    table
        .column(index)
        .map(|cell| {
            cell.and_then(|raw| {
                let parsed = parse_amount(raw);
                if parsed.is_none() {
                    tracing::warn!("⚠️ Ignoring non-numeric amount '{}'", raw);
                }
                parsed
            })
        })
        .collect()
}

pub fn financial_analysis(table: &CsvTable, types: &ColumnTypes) -> FinancialAnalysis {
    let mut analysis = FinancialAnalysis {
        date_range: types.date_cols.iter().find_map(|col| date_range(table, col)),
        ..Default::default()
    };

    let Some((amount_col, amount_index)) = types
        .amount_cols
        .first()
        .and_then(|col| table.column_index(col).map(|i| (col, i)))
    else {
        return analysis;
    };

    let amounts = amount_values(table, amount_index);
    let present: Vec<f64> = amounts.iter().flatten().copied().collect();
    let income: f64 = present.iter().filter(|v| **v > 0.0).sum();
    let expenses: f64 = present.iter().filter(|v| **v < 0.0).sum::<f64>().abs();
    let average = if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    };

    analysis.amounts = Some(AmountSummary {
        column: amount_col.clone(),
        total: round2(present.iter().sum()),
        income: round2(income),
        expenses: round2(expenses),
        net: round2(round2(income) - round2(expenses)),
        average: round2(average),
        transaction_count: table.rows.len(),
    });

    if let Some((cat_col, cat_index)) = types
        .category_cols
        .first()
        .and_then(|col| table.column_index(col).map(|i| (col, i)))
    {
        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (category, amount) in table.column(cat_index).zip(amounts.iter()) {
            // 沒有分類的列不列入分組
            let Some(category) = category else { continue };
            let entry = groups.entry(category.to_string()).or_default();
            if let Some(amount) = amount {
                entry.push(*amount);
            }
        }

        let breakdown = groups
            .into_iter()
            .map(|(key, values)| {
                let sum: f64 = values.iter().sum();
                let mean = if values.is_empty() { 0.0 } else { sum / values.len() as f64 };
                (
                    key,
                    CategoryStats {
                        sum: round2(sum),
                        count: values.len(),
                        mean: round2(mean),
                    },
                )
            })
            .collect();

        analysis.by_category = Some(CategoryBreakdown {
            column: cat_col.clone(),
            breakdown,
        });
    }

    analysis
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<BTreeMap<String, NumericStats>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial: Option<FinancialAnalysis>,
}

pub fn analyze(table: &CsvTable, analysis_type: AnalysisType) -> Analysis {
    let mut analysis = Analysis::default();

    if matches!(analysis_type, AnalysisType::Basic | AnalysisType::Full) {
        analysis.basic = Some(basic_summary(table));
        analysis.numeric = Some(numeric_summary(table));
    }

    if matches!(analysis_type, AnalysisType::Financial | AnalysisType::Full) {
        let types = detect_column_types(&table.headers);
        tracing::debug!("Detected column types: {:?}", types);
        analysis.financial = Some(financial_analysis(table, &types));
    }

    analysis
}

/// 千分位格式，小數兩位
fn money(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, group_thousands(int_part), frac_part)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn count(value: usize) -> String {
    group_thousands(&value.to_string())
}

pub fn generate_report(analysis: &Analysis, format: ReportFormat) -> Result<String> {
    if format == ReportFormat::Json {
        return serde_json::to_string_pretty(analysis).map_err(TreehouseError::from);
    }

    let rule = "=".repeat(60);
    let thin = "-".repeat(40);
    let mut lines = vec![
        rule.clone(),
        "DATA SUMMARY REPORT".to_string(),
        format!("Generated: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")),
        rule,
        String::new(),
    ];

    if let Some(basic) = &analysis.basic {
        lines.push("BASIC INFO".to_string());
        lines.push(thin.clone());
        lines.push(format!("Rows: {}", count(basic.row_count)));
        lines.push(format!("Columns: {}", basic.column_count));
        lines.push(format!("Memory: {:.2} MB", basic.memory_usage_mb));
        lines.push(String::new());
    }

    if let Some(fin) = &analysis.financial {
        if let Some(range) = &fin.date_range {
            lines.push("DATE RANGE".to_string());
            lines.push(thin.clone());
            lines.push(format!("{} to {}", range.start, range.end));
            lines.push(format!("Span: {} days", range.span_days));
            lines.push(String::new());
        }

        if let Some(amounts) = &fin.amounts {
            lines.push("FINANCIAL SUMMARY".to_string());
            lines.push(thin.clone());
            lines.push(format!("Total: ${}", money(amounts.total)));
            lines.push(format!("Income: ${}", money(amounts.income)));
            lines.push(format!("Expenses: ${}", money(amounts.expenses)));
            lines.push(format!("Net: ${}", money(amounts.net)));
            lines.push(format!("Transactions: {}", count(amounts.transaction_count)));
            lines.push(format!("Average: ${}", money(amounts.average)));
            lines.push(String::new());
        }

        if let Some(by_category) = &fin.by_category {
            lines.push(format!("BY {}", by_category.column.to_uppercase()));
            lines.push(thin.clone());
            for (category, stats) in &by_category.breakdown {
                lines.push(format!(
                    "  {}: ${} ({} transactions)",
                    category,
                    money(stats.sum),
                    stats.count
                ));
            }
            lines.push(String::new());
        }
    }

    if let Some(numeric) = &analysis.numeric {
        lines.push("NUMERIC COLUMNS".to_string());
        lines.push(thin);
        for (col, stats) in numeric {
            lines.push(format!("  {}:", col));
            lines.push(format!("    Sum: {}  Avg: {}", money(stats.sum), money(stats.mean)));
            lines.push(format!("    Range: {} to {}", money(stats.min), money(stats.max)));
        }
        lines.push(String::new());
    }

    Ok(lines.join("\n"))
}
