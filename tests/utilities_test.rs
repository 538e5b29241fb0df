use chrono::{Datelike, Local};
use std::fs;
use tempfile::TempDir;
use treehouse::core::csv_summary::{self, AnalysisType, CsvTable, ReportFormat};
use treehouse::core::organizer::{self, OrganizeMode};

const LEDGER: &str = "\
Date,Description,Amount,Category
2024-01-05,Rent,\"$-1,800.00\",Housing
2024-01-10,Client payment,\"$4,250.50\",Income
2024-01-18,Hardware store,-95.25,Maintenance
2024-02-01,Rent,\"$-1,800.00\",Housing
2024-02-03,Refund,,Income
";

#[test]
fn test_financial_report_from_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("ledger.csv");
    fs::write(&path, LEDGER)?;

    let table = CsvTable::from_path(&path)?;
    let analysis = csv_summary::analyze(&table, AnalysisType::Full);

    let basic = analysis.basic.as_ref().expect("basic summary");
    assert_eq!(basic.row_count, 5);
    assert_eq!(basic.missing_values["Amount"], 1);

    let financial = analysis.financial.as_ref().expect("financial analysis");
    let range = financial.date_range.as_ref().expect("date range");
    assert_eq!(range.start, "2024-01-05");
    assert_eq!(range.end, "2024-02-03");
    assert_eq!(range.span_days, 29);

    let amounts = financial.amounts.as_ref().expect("amounts");
    assert_eq!(amounts.income, 4250.5);
    assert_eq!(amounts.expenses, 3695.25);
    assert_eq!(amounts.net, 555.25);

    let by_category = financial.by_category.as_ref().expect("categories");
    assert_eq!(by_category.column, "Category");
    assert_eq!(by_category.breakdown["Housing"].count, 2);
    assert_eq!(by_category.breakdown["Housing"].sum, -3600.0);
    assert_eq!(by_category.breakdown["Income"].count, 1);

    let text = csv_summary::generate_report(&analysis, ReportFormat::Text)?;
    assert!(text.contains("DATA SUMMARY REPORT"));
    assert!(text.contains("Income: $4,250.50"));
    assert!(text.contains("BY CATEGORY"));

    let json: serde_json::Value =
        serde_json::from_str(&csv_summary::generate_report(&analysis, ReportFormat::Json)?)?;
    assert_eq!(json["financial"]["amounts"]["column"], "Amount");

    Ok(())
}

#[test]
fn test_basic_only_skips_financial() -> anyhow::Result<()> {
    let table = CsvTable::from_reader("name,qty\nbolts,10\nnuts,4\n".as_bytes())?;
    let analysis = csv_summary::analyze(&table, AnalysisType::Basic);

    assert!(analysis.financial.is_none());
    let numeric = analysis.numeric.as_ref().expect("numeric summary");
    assert_eq!(numeric["qty"].sum, 14.0);
    assert_eq!(numeric["qty"].count, 2);
    Ok(())
}

#[test]
fn test_hybrid_organize_into_category_and_month() -> anyhow::Result<()> {
    let source = TempDir::new()?;
    let dest = TempDir::new()?;
    fs::write(source.path().join("invoice-42.pdf"), "x")?;
    fs::write(source.path().join("vacation.jpg"), "x")?;
    fs::write(source.path().join(".hidden"), "x")?;
    fs::create_dir(source.path().join("nested"))?;
    fs::write(source.path().join("nested/skip-me.txt"), "x")?;

    let result = organizer::organize(source.path(), dest.path(), OrganizeMode::Hybrid, false);

    assert!(result.is_success());
    assert_eq!(result.moved.len(), 2);

    let now = Local::now();
    let month = format!("{}/{:02}", now.year(), now.month());
    assert!(dest.path().join("Invoices").join(&month).join("invoice-42.pdf").exists());
    assert!(dest.path().join("Images").join(&month).join("vacation.jpg").exists());
    assert!(source.path().join(".hidden").exists());
    assert!(source.path().join("nested/skip-me.txt").exists());

    // 目標已存在的檔案略過
    fs::write(source.path().join("invoice-42.pdf"), "again")?;
    let again = organizer::organize(source.path(), dest.path(), OrganizeMode::Hybrid, false);
    assert_eq!(again.skipped.len(), 1);
    assert!(source.path().join("invoice-42.pdf").exists());

    Ok(())
}

#[test]
fn test_by_date_recurses_and_dry_run_is_inert() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    fs::create_dir_all(source.path().join("a/b")).unwrap();
    fs::write(source.path().join("a/b/deep.txt"), "x").unwrap();
    fs::write(source.path().join("top.csv"), "x").unwrap();

    let preview = organizer::organize(source.path(), dest.path(), OrganizeMode::ByDate, true);
    assert_eq!(preview.moved.len(), 2);
    assert!(source.path().join("a/b/deep.txt").exists());
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[test]
fn test_destination_inside_source_given_indirectly() -> anyhow::Result<()> {
    let source = TempDir::new()?;
    fs::create_dir(source.path().join("inbox"))?;
    fs::create_dir_all(source.path().join("sorted/2020/01"))?;
    fs::write(source.path().join("sorted/2020/01/already.txt"), "x")?;
    fs::write(source.path().join("inbox/new.txt"), "x")?;

    // 目的地寫成 inbox/../sorted，與走訪時看到的路徑字面不同
    let dest = source.path().join("inbox").join("..").join("sorted");
    let result = organizer::organize(source.path(), &dest, OrganizeMode::ByDate, false);

    assert!(result.is_success());
    assert_eq!(result.moved.len(), 1);
    assert!(result.moved[0].file.ends_with("new.txt"));
    assert!(result.skipped.is_empty());
    assert!(source.path().join("sorted/2020/01/already.txt").exists());
    assert!(!source.path().join("inbox/new.txt").exists());

    Ok(())
}
