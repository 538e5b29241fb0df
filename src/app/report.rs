//! 終端機輸出：審核佇列表格、項目細節、統計與掃描結果

use crate::core::vendors::VendorCatalog;
use crate::domain::model::{PurchaseRecord, QueueStats, ReviewItem};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

fn truncate(text: &str, max: usize, keep: usize, tail: &str) -> String {
    if text.chars().count() > max {
        format!("{}{}", text.chars().take(keep).collect::<String>(), tail)
    } else {
        text.to_string()
    }
}

fn date_part(timestamp: &str) -> Option<NaiveDate> {
    timestamp
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

fn percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

fn money(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac_part)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn queue_table(items: &[ReviewItem]) -> String {
    if items.is_empty() {
        return "No items found.".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<12} {:<16} {:<12} {:<10} Summary",
        "ID", "Type", "Created", "Status"
    );
    let _ = writeln!(out, "{}", "─".repeat(80));

    for item in items {
        let created = date_part(&item.created_at)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let _ = writeln!(
            out,
            "{:<12} {:<16} {:<12} {:<10} {}",
            item.id,
            item.item_type.as_str(),
            created,
            item.status.as_str(),
            truncate(&item.summary(), 35, 32, "...")
        );
    }

    let _ = writeln!(out);
    let _ = write!(out, "Total: {} item(s)", items.len());
    out
}

pub fn item_details(item: &ReviewItem) -> String {
    let rule = "=".repeat(60);
    let thin = format!("  {}", "-".repeat(40));
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Review Item: {}", item.id);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Type:             {}", item.item_type);
    let _ = writeln!(out, "  Status:           {}", item.status);
    let _ = writeln!(out, "  Created:          {}", item.created_at);
    let _ = writeln!(out);

    if !item.suggested_action.is_empty() {
        let _ = writeln!(out, "  Suggested Action: {}", item.suggested_action);
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "  Data:");
    let _ = writeln!(out, "{}", thin);
    for (key, value) in &item.data {
        match value {
            Value::Object(map) => {
                let _ = writeln!(out, "    {}:", key);
                for (k, v) in map {
                    let _ = writeln!(out, "      {}: {}", k, display_value(v));
                }
            }
            Value::Array(list) => {
                let _ = writeln!(out, "    {}: [{} items]", key, list.len());
                for v in list.iter().take(3) {
                    let _ = writeln!(out, "      - {}", display_value(v));
                }
                if list.len() > 3 {
                    let _ = writeln!(out, "      ... and {} more", list.len() - 3);
                }
            }
            other => {
                let _ = writeln!(out, "    {}: {}", key, display_value(other));
            }
        }
    }
    let _ = writeln!(out);

    if !item.notes.is_empty() {
        let _ = writeln!(out, "  Notes:");
        let _ = writeln!(out, "{}", thin);
        for line in item.notes.lines() {
            let _ = writeln!(out, "    {}", line);
        }
        let _ = writeln!(out);
    }

    let _ = write!(out, "{}", rule);
    out
}

pub fn statistics(stats: &QueueStats) -> String {
    let rule = "=".repeat(50);
    let thin = format!("  {}", "-".repeat(30));
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Review Queue Statistics");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Total Items: {}", stats.total);
    let _ = writeln!(out);

    let _ = writeln!(out, "  By Status:");
    let _ = writeln!(out, "{}", thin);
    for (status, count) in &stats.by_status {
        let bar = "#".repeat((*count).min(20));
        let _ = writeln!(out, "    {:<12} {:>4}  {}", status.as_str(), count, bar);
    }
    let _ = writeln!(out);

    if !stats.by_type.is_empty() {
        let _ = writeln!(out, "  By Type:");
        let _ = writeln!(out, "{}", thin);
        for (item_type, count) in &stats.by_type {
            let _ = writeln!(out, "    {:<16} {:>4}", item_type.as_str(), count);
        }
        let _ = writeln!(out);
    }

    if let Some(oldest) = &stats.oldest_pending {
        match date_part(oldest) {
            Some(date) => {
                let age = (chrono::Local::now().date_naive() - date).num_days();
                let _ = writeln!(out, "  Oldest Pending: {} ({} days ago)", date, age);
            }
            None => {
                let _ = writeln!(out, "  Oldest Pending: {}", oldest);
            }
        }
    }
    if let Some(newest) = &stats.newest_item {
        let _ = writeln!(
            out,
            "  Newest Item:    {}",
            newest.chars().take(10).collect::<String>()
        );
    }

    let _ = writeln!(out);
    let _ = write!(out, "{}", rule);
    out
}

/// 信心值分級：高 ≥0.8、中 0.5–0.8、低 <0.5
pub fn confidence_buckets(records: &[PurchaseRecord]) -> (usize, usize, usize) {
    records.iter().fold((0, 0, 0), |(high, medium, low), r| {
        if r.confidence >= 0.8 {
            (high + 1, medium, low)
        } else if r.confidence >= 0.5 {
            (high, medium + 1, low)
        } else {
            (high, medium, low + 1)
        }
    })
}

pub fn scan_summary(records: &[PurchaseRecord]) -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "PURCHASE SCAN RESULTS");
    let _ = writeln!(out, "{}", rule);

    if records.is_empty() {
        let _ = writeln!(out);
        let _ = write!(out, "No purchase records found.");
        return out;
    }

    let mut vendors: BTreeMap<&str, usize> = BTreeMap::new();
    let mut properties: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *vendors.entry(r.vendor.as_str()).or_default() += 1;
        let property = if r.suggested_property.is_empty() {
            "Unknown"
        } else {
            r.suggested_property.as_str()
        };
        *properties.entry(property).or_default() += 1;
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Total Records: {}", records.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "By Vendor:");
    for (vendor, count) in &vendors {
        let _ = writeln!(out, "  {}: {}", vendor, count);
    }

    let (high, medium, low) = confidence_buckets(records);
    let _ = writeln!(out);
    let _ = writeln!(out, "By Confidence Level:");
    let _ = writeln!(out, "  High (>=0.8): {}", high);
    let _ = writeln!(out, "  Medium (0.5-0.8): {}", medium);
    let _ = writeln!(out, "  Low (<0.5): {}", low);

    let _ = writeln!(out);
    let _ = writeln!(out, "By Suggested Property:");
    for (property, count) in &properties {
        let _ = writeln!(out, "  {}: {}", property, count);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "-".repeat(70));
    let _ = writeln!(out, "SAMPLE RECORDS (first 5)");
    let _ = writeln!(out, "{}", "-".repeat(70));

    for (i, record) in records.iter().take(5).enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "[{}] {}",
            i + 1,
            record.product_name.chars().take(60).collect::<String>()
        );
        let _ = writeln!(out, "    Vendor: {}", record.vendor);
        let _ = writeln!(out, "    Date: {}", record.purchase_date);
        if let Some(price) = record.price.filter(|p| *p != 0.0) {
            let _ = writeln!(out, "    Price: {}", money(price));
        }
        if !record.model_number.is_empty() {
            let _ = writeln!(out, "    Model: {}", record.model_number);
        }
        let property = if record.suggested_property.is_empty() {
            "Unknown"
        } else {
            record.suggested_property.as_str()
        };
        let _ = writeln!(out, "    Property: {}", property);
        let _ = writeln!(out, "    Category: {}", record.suggested_category);
        let _ = writeln!(out, "    Confidence: {}", percent(record.confidence));
        let _ = writeln!(
            out,
            "    Email: {}...",
            record.email_subject.chars().take(50).collect::<String>()
        );
    }

    let _ = writeln!(out);
    let _ = write!(out, "{}", rule);
    out
}

pub fn scan_table(records: &[PurchaseRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<40} {:<15} {:<12} {:>10} {:>6}",
        "Product", "Vendor", "Date", "Price", "Conf"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));

    for record in records {
        let name = truncate(&record.product_name, 40, 38, "..");
        let price = record
            .price
            .filter(|p| *p != 0.0)
            .map(money)
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            out,
            "{:<40} {:<15} {:<12} {:>10} {:>6}",
            name,
            record.vendor,
            record.purchase_date,
            price,
            percent(record.confidence)
        );
    }

    out.trim_end().to_string()
}

pub fn vendor_list(catalog: &VendorCatalog) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "Supported Vendors:");
    let _ = writeln!(out, "{}", "-".repeat(40));
    for vendor in catalog.iter() {
        let _ = writeln!(out, "  {:<15} - {}", vendor.key, vendor.name);
    }
    out
}
