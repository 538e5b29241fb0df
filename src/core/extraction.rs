//! 從購物確認信擷取商品、日期與建議的物業／分類，並計算信心值。

use crate::core::vendors::{KeywordTable, VendorCatalog, VendorDefinition};
use crate::domain::mail::MailMessage;
use crate::domain::model::PurchaseRecord;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// 每個樣式最多取幾筆
const MAX_MATCHES_PER_PATTERN: usize = 5;
const MAX_NAME_CHARS: usize = 200;
const MAX_SUBJECT_CHARS: usize = 200;
const MAX_SNIPPET_CHARS: usize = 500;

pub const UNCATEGORIZED: &str = "MISC";
pub const EXTRACTION_FAILED: &str = "[Extraction failed - manual review needed]";

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in extraction pattern must compile")
}

static PRICE: Lazy<Regex> = Lazy::new(|| regex(r"\$\s*([\d,]+\.?\d{0,2})"));

static AMAZON_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"(?im)(?:Item|Product):\s*([^\n\r$]+)"),
        regex(r"(?im)(?:^|\n)\s*([A-Z][^$\n]{10,80})\s*(?:\n|$)"),
        regex(r"(?im)Order #[^\n]+\n+([^\n$]+)"),
    ]
});
static AMAZON_MODEL: Lazy<Regex> =
    Lazy::new(|| regex(r"(?i)(?:Model|Part|SKU|Item)[#:\s]+([A-Z0-9][A-Z0-9\-]+)"));
const AMAZON_SKIP: [&str; 8] = [
    "click here",
    "view order",
    "track",
    "http",
    "www",
    "customer service",
    "amazon.com",
    "total",
];

static HOMEDEPOT_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"(?im)Item:\s*([^\n\r$]+)"),
        regex(r"(?im)Product:\s*([^\n\r$]+)"),
        regex(r"(?im)(?:SKU|Model):\s*(\S+)\s+([^\n\r$]+)"),
        regex(r"(?im)(?:^|\n)([A-Z][^\n$]{15,100})\s*\$"),
    ]
});

static GENERIC_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"(?im)(?:Item|Product|Order Item):\s*([^\n\r$]{10,150})"),
        regex(r"(?im)(?:^|\n)\s*(\d+)\s+([^\n\r$]{10,100})\s+\$"),
        regex(r"(?im)Description:\s*([^\n\r$]{10,150})"),
    ]
});
static GENERIC_MODEL: Lazy<Regex> =
    Lazy::new(|| regex(r"(?i)(?:Model|Part|SKU|Item)\s*[#:\s]+([A-Z0-9][A-Z0-9\-]{3,20})"));
const GENERIC_SKIP: [&str; 7] = ["click", "view", "track", "http", "www", "help", "contact"];

static BODY_DATES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"(?i)(?:Order|Purchase)\s*Date:\s*(\w+\s+\d{1,2},?\s+\d{4})"),
        regex(r"(\d{1,2}/\d{1,2}/\d{2,4})"),
        regex(r"(\d{4}-\d{2}-\d{2})"),
    ]
});

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

fn all_captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// 郵件內的一個商品候選
#[derive(Debug, Clone, PartialEq)]
pub struct ProductCandidate {
    pub name: String,
    pub model: String,
    pub price: Option<f64>,
    pub confidence: f64,
}

impl ProductCandidate {
    fn new(name: &str, model: &str, confidence: f64) -> Self {
        Self {
            name: truncate_chars(name, MAX_NAME_CHARS),
            model: model.to_string(),
            price: None,
            confidence,
        }
    }
}

/// 各廠商不同的商品擷取策略
pub trait ProductExtractor: Send + Sync {
    fn extract(&self, body: &str, subject: &str) -> Vec<ProductCandidate>;
}

pub struct AmazonExtractor;
pub struct HomeDepotExtractor;
pub struct GenericExtractor;

impl ProductExtractor for AmazonExtractor {
    fn extract(&self, body: &str, _subject: &str) -> Vec<ProductCandidate> {
        let mut products = Vec::new();

        for pattern in AMAZON_NAMES.iter() {
            for raw in all_captures(pattern, body).iter().take(MAX_MATCHES_PER_PATTERN) {
                let name = raw.trim();
                if name.chars().count() > 10 && !contains_any(name, &AMAZON_SKIP) {
                    products.push(ProductCandidate::new(name, "", 0.6));
                }
            }
        }

        let models = all_captures(&AMAZON_MODEL, body);
        let prices = all_captures(&PRICE, body);

        // 依出現順序對應型號與價格
        for (i, product) in products.iter_mut().enumerate() {
            if let Some(model) = models.get(i) {
                product.model = model.clone();
                product.confidence += 0.1;
            }
            if let Some(price) = prices.get(i).and_then(|p| parse_price(p)) {
                product.price = Some(price);
                product.confidence += 0.1;
            }
        }

        products
    }
}

impl ProductExtractor for HomeDepotExtractor {
    fn extract(&self, body: &str, _subject: &str) -> Vec<ProductCandidate> {
        let mut products = Vec::new();

        for pattern in HOMEDEPOT_NAMES.iter() {
            for caps in pattern.captures_iter(body).take(MAX_MATCHES_PER_PATTERN) {
                // 兩個群組時第一個是 SKU/型號
                let (model, name) = match (caps.get(1), caps.get(2)) {
                    (Some(model), Some(name)) => (model.as_str().trim(), name.as_str().trim()),
                    (Some(name), None) => ("", name.as_str().trim()),
                    _ => continue,
                };

                if name.chars().count() > 5 {
                    products.push(ProductCandidate::new(name, model, 0.65));
                }
            }
        }

        let prices = all_captures(&PRICE, body);
        for (product, raw) in products.iter_mut().zip(prices.iter()) {
            if let Some(price) = parse_price(raw) {
                product.price = Some(price);
            }
        }

        products
    }
}

impl ProductExtractor for GenericExtractor {
    fn extract(&self, body: &str, _subject: &str) -> Vec<ProductCandidate> {
        let mut products = Vec::new();

        for pattern in GENERIC_NAMES.iter() {
            for caps in pattern.captures_iter(body).take(MAX_MATCHES_PER_PATTERN) {
                // 取最後一個群組當商品名稱
                let Some(last) = caps.iter().skip(1).flatten().last() else {
                    continue;
                };
                let name = last.as_str().trim();

                if name.chars().count() > 5 && !contains_any(name, &GENERIC_SKIP) {
                    products.push(ProductCandidate::new(name, "", 0.5));
                }
            }
        }

        let models = all_captures(&GENERIC_MODEL, body);
        for (product, model) in products.iter_mut().zip(models.iter()) {
            product.model = model.clone();
            product.confidence += 0.1;
        }

        let prices = all_captures(&PRICE, body);
        for (product, raw) in products.iter_mut().zip(prices.iter()) {
            if let Some(price) = parse_price(raw) {
                product.price = Some(price);
            }
        }

        products
    }
}

pub fn extractor_for(vendor_key: &str) -> &'static dyn ProductExtractor {
    match vendor_key {
        "amazon" => &AmazonExtractor,
        "homedepot" => &HomeDepotExtractor,
        _ => &GenericExtractor,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Some((month_day, year)) = text.rsplit_once('/') {
        // 年份位數決定 %Y 或 %y，避免 "24" 被當成西元 24 年
        let format = match year.len() {
            4 => "%m/%d/%Y",
            2 => "%m/%d/%y",
            _ => return None,
        };
        return NaiveDate::parse_from_str(&format!("{}/{}", month_day, year), format).ok();
    }

    ["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// 購買日期：Date 標頭 → 內文日期 → 今天
pub fn extract_date(headers: &HashMap<String, String>, body: &str) -> String {
    if let Some(date) = headers.get("date") {
        if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(date.trim()) {
            return dt.format("%Y-%m-%d").to_string();
        }
        tracing::debug!("Unparseable Date header: {}", date);
    }

    for pattern in BODY_DATES.iter() {
        if let Some(caps) = pattern.captures(body) {
            if let Some(date) = caps.get(1).and_then(|m| parse_date_text(m.as_str())) {
                return date.format("%Y-%m-%d").to_string();
            }
        }
    }

    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// 紀錄 id：`email_id:product_name` 的 SHA-256 前 16 個十六進位字元
pub fn record_id(email_id: &str, product_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", email_id, product_name).as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect::<String>()[..16].to_string()
}

/// 基礎分數加上各欄位的加分，上限 1.0，四捨五入到小數兩位
pub fn blend_confidence(
    base: f64,
    has_model: bool,
    has_price: bool,
    has_property: bool,
    has_category: bool,
) -> f64 {
    let mut confidence = base;
    if has_model {
        confidence += 0.1;
    }
    if has_price {
        confidence += 0.1;
    }
    if has_property {
        confidence += 0.05;
    }
    if has_category {
        confidence += 0.05;
    }
    (confidence.min(1.0) * 100.0).round() / 100.0
}

/// 把一封郵件轉成購買紀錄
pub struct PurchaseExtractor {
    catalog: VendorCatalog,
    properties: KeywordTable,
    categories: KeywordTable,
}

impl PurchaseExtractor {
    pub fn new(catalog: VendorCatalog, properties: KeywordTable, categories: KeywordTable) -> Self {
        Self {
            catalog,
            properties,
            categories,
        }
    }

    pub fn catalog(&self) -> &VendorCatalog {
        &self.catalog
    }

    pub fn identify_vendor(&self, from_addr: &str) -> Option<&VendorDefinition> {
        self.catalog.identify(from_addr)
    }

    pub fn detect_property(&self, body: &str, subject: &str) -> String {
        self.properties
            .best_match(&format!("{} {}", body, subject))
            .unwrap_or_default()
            .to_string()
    }

    pub fn detect_category(&self, product_name: &str) -> String {
        self.categories
            .best_match(product_name)
            .unwrap_or(UNCATEGORIZED)
            .to_string()
    }

    /// 不認得的寄件者回傳空集合；認得但擷取不到商品時回傳一筆待人工處理的紀錄
    pub fn extract_purchases(&self, message: &MailMessage) -> Vec<PurchaseRecord> {
        let headers = message.headers();
        let body = message.body_text();
        let from_addr = headers.get("from").map(String::as_str).unwrap_or_default();
        let subject = headers.get("subject").map(String::as_str).unwrap_or_default();

        let Some(vendor) = self.identify_vendor(from_addr) else {
            tracing::debug!("Unknown vendor for email: {}", subject);
            return Vec::new();
        };

        tracing::debug!(
            "Processing {} email: {}",
            vendor.name,
            truncate_chars(subject, 50)
        );

        let products = extractor_for(&vendor.key).extract(&body, subject);
        let purchase_date = extract_date(&headers, &body);
        let suggested_property = self.detect_property(&body, subject);
        let email_subject = truncate_chars(subject, MAX_SUBJECT_CHARS);
        let raw_snippet = truncate_chars(&body, MAX_SNIPPET_CHARS);

        let mut records: Vec<PurchaseRecord> = products
            .into_iter()
            .map(|product| {
                let suggested_category = self.detect_category(&product.name);
                let has_model = !product.model.is_empty();
                let has_price = product.price.is_some_and(|p| p != 0.0);

                let mut notes = Vec::new();
                if !has_model {
                    notes.push("Model number not found".to_string());
                }
                if !has_price {
                    notes.push("Price not extracted".to_string());
                }
                if suggested_property.is_empty() {
                    notes.push("Property not detected from shipping address".to_string());
                }

                PurchaseRecord {
                    id: record_id(&message.id, &product.name),
                    vendor: vendor.name.clone(),
                    confidence: blend_confidence(
                        product.confidence,
                        has_model,
                        has_price,
                        !suggested_property.is_empty(),
                        suggested_category != UNCATEGORIZED,
                    ),
                    product_name: product.name,
                    model_number: product.model,
                    purchase_date: purchase_date.clone(),
                    price: product.price,
                    email_id: message.id.clone(),
                    email_subject: email_subject.clone(),
                    raw_snippet: raw_snippet.clone(),
                    suggested_property: suggested_property.clone(),
                    suggested_category,
                    status: "pending_review".to_string(),
                    extraction_notes: notes,
                }
            })
            .collect();

        if records.is_empty() {
            records.push(PurchaseRecord {
                id: record_id(&message.id, "unknown"),
                vendor: vendor.name.clone(),
                product_name: EXTRACTION_FAILED.to_string(),
                model_number: String::new(),
                purchase_date,
                price: None,
                email_id: message.id.clone(),
                email_subject,
                confidence: 0.1,
                raw_snippet,
                suggested_property,
                suggested_category: UNCATEGORIZED.to_string(),
                status: "pending_review".to_string(),
                extraction_notes: vec![
                    "Product extraction failed - manual review required".to_string()
                ],
            });
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mail::fixtures::message;

    fn extractor() -> PurchaseExtractor {
        PurchaseExtractor::new(
            VendorCatalog::builtin().unwrap(),
            KeywordTable::property_defaults(),
            KeywordTable::category_defaults(),
        )
    }

    #[test]
    fn test_record_id_is_stable_sha256_prefix() {
        // sha256("m1:Drill")
        let id = record_id("m1", "Drill");
        assert_eq!(id.len(), 16);
        assert_eq!(id, record_id("m1", "Drill"));
        assert_ne!(id, record_id("m2", "Drill"));
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_blend_confidence_caps_and_rounds() {
        assert_eq!(blend_confidence(0.5, false, false, false, false), 0.5);
        assert_eq!(blend_confidence(0.5, true, true, true, true), 0.8);
        assert_eq!(blend_confidence(0.8, true, true, true, true), 1.0);
        assert_eq!(blend_confidence(0.65, false, true, true, false), 0.8);
    }

    #[test]
    fn test_amazon_extraction() {
        let body = "Product: Honeywell Smart Thermostat T9\nModel: RCHT9610WF\nPrice: $199.99\n";
        let products = AmazonExtractor.extract(body, "Your Amazon.com order");

        let thermostat = products
            .iter()
            .find(|p| p.name == "Honeywell Smart Thermostat T9")
            .unwrap();
        assert_eq!(thermostat.model, "RCHT9610WF");
        assert_eq!(thermostat.price, Some(199.99));
        assert!((thermostat.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_amazon_skips_boilerplate_lines() {
        let body = "View order details at www.amazon.com\nTrack your package here please\n";
        let products = AmazonExtractor.extract(body, "");
        assert!(products.is_empty());
    }

    #[test]
    fn test_homedepot_sku_pattern_keeps_model() {
        let body = "SKU: 1001234567 Rheem 50 Gal Water Heater\n";
        let products = HomeDepotExtractor.extract(body, "");

        let heater = products
            .iter()
            .find(|p| p.model == "1001234567")
            .unwrap();
        assert_eq!(heater.name, "Rheem 50 Gal Water Heater");
        assert!((heater.confidence - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_generic_quantity_line_uses_last_group() {
        let body = "2 Kidde Smoke Detector Combo Pack $49.98\n";
        let products = GenericExtractor.extract(body, "");

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Kidde Smoke Detector Combo Pack");
        assert_eq!(products[0].price, Some(49.98));
        assert!((products[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_extract_date_sources() {
        let mut headers = HashMap::new();
        headers.insert("date".to_string(), "Fri, 15 Mar 2024 09:30:00 -0500".to_string());
        assert_eq!(extract_date(&headers, ""), "2024-03-15");

        let empty = HashMap::new();
        assert_eq!(
            extract_date(&empty, "Order Date: March 3, 2024"),
            "2024-03-03"
        );
        assert_eq!(extract_date(&empty, "Placed 03/05/24 online"), "2024-03-05");
        assert_eq!(extract_date(&empty, "Placed 12/01/2023 online"), "2023-12-01");
        assert_eq!(extract_date(&empty, "ref 2024-02-29"), "2024-02-29");

        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(extract_date(&empty, "no date here"), today);
    }

    #[test]
    fn test_detect_category_defaults_to_misc() {
        let ex = extractor();
        assert_eq!(ex.detect_category("Bosch 500 Series Dishwasher"), "APPL");
        assert_eq!(ex.detect_category("Gift card"), UNCATEGORIZED);
    }

    #[test]
    fn test_extract_purchases_blends_confidence() {
        let ex = extractor();
        let msg = message(
            "msg-1",
            "Amazon.com <auto-confirm@amazon.com>",
            "Your Amazon.com order of Honeywell Smart Thermostat",
            "Product: Honeywell Smart Thermostat T9\nModel: RCHT9610WF\nPrice: $199.99\nShip to: Austin TX 78701\n",
        );

        let records = ex.extract_purchases(&msg);
        let thermostat = records
            .iter()
            .find(|r| r.product_name == "Honeywell Smart Thermostat T9")
            .unwrap();

        assert_eq!(thermostat.vendor, "Amazon");
        assert_eq!(thermostat.suggested_category, "HVAC");
        assert_eq!(thermostat.suggested_property, "ATX-A");
        // 0.6 + 0.1 + 0.1，再加 0.1 + 0.1 + 0.05 + 0.05，上限 1.0
        assert_eq!(thermostat.confidence, 1.0);
        assert!(thermostat.extraction_notes.is_empty());
        assert_eq!(thermostat.id, record_id("msg-1", "Honeywell Smart Thermostat T9"));
    }

    #[test]
    fn test_unknown_vendor_yields_nothing() {
        let ex = extractor();
        let msg = message("m", "friend@example.org", "Lunch?", "Item: Sandwich platter deluxe");
        assert!(ex.extract_purchases(&msg).is_empty());
    }

    #[test]
    fn test_failed_extraction_creates_placeholder() {
        let ex = extractor();
        let msg = message("m9", "orders@bestbuy.com", "Thanks for your order", "See you soon");

        let records = ex.extract_purchases(&msg);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product_name, EXTRACTION_FAILED);
        assert_eq!(records[0].confidence, 0.1);
        assert_eq!(records[0].suggested_category, UNCATEGORIZED);
        assert_eq!(records[0].id, record_id("m9", "unknown"));
    }
}
