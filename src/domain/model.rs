use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::TreehouseError;

/// 目前時間，本地 ISO-8601 格式（與既有佇列檔案一致）
pub fn now_iso() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Purchase,
    Manual,
    #[cfg_attr(feature = "cli", value(name = "property_match"))]
    PropertyMatch,
    Warranty,
    Service,
}

impl ItemType {
    pub const ALL: [ItemType; 5] = [
        ItemType::Purchase,
        ItemType::Manual,
        ItemType::PropertyMatch,
        ItemType::Warranty,
        ItemType::Service,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Purchase => "purchase",
            ItemType::Manual => "manual",
            ItemType::PropertyMatch => "property_match",
            ItemType::Warranty => "warranty",
            ItemType::Service => "service",
        }
    }
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Manual
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = TreehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TreehouseError::ValidationError {
                message: format!(
                    "Invalid item type: {}. Must be one of: {}",
                    s,
                    ItemType::ALL.map(|t| t.as_str()).join(", ")
                ),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
    Modified,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Pending,
        ItemStatus::Approved,
        ItemStatus::Rejected,
        ItemStatus::Modified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Modified => "modified",
        }
    }

    /// 已做出決定、可以封存的狀態
    pub fn is_decided(&self) -> bool {
        matches!(self, ItemStatus::Approved | ItemStatus::Rejected)
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Pending
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 等待人工審核的項目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub suggested_action: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: ItemStatus,
}

impl ReviewItem {
    pub fn new(
        item_type: ItemType,
        data: Map<String, Value>,
        suggested_action: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        let mut id = uuid::Uuid::new_v4().to_string();
        id.truncate(8);

        Self {
            id,
            item_type,
            created_at: now_iso(),
            data,
            suggested_action: suggested_action.into(),
            notes: notes.into(),
            status: ItemStatus::Pending,
        }
    }

    /// 完全相同或前綴相符
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.id.starts_with(id)
    }

    /// 以換行附加一段備註
    pub fn append_note(&mut self, note: &str) {
        if note.is_empty() {
            return;
        }
        if self.notes.is_empty() {
            self.notes = note.to_string();
        } else {
            self.notes = format!("{}\n{}", self.notes, note).trim().to_string();
        }
    }

    fn data_str(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn summary(&self) -> String {
        match self.item_type {
            ItemType::Purchase => {
                let vendor = self.data_str("vendor").unwrap_or_else(|| "Unknown".to_string());
                let item = self
                    .data_str("item")
                    .or_else(|| self.data_str("name"))
                    .unwrap_or_else(|| "Unknown item".to_string());
                format!("{}: {}", vendor, item)
            }
            ItemType::Manual => format!(
                "Manual not found: {}",
                self.data_str("asset_id").unwrap_or_else(|| "Unknown".to_string())
            ),
            ItemType::PropertyMatch => format!(
                "Property match: {} at {}",
                self.data_str("match_type").unwrap_or_else(|| "asset".to_string()),
                self.data_str("location").unwrap_or_else(|| "Unknown".to_string())
            ),
            ItemType::Warranty => format!(
                "Warranty update: {}",
                self.data_str("asset_id").unwrap_or_else(|| "Unknown".to_string())
            ),
            ItemType::Service => format!(
                "Service record: {}",
                self.data_str("asset_id").unwrap_or_else(|| "Unknown".to_string())
            ),
        }
    }
}

fn default_queue_version() -> String {
    "1.0".to_string()
}

/// 其他工具寫入的欄位放在 `extra`，寫回時原樣保留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMetadata {
    #[serde(default = "default_queue_version")]
    pub version: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for QueueMetadata {
    fn default() -> Self {
        Self {
            version: default_queue_version(),
            last_modified: None,
            extra: Map::new(),
        }
    }
}

/// 佇列檔案在磁碟上的格式；項目保留為原始 JSON，逐筆解碼
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueFile {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub metadata: QueueMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub by_status: BTreeMap<ItemStatus, usize>,
    pub by_type: BTreeMap<ItemType, usize>,
    pub oldest_pending: Option<String>,
    pub newest_item: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovedExport<'a> {
    pub exported_at: String,
    pub count: usize,
    pub items: Vec<&'a ReviewItem>,
}

/// 從郵件中擷取出的一筆購買紀錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: String,
    pub vendor: String,
    pub product_name: String,
    #[serde(default)]
    pub model_number: String,
    #[serde(default)]
    pub purchase_date: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub email_id: String,
    #[serde(default)]
    pub email_subject: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub raw_snippet: String,
    #[serde(default)]
    pub suggested_property: String,
    #[serde(default)]
    pub suggested_category: String,
    #[serde(default = "default_record_status")]
    pub status: String,
    #[serde(default)]
    pub extraction_notes: Vec<String>,
}

fn default_record_status() -> String {
    "pending_review".to_string()
}

impl PurchaseRecord {
    /// 轉成審核佇列的 `purchase` 資料
    pub fn to_review_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("record_id".into(), Value::from(self.id.clone()));
        data.insert("vendor".into(), Value::from(self.vendor.clone()));
        data.insert("item".into(), Value::from(self.product_name.clone()));
        if !self.model_number.is_empty() {
            data.insert("model".into(), Value::from(self.model_number.clone()));
        }
        data.insert("purchase_date".into(), Value::from(self.purchase_date.clone()));
        if let Some(price) = self.price {
            data.insert("price".into(), Value::from(price));
        }
        if !self.suggested_property.is_empty() {
            data.insert("property".into(), Value::from(self.suggested_property.clone()));
        }
        data.insert("category".into(), Value::from(self.suggested_category.clone()));
        data.insert("email_id".into(), Value::from(self.email_id.clone()));
        data.insert("email_subject".into(), Value::from(self.email_subject.clone()));
        data.insert("confidence".into(), Value::from(self.confidence));
        data
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutput {
    pub generated_at: String,
    pub count: usize,
    pub records: Vec<PurchaseRecord>,
}
