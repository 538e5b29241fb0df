use crate::core::vendors::{VendorCatalog, VendorDefinition};
use crate::domain::mail::{MailMessage, MessageRef};
use crate::domain::ports::{MailSource, SearchQuery};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

/// 購物相關信件的關鍵字
pub const PURCHASE_KEYWORDS: [&str; 6] = [
    "order confirmation",
    "order shipped",
    "your order",
    "thank you for your purchase",
    "receipt",
    "invoice",
];

impl SearchQuery {
    pub fn for_vendors(vendors: Vec<String>, days: i64, max_results: usize) -> Self {
        Self {
            vendors,
            days,
            max_results,
        }
    }

    /// 被選取的廠商；沒指定時為整個目錄
    pub fn selected<'a>(&self, catalog: &'a VendorCatalog) -> Vec<&'a VendorDefinition> {
        if self.vendors.is_empty() {
            catalog.iter().collect()
        } else {
            self.vendors
                .iter()
                .filter_map(|key| {
                    let vendor = catalog.get(key);
                    if vendor.is_none() {
                        tracing::warn!("⚠️ Unknown vendor '{}' ignored", key);
                    }
                    vendor
                })
                .collect()
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days)
    }

    /// Gmail 搜尋語法，供記錄與遠端來源使用
    pub fn to_gmail_query(&self, catalog: &VendorCatalog, now: DateTime<Utc>) -> String {
        let from_clause = self
            .selected(catalog)
            .iter()
            .flat_map(|v| v.domains.iter())
            .map(|d| format!("from:{}", d))
            .collect::<Vec<_>>()
            .join(" OR ");

        let keyword_clause = PURCHASE_KEYWORDS
            .iter()
            .map(|k| format!("\"{}\"", k))
            .collect::<Vec<_>>()
            .join(" OR ");

        format!(
            "after:{} ({}) ({})",
            self.cutoff(now).format("%Y/%m/%d"),
            from_clause,
            keyword_clause
        )
    }

    /// 本機信件是否符合搜尋條件
    pub fn matches(&self, catalog: &VendorCatalog, message: &MailMessage, now: DateTime<Utc>) -> bool {
        // 沒有時間資訊的信件保留
        if let Some(received) = message.received_at() {
            if received < self.cutoff(now) {
                return false;
            }
        }

        let from = message.header("from").unwrap_or_default().to_lowercase();
        let selected = self.selected(catalog);
        let Some(vendor) = selected.iter().find(|v| {
            v.domains
                .iter()
                .any(|d| from.contains(&d.to_lowercase()))
        }) else {
            return false;
        };

        let subject = message.header("subject").unwrap_or_default();
        if catalog.subject_matches(&vendor.key, subject) {
            return true;
        }

        let haystack = format!("{} {}", subject, message.body_text()).to_lowercase();
        PURCHASE_KEYWORDS.iter().any(|k| haystack.contains(k))
    }
}

/// 以目錄形式保存的信件匯出；每個 `*.json` 是一封信或一個信件陣列
#[derive(Debug, Clone)]
pub struct LocalMailbox {
    dir: PathBuf,
    catalog: VendorCatalog,
    messages: Vec<MailMessage>,
}

impl LocalMailbox {
    pub async fn open(dir: impl Into<PathBuf>, catalog: VendorCatalog) -> Result<Self> {
        let dir = dir.into();
        let mut paths = Vec::new();

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut messages = Vec::new();
        for path in &paths {
            match Self::read_messages(path).await {
                Ok(mut batch) => messages.append(&mut batch),
                Err(e) => tracing::warn!("⚠️ Skipping unreadable mail file {}: {}", path.display(), e),
            }
        }

        tracing::info!(
            "📬 Loaded {} message(s) from {} file(s) in {}",
            messages.len(),
            paths.len(),
            dir.display()
        );

        Ok(Self {
            dir,
            catalog,
            messages,
        })
    }

    async fn read_messages(path: &Path) -> Result<Vec<MailMessage>> {
        let content = tokio::fs::read_to_string(path).await?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        if value.is_array() {
            Ok(serde_json::from_value(value)?)
        } else {
            Ok(vec![serde_json::from_value(value)?])
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl MailSource for LocalMailbox {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageRef>> {
        let now = Utc::now();
        tracing::debug!("Search query: {}", query.to_gmail_query(&self.catalog, now));

        let mut hits: Vec<&MailMessage> = self
            .messages
            .iter()
            .filter(|m| query.matches(&self.catalog, m, now))
            .collect();

        // 新信在前，與 Gmail 相同
        hits.sort_by_key(|m| std::cmp::Reverse(m.received_at()));
        hits.truncate(query.max_results);

        Ok(hits
            .into_iter()
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<MailMessage>> {
        Ok(self.messages.iter().find(|m| m.id == id).cloned())
    }
}
