use crate::core::extraction::PurchaseExtractor;
use crate::core::review_queue::ReviewQueue;
use crate::domain::mail::MailMessage;
use crate::domain::model::{now_iso, ItemType, PurchaseRecord, ScanOutput};
use crate::domain::ports::{MailSource, Pipeline, SearchQuery, Storage};
use crate::utils::error::{Result, TreehouseError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_OUTPUT: &str = "purchases.json";
const SUGGESTED_ACTION: &str = "Verify purchase details and add to asset register";

/// 一次掃描的設定（CLI 與設定檔合併後）
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub query: SearchQuery,
    /// 只處理單一封信
    pub email_id: Option<String>,
    pub output: String,
    pub dry_run: bool,
    pub enqueue: bool,
    pub review_threshold: f64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            query: SearchQuery::default(),
            email_id: None,
            output: DEFAULT_OUTPUT.to_string(),
            dry_run: false,
            enqueue: false,
            review_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub records: Vec<PurchaseRecord>,
    /// dry run 時為 None
    pub output_path: Option<String>,
    /// 新加入審核佇列的項目 id
    pub enqueued: Vec<String>,
    /// 佇列或封存檔中已有同一筆紀錄而略過
    pub already_queued: usize,
    /// 信心值達門檻、不需審核
    pub above_threshold: usize,
}

/// 郵件 → 購買紀錄 → 輸出檔／審核佇列
pub struct PurchasePipeline<S: Storage, M: MailSource> {
    storage: S,
    source: M,
    extractor: PurchaseExtractor,
    settings: ScanSettings,
    queue: Option<ReviewQueue>,
}

impl<S: Storage, M: MailSource> PurchasePipeline<S, M> {
    pub fn new(storage: S, source: M, extractor: PurchaseExtractor, settings: ScanSettings) -> Self {
        Self {
            storage,
            source,
            extractor,
            settings,
            queue: None,
        }
    }

    pub fn with_review_queue(mut self, queue: ReviewQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    async fn write_output(&self, records: &[PurchaseRecord]) -> Result<String> {
        let output = ScanOutput {
            generated_at: now_iso(),
            count: records.len(),
            records: records.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&output)?;
        self.storage.write_file(&self.settings.output, &json).await?;
        tracing::info!("💾 Saved {} record(s) to {}", records.len(), self.settings.output);
        Ok(self.settings.output.clone())
    }

    fn enqueue(&self, records: &[PurchaseRecord], report: &mut ScanReport) -> Result<()> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| TreehouseError::MissingConfigError {
                field: "review_queue".to_string(),
            })?;

        for record in records {
            if record.confidence >= self.settings.review_threshold {
                report.above_threshold += 1;
                continue;
            }
            match queue.enqueue_unique(
                &record.id,
                ItemType::Purchase,
                record.to_review_data(),
                SUGGESTED_ACTION,
                &record.extraction_notes.join("\n"),
                record.confidence,
            )? {
                Some(id) => report.enqueued.push(id),
                None => {
                    tracing::debug!("Record {} already queued or reviewed, skipping", record.id);
                    report.already_queued += 1;
                }
            }
        }

        tracing::info!(
            "📝 Queued {} record(s) for review ({} already queued, {} above threshold {:.2})",
            report.enqueued.len(),
            report.already_queued,
            report.above_threshold,
            self.settings.review_threshold
        );
        Ok(())
    }
}

#[async_trait]
impl<S, M> Pipeline for PurchasePipeline<S, M>
where
    S: Storage,
    M: MailSource,
{
    type Input = MailMessage;
    type Output = PurchaseRecord;
    type Report = ScanReport;

    async fn extract(&self) -> Result<Vec<MailMessage>> {
        if let Some(email_id) = &self.settings.email_id {
            tracing::info!("Processing single email: {}", email_id);
            return match self.source.get(email_id).await? {
                Some(message) => Ok(vec![message]),
                None => Err(TreehouseError::MailSourceError {
                    message: format!("Email not found: {}", email_id),
                }),
            };
        }

        let query = &self.settings.query;
        tracing::info!("Scanning emails from the last {} days...", query.days);
        if !query.vendors.is_empty() {
            tracing::info!("Filtering by vendors: {}", query.vendors.join(", "));
        }

        let refs = self.source.search(query).await?;
        tracing::info!("Found {} candidate email(s)", refs.len());

        let mut messages = Vec::with_capacity(refs.len());
        for (i, message_ref) in refs.iter().enumerate() {
            match self.source.get(&message_ref.id).await? {
                Some(message) => messages.push(message),
                None => tracing::warn!("⚠️ Email {} disappeared, skipping", message_ref.id),
            }
            if (i + 1) % 10 == 0 {
                tracing::debug!("Fetched {}/{} emails", i + 1, refs.len());
            }
        }

        Ok(messages)
    }

    async fn transform(&self, data: Vec<MailMessage>) -> Result<Vec<PurchaseRecord>> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for message in &data {
            for record in self.extractor.extract_purchases(message) {
                // 同一 id 只保留第一次出現
                if seen.insert(record.id.clone()) {
                    records.push(record);
                }
            }
        }

        tracing::info!(
            "📊 Extracted {} purchase record(s) from {} email(s)",
            records.len(),
            data.len()
        );
        Ok(records)
    }

    async fn load(&self, records: Vec<PurchaseRecord>) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        if self.settings.dry_run {
            tracing::info!("[DRY RUN] Results not saved.");
        } else {
            report.output_path = Some(self.write_output(&records).await?);
        }

        if self.settings.enqueue {
            if self.settings.dry_run {
                tracing::info!("[DRY RUN] Review queue not updated.");
            } else {
                self.enqueue(&records, &mut report)?;
            }
        }

        report.records = records;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use crate::core::etl::EtlEngine;
    use crate::core::vendors::{KeywordTable, VendorCatalog};
    use crate::domain::mail::fixtures::message;
    use crate::domain::mail::MessageRef;
    use crate::domain::model::ItemStatus;
    use crate::core::review_queue::ListFilter;
    use tempfile::TempDir;

    /// 依序回傳固定信件
    struct FixedSource(Vec<MailMessage>);

    #[async_trait]
    impl MailSource for FixedSource {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageRef>> {
            Ok(self
                .0
                .iter()
                .take(query.max_results)
                .map(|m| MessageRef {
                    id: m.id.clone(),
                    thread_id: None,
                })
                .collect())
        }

        async fn get(&self, id: &str) -> Result<Option<MailMessage>> {
            Ok(self.0.iter().find(|m| m.id == id).cloned())
        }
    }

    fn extractor() -> PurchaseExtractor {
        PurchaseExtractor::new(
            VendorCatalog::builtin().unwrap(),
            KeywordTable::property_defaults(),
            KeywordTable::category_defaults(),
        )
    }

    fn inbox() -> FixedSource {
        FixedSource(vec![
            message(
                "m1",
                "orders@bestbuy.com",
                "Thanks for your order",
                "Order Item: Samsung 55 inch Smart TV\n",
            ),
            // 同一封信重複出現，紀錄 id 相同
            message(
                "m1",
                "orders@bestbuy.com",
                "Thanks for your order",
                "Order Item: Samsung 55 inch Smart TV\n",
            ),
            message("m2", "orders@walmart.com", "Your Walmart order", "nothing useful"),
        ])
    }

    #[tokio::test]
    async fn test_scan_writes_output_and_dedups() {
        let dir = TempDir::new().unwrap();
        let pipeline = PurchasePipeline::new(
            LocalStorage::new(dir.path()),
            inbox(),
            extractor(),
            ScanSettings::default(),
        );

        let report = EtlEngine::new(pipeline).run().await.unwrap();

        // m1 的商品一筆 + m2 的待人工處理紀錄一筆
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.output_path.as_deref(), Some(DEFAULT_OUTPUT));

        let saved: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join(DEFAULT_OUTPUT)).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["count"], 2);
        assert_eq!(saved["records"][0]["vendor"], "Best Buy");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let settings = ScanSettings {
            dry_run: true,
            ..ScanSettings::default()
        };
        let pipeline =
            PurchasePipeline::new(LocalStorage::new(dir.path()), inbox(), extractor(), settings);

        let report = EtlEngine::new(pipeline).run().await.unwrap();

        assert!(report.output_path.is_none());
        assert!(!dir.path().join(DEFAULT_OUTPUT).exists());
    }

    #[tokio::test]
    async fn test_enqueue_low_confidence_once() {
        let dir = TempDir::new().unwrap();
        let queue_file = dir.path().join("review_queue.json");
        let archive_file = dir.path().join("archive.json");
        let settings = ScanSettings {
            enqueue: true,
            ..ScanSettings::default()
        };

        for _ in 0..2 {
            let pipeline = PurchasePipeline::new(
                LocalStorage::new(dir.path()),
                inbox(),
                extractor(),
                settings.clone(),
            )
            .with_review_queue(ReviewQueue::new(&queue_file, &archive_file));
            EtlEngine::new(pipeline).run().await.unwrap();
        }

        let queue = ReviewQueue::new(&queue_file, &archive_file);
        let items = queue.list_items(&ListFilter::pending()).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.item_type == ItemType::Purchase));
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
        assert!(items.iter().all(|i| i.notes.contains("Confidence: ")));
    }

    #[tokio::test]
    async fn test_single_missing_email_is_error() {
        let dir = TempDir::new().unwrap();
        let settings = ScanSettings {
            email_id: Some("ghost".to_string()),
            ..ScanSettings::default()
        };
        let pipeline =
            PurchasePipeline::new(LocalStorage::new(dir.path()), inbox(), extractor(), settings);

        let result = EtlEngine::new(pipeline).run().await;
        assert!(matches!(result, Err(TreehouseError::MailSourceError { .. })));
    }
}
