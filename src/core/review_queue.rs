use crate::core::queue_store::QueueStorage;
use crate::domain::model::{
    now_iso, ApprovedExport, ItemStatus, ItemType, QueueStats, ReviewItem,
};
use crate::utils::error::{Result, TreehouseError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `list_items` 的篩選條件
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub include_all: bool,
    pub status: Option<ItemStatus>,
    pub item_type: Option<ItemType>,
}

impl ListFilter {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn with_status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn accepts(&self, item: &ReviewItem) -> bool {
        let status_ok = match self.status {
            Some(status) => item.status == status,
            None => self.include_all || item.status == ItemStatus::Pending,
        };
        let type_ok = self.item_type.map_or(true, |t| item.item_type == t);
        status_ok && type_ok
    }
}

/// 審核佇列：所有變更都在佇列檔的鎖內以 read-modify-write 完成。
///
/// 同時需要封存檔時，一律先鎖佇列再鎖封存檔。
pub struct ReviewQueue {
    storage: QueueStorage,
    archive: QueueStorage,
}

impl ReviewQueue {
    pub fn new(queue_file: impl Into<PathBuf>, archive_file: impl Into<PathBuf>) -> Self {
        Self {
            storage: QueueStorage::new(queue_file),
            archive: QueueStorage::new(archive_file),
        }
    }

    pub fn queue_path(&self) -> &Path {
        self.storage.path()
    }

    pub fn archive_path(&self) -> &Path {
        self.archive.path()
    }

    fn check_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(TreehouseError::ValidationError {
                message: "Item id cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// 在鎖內找到項目並修改後寫回
    fn update_item<F>(&self, id: &str, mutate: F) -> Result<ReviewItem>
    where
        F: FnOnce(&mut ReviewItem),
    {
        Self::check_id(id)?;
        self.storage.with_lock(|| {
            let mut items = self.storage.load_items()?;
            let item = items
                .iter_mut()
                .find(|item| item.matches_id(id))
                .ok_or_else(|| TreehouseError::ItemNotFound { id: id.to_string() })?;

            mutate(item);
            let updated = item.clone();
            self.storage.save_items(&items)?;
            Ok(updated)
        })
    }

    pub fn add_item(
        &self,
        item_type: ItemType,
        data: Map<String, Value>,
        suggested_action: &str,
        notes: &str,
    ) -> Result<ReviewItem> {
        let item = ReviewItem::new(item_type, data, suggested_action, notes);

        self.storage.with_lock(|| {
            let mut items = self.storage.load_items()?;
            items.push(item.clone());
            self.storage.save_items(&items)
        })?;

        tracing::info!("➕ Added {} item {} to review queue", item.item_type, item.id);
        Ok(item)
    }

    pub fn get_item(&self, id: &str) -> Result<ReviewItem> {
        Self::check_id(id)?;
        self.storage
            .load_items()?
            .into_iter()
            .find(|item| item.matches_id(id))
            .ok_or_else(|| TreehouseError::ItemNotFound { id: id.to_string() })
    }

    /// 依 created_at 由新到舊排序
    pub fn list_items(&self, filter: &ListFilter) -> Result<Vec<ReviewItem>> {
        let mut items: Vec<ReviewItem> = self
            .storage
            .load_items()?
            .into_iter()
            .filter(|item| filter.accepts(item))
            .collect();

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    pub fn approve_item(&self, id: &str, notes: &str) -> Result<ReviewItem> {
        let item = self.update_item(id, |item| {
            item.status = ItemStatus::Approved;
            item.append_note(notes);
        })?;
        tracing::info!("✅ Approved {}", item.id);
        Ok(item)
    }

    pub fn reject_item(&self, id: &str, reason: &str) -> Result<ReviewItem> {
        let item = self.update_item(id, |item| {
            item.status = ItemStatus::Rejected;
            if !reason.is_empty() {
                item.append_note(&format!("Rejection reason: {}", reason));
            }
        })?;
        tracing::info!("🚫 Rejected {}", item.id);
        Ok(item)
    }

    /// 淺層合併到 data，狀態改為 modified
    pub fn modify_item(&self, id: &str, modifications: Map<String, Value>) -> Result<ReviewItem> {
        let item = self.update_item(id, |item| {
            for (key, value) in modifications {
                item.data.insert(key, value);
            }
            item.status = ItemStatus::Modified;
        })?;
        tracing::info!("✏️ Modified {}", item.id);
        Ok(item)
    }

    pub fn statistics(&self) -> Result<QueueStats> {
        let items = self.storage.load_items()?;

        let mut by_status: BTreeMap<ItemStatus, usize> =
            ItemStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_type: BTreeMap<ItemType, usize> = BTreeMap::new();

        for item in &items {
            *by_status.entry(item.status).or_insert(0) += 1;
            *by_type.entry(item.item_type).or_insert(0) += 1;
        }

        let oldest_pending = items
            .iter()
            .filter(|i| i.status == ItemStatus::Pending)
            .map(|i| i.created_at.clone())
            .min();
        let newest_item = items.iter().map(|i| i.created_at.clone()).max();

        Ok(QueueStats {
            total: items.len(),
            by_status,
            by_type,
            oldest_pending,
            newest_item,
        })
    }

    pub fn export_approved(&self, output_path: &Path) -> Result<usize> {
        let items = self.storage.load_items()?;
        let approved: Vec<&ReviewItem> = items
            .iter()
            .filter(|i| i.status == ItemStatus::Approved)
            .collect();

        let export = ApprovedExport {
            exported_at: now_iso(),
            count: approved.len(),
            items: approved,
        };

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(output_path, serde_json::to_string_pretty(&export)?)?;

        tracing::info!(
            "📦 Exported {} approved item(s) to {}",
            export.count,
            output_path.display()
        );
        Ok(export.count)
    }

    /// 封存 approved 與 rejected，保留 pending 與 modified
    pub fn clear_approved(&self) -> Result<usize> {
        self.storage.with_lock(|| {
            let (to_archive, to_keep): (Vec<ReviewItem>, Vec<ReviewItem>) = self
                .storage
                .load_items()?
                .into_iter()
                .partition(|i| i.status.is_decided());

            if !to_archive.is_empty() {
                self.archive.with_lock(|| {
                    let mut archived = self.archive.load_items()?;
                    archived.extend(to_archive.iter().cloned());
                    self.archive.save_items(&archived)
                })?;
            }

            self.storage.save_items(&to_keep)?;
            tracing::info!("🗄️ Archived {} item(s)", to_archive.len());
            Ok(to_archive.len())
        })
    }

    /// 給掃描器等自動化流程使用；信心值低於 1.0 時寫入備註
    pub fn add_to_queue(
        &self,
        item_type: ItemType,
        data: Map<String, Value>,
        suggested_action: &str,
        notes: &str,
        confidence: f64,
    ) -> Result<String> {
        let notes = with_confidence_note(notes, confidence);
        let item = self.add_item(item_type, data, suggested_action, &notes)?;
        Ok(item.id)
    }

    /// 佇列與封存檔都沒有同一個 `data.record_id` 時才加入；已存在則回傳 None。
    ///
    /// 檢查與寫入在同一個佇列鎖內，封存檔的鎖在其內取得。
    pub fn enqueue_unique(
        &self,
        record_id: &str,
        item_type: ItemType,
        mut data: Map<String, Value>,
        suggested_action: &str,
        notes: &str,
        confidence: f64,
    ) -> Result<Option<String>> {
        Self::check_id(record_id)?;
        data.insert("record_id".into(), Value::from(record_id));

        self.storage.with_lock(|| {
            let mut items = self.storage.load_items()?;
            if items.iter().any(|i| has_record_id(i, record_id)) {
                return Ok(None);
            }

            let archived = self.archive.with_lock(|| self.archive.load_items())?;
            if archived.iter().any(|i| has_record_id(i, record_id)) {
                tracing::debug!("Record {} was already reviewed and archived", record_id);
                return Ok(None);
            }

            let item = ReviewItem::new(
                item_type,
                data,
                suggested_action,
                with_confidence_note(notes, confidence),
            );
            let id = item.id.clone();
            items.push(item);
            self.storage.save_items(&items)?;

            tracing::info!("➕ Added {} item {} to review queue", item_type, id);
            Ok(Some(id))
        })
    }

    /// 下游同步（例如 Notion）要處理的已核准項目
    pub fn approved_items(&self, item_type: Option<ItemType>) -> Result<Vec<ReviewItem>> {
        self.list_items(&ListFilter {
            include_all: true,
            status: Some(ItemStatus::Approved),
            item_type,
        })
    }

    /// 已同步的核准項目移到封存檔；不存在或未核准時回傳 false
    pub fn mark_item_processed(&self, id: &str) -> Result<bool> {
        Self::check_id(id)?;
        self.storage.with_lock(|| {
            let mut items = self.storage.load_items()?;
            let Some(index) = items.iter().position(|i| i.matches_id(id)) else {
                return Ok(false);
            };
            if items[index].status != ItemStatus::Approved {
                tracing::warn!(
                    "Item {} is {}, only approved items can be marked processed",
                    items[index].id,
                    items[index].status
                );
                return Ok(false);
            }

            let mut processed = items.remove(index);
            processed.append_note(&format!("Processed: {}", now_iso()));

            self.archive.with_lock(|| {
                let mut archived = self.archive.load_items()?;
                archived.push(processed.clone());
                self.archive.save_items(&archived)
            })?;
            self.storage.save_items(&items)?;

            tracing::info!("📤 Marked {} as processed", processed.id);
            Ok(true)
        })
    }
}

fn has_record_id(item: &ReviewItem, record_id: &str) -> bool {
    item.data.get("record_id").and_then(Value::as_str) == Some(record_id)
}

fn with_confidence_note(notes: &str, confidence: f64) -> String {
    if confidence >= 1.0 {
        return notes.to_string();
    }
    let confidence_note = format!("Confidence: {:.2}", confidence);
    if notes.is_empty() {
        confidence_note
    } else {
        format!("{}\n{}", notes, confidence_note).trim().to_string()
    }
}
