use crate::domain::model::{now_iso, QueueFile, ReviewItem};
use crate::utils::error::{Result, TreehouseError};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// 以 JSON 檔保存審核項目；寫入時先寫暫存檔再 rename
#[derive(Debug, Clone)]
pub struct QueueStorage {
    file_path: PathBuf,
}

impl QueueStorage {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn ensure_directory(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn read_file(&self) -> Result<QueueFile> {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(QueueFile::default()),
            Err(e) => return Err(e.into()),
        };

        // 只有語法錯誤才當成損毀；結構不符時回報錯誤，避免下一次寫入覆蓋既有項目
        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Corrupted JSON file at {} ({}), starting fresh",
                    self.file_path.display(),
                    e
                );
                return Ok(QueueFile::default());
            }
        };

        serde_json::from_value(value).map_err(|e| TreehouseError::ProcessingError {
            message: format!(
                "Unexpected queue file layout in {}: {}",
                self.file_path.display(),
                e
            ),
        })
    }

    fn write_file(&self, mut file: QueueFile) -> Result<()> {
        self.ensure_directory()?;
        file.metadata.last_modified = Some(now_iso());

        let temp_path = self.file_path.with_extension("tmp");
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.file_path)?;

        tracing::debug!(
            "Wrote {} item(s) to {}",
            file.items.len(),
            self.file_path.display()
        );
        Ok(())
    }

    pub fn load_items(&self) -> Result<Vec<ReviewItem>> {
        let file = self.read_file()?;
        let mut items = Vec::with_capacity(file.items.len());

        for (index, raw) in file.items.into_iter().enumerate() {
            match serde_json::from_value::<ReviewItem>(raw) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(
                    "Skipping unreadable entry #{} in {}: {}",
                    index,
                    self.file_path.display(),
                    e
                ),
            }
        }

        Ok(items)
    }

    /// 只取代 items，保留 metadata 的其他欄位
    pub fn save_items(&self, items: &[ReviewItem]) -> Result<()> {
        let mut file = self.read_file()?;
        file.items = items
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.write_file(file)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.file_path.with_extension("lock")
    }

    /// 在獨佔的 advisory lock 內執行操作；離開時（包含錯誤）自動釋放
    pub fn with_lock<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.ensure_directory()?;
        let _guard = FileLock::acquire(&self.lock_path())?;
        operation()
    }
}

struct FileLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| TreehouseError::LockError {
                path: path.display().to_string(),
                source,
            })?;

        #[cfg(unix)]
        {
            // SAFETY: fd 由 `file` 持有，在 guard 存活期間有效
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc != 0 {
                return Err(TreehouseError::LockError {
                    path: path.display().to_string(),
                    source: std::io::Error::last_os_error(),
                });
            }
        }

        tracing::trace!("Acquired lock {}", path.display());
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            // SAFETY: 同上；關檔時核心也會釋放
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
    }
}
