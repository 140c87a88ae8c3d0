use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::data_models::HistoryEntry;
use super::error_handler::ChatError;

/// 最多保留的历史条数
pub const HISTORY_CAPACITY: usize = 10;

const HISTORY_FILE: &str = "chat_history.json";

/// 本地持久化的历史记录：最新的在前，最多 10 条。
/// 整个列表存为一个 JSON 文件。
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// 读取并校验历史记录。
    ///
    /// 文件不存在时为空；整体无法解析为数组时删除文件并从空列表开始；
    /// 个别条目结构不合法时丢弃这些条目，并把过滤后的列表写回。
    /// 这些恢复都不会作为错误返回给调用方。
    pub fn load(base_path: &Path) -> Self {
        let path = base_path.join(HISTORY_FILE);
        let entries = Self::read_entries(&path);
        Self { path, entries }
    }

    fn read_entries(path: &Path) -> Vec<HistoryEntry> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("chat history at {} is unreadable ({}), clearing it", path.display(), e);
                Self::remove_corrupt(path);
                return Vec::new();
            }
        };

        let raw: Vec<serde_json::Value> = match serde_json::from_str(&contents) {
            Ok(items) => items,
            Err(e) => {
                warn!("chat history at {} is unreadable ({}), clearing it", path.display(), e);
                Self::remove_corrupt(path);
                return Vec::new();
            }
        };

        let total = raw.len();
        let valid: Vec<HistoryEntry> = raw
            .into_iter()
            .filter_map(|item| serde_json::from_value::<HistoryEntry>(item).ok())
            .collect();

        if valid.len() != total {
            warn!(
                "dropped {} invalid chat history entries from {}",
                total - valid.len(),
                path.display()
            );
            if let Err(e) = Self::write_entries(path, &valid) {
                warn!("failed to rewrite filtered chat history: {}", e);
            }
        }

        valid
    }

    fn remove_corrupt(path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!("failed to remove corrupt chat history: {}", e);
        }
    }

    fn write_entries(path: &Path, entries: &[HistoryEntry]) -> Result<(), ChatError> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| ChatError::StorageError {
                    message: format!("Failed to create history directory: {}", e),
                })?;
            }
        }

        let json = serde_json::to_string(entries).map_err(|e| ChatError::StorageError {
            message: format!("Failed to serialize chat history: {}", e),
        })?;

        fs::write(path, json).map_err(|e| ChatError::StorageError {
            message: format!("Failed to write chat history file: {}", e),
        })
    }

    /// 插到最前面，超出容量的旧记录被淘汰，然后落盘
    pub fn save(&mut self, entry: HistoryEntry) -> Result<(), ChatError> {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);
        debug!("saving chat history ({} entries)", self.entries.len());
        Self::write_entries(&self.path, &self.entries)
    }

    pub fn clear(&mut self) -> Result<(), ChatError> {
        self.entries.clear();
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| ChatError::StorageError {
                message: format!("Failed to delete chat history file: {}", e),
            })?;
        }
        Ok(())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn recent(&self, count: usize) -> &[HistoryEntry] {
        &self.entries[..count.min(self.entries.len())]
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
