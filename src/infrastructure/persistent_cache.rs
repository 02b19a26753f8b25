//! 磁盘持久化缓存 - 基础设施层
//!
//! ## 职责
//!
//! 1. **内存热层**：所有读写先走内存映射
//! 2. **磁盘持久化**：每个键一个 JSON 文件，格式 `{"data": ..., "timestamp": 毫秒}`
//! 3. **过期处理**：超过 7 天的条目视为不存在（文件可以还在磁盘上）
//! 4. **启动加载**：扫描缓存目录一次，把未过期的条目载入内存
//!
//! ## 失败语义
//!
//! 磁盘错误永远不会传给调用方：读失败降级为缓存未命中，
//! 写失败只记录日志，内存副本在进程生命周期内仍然有效。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 缓存条目过期时间：7 天（毫秒）
const CACHE_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// 磁盘上的缓存文件格式
///
/// 这是对外的持久化契约，字段名不能改。
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    data: Value,
    timestamp: i64,
}

/// 磁盘持久化缓存
pub struct PersistentCache {
    cache_dir: PathBuf,
    memory: Mutex<HashMap<String, Value>>,
}

impl PersistentCache {
    /// 创建缓存并加载磁盘上的历史条目
    pub async fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache = Self {
            cache_dir: cache_dir.into(),
            memory: Mutex::new(HashMap::new()),
        };
        cache.init().await;
        cache
    }

    async fn init(&self) {
        if let Err(e) = fs::create_dir_all(&self.cache_dir).await {
            warn!(
                "⚠️ 无法创建缓存目录 {}: {}",
                self.cache_dir.display(),
                e
            );
            return;
        }
        self.load_from_disk().await;
    }

    /// 扫描缓存目录，把未过期的条目载入内存
    ///
    /// 损坏或无法读取的文件直接跳过。
    async fn load_from_disk(&self) {
        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "⚠️ 无法读取缓存目录 {}: {}",
                    self.cache_dir.display(),
                    e
                );
                return;
            }
        };

        let mut loaded = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            if let Some(data) = read_cache_file(&path).await {
                self.memory.lock().await.insert(key.to_string(), data);
                loaded += 1;
            }
        }

        info!("✓ 从缓存目录加载了 {} 条记录", loaded);
    }

    /// 读取缓存值
    ///
    /// 先查内存；未命中时尝试读对应文件，未过期则提升进内存
    /// （写穿提升）。磁盘错误降级为未命中。
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.memory.lock().await.get(key) {
            return Some(value.clone());
        }

        let path = self.entry_path(key);
        let data = read_cache_file(&path).await?;

        self.memory
            .lock()
            .await
            .insert(key.to_string(), data.clone());
        debug!("缓存从磁盘提升: {}", key);

        Some(data)
    }

    /// 写入缓存值
    ///
    /// 内存同步更新；磁盘写入尽力而为，失败只记日志。
    pub async fn set(&self, key: &str, value: Value) {
        self.memory
            .lock()
            .await
            .insert(key.to_string(), value.clone());

        let file = CacheFile {
            data: value,
            timestamp: Utc::now().timestamp_millis(),
        };
        let path = self.entry_path(key);

        match serde_json::to_string_pretty(&file) {
            Ok(content) => {
                if let Err(e) = fs::write(&path, content).await {
                    warn!("⚠️ 缓存写入磁盘失败 ({}): {}", key, e);
                }
            }
            Err(e) => {
                warn!("⚠️ 缓存序列化失败 ({}): {}", key, e);
            }
        }
    }

    /// 检查键是否在内存中（不查磁盘、不判断过期）
    pub async fn has(&self, key: &str) -> bool {
        self.memory.lock().await.contains_key(key)
    }

    /// 当前内存中的所有键
    pub async fn keys(&self) -> Vec<String> {
        self.memory.lock().await.keys().cloned().collect()
    }

    /// 当前内存条目数量
    pub async fn len(&self) -> usize {
        self.memory.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memory.lock().await.is_empty()
    }

    /// 清空内存层（磁盘文件保留）
    pub async fn clear(&self) {
        self.memory.lock().await.clear();
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }
}

/// 读取并校验单个缓存文件，过期或损坏返回 None
async fn read_cache_file(path: &Path) -> Option<Value> {
    let content = fs::read_to_string(path).await.ok()?;
    let parsed: CacheFile = serde_json::from_str(&content).ok()?;

    if Utc::now().timestamp_millis() - parsed.timestamp >= CACHE_TTL_MS {
        debug!("缓存条目已过期: {}", path.display());
        return None;
    }

    Some(parsed.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_raw_entry(dir: &Path, key: &str, data: Value, timestamp: i64) {
        let file = CacheFile { data, timestamp };
        std::fs::write(
            dir.join(format!("{}.json", key)),
            serde_json::to_string(&file).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::new(dir.path()).await;

        assert_eq!(cache.get("never_written").await, None);
    }

    #[tokio::test]
    async fn test_set_then_get_returns_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::new(dir.path()).await;

        let value = json!({"impedance": "8 ohms"});
        cache.set("specs_speaker_KEF_LS50", value.clone()).await;

        assert_eq!(cache.get("specs_speaker_KEF_LS50").await, Some(value));

        // 磁盘文件符合持久化契约
        let content =
            std::fs::read_to_string(dir.path().join("specs_speaker_KEF_LS50.json")).unwrap();
        let on_disk: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(on_disk["data"]["impedance"], "8 ohms");
        assert!(on_disk["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_even_if_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let stale = Utc::now().timestamp_millis() - CACHE_TTL_MS - 1000;
        write_raw_entry(dir.path(), "old_entry", json!("stale"), stale);

        let cache = PersistentCache::new(dir.path()).await;

        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.get("old_entry").await, None);
        // 文件本身还在磁盘上
        assert!(dir.path().join("old_entry.json").exists());
    }

    #[tokio::test]
    async fn test_disk_hit_promotes_into_memory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::new(dir.path()).await;

        // 初始化之后才落盘的文件：内存里没有
        write_raw_entry(
            dir.path(),
            "late_entry",
            json!(42),
            Utc::now().timestamp_millis(),
        );
        assert!(!cache.has("late_entry").await);

        // get 走磁盘并提升进内存
        assert_eq!(cache.get("late_entry").await, Some(json!(42)));
        assert!(cache.has("late_entry").await);
    }

    #[test]
    fn test_corrupt_file_is_skipped_on_startup() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
            write_raw_entry(
                dir.path(),
                "good",
                json!("ok"),
                Utc::now().timestamp_millis(),
            );

            let cache = PersistentCache::new(dir.path()).await;

            assert_eq!(cache.len().await, 1);
            assert_eq!(cache.get("good").await, Some(json!("ok")));
            assert_eq!(cache.get("broken").await, None);
        });
    }

    #[tokio::test]
    async fn test_startup_scan_loads_fresh_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_entry(
            dir.path(),
            "pairing_a_b",
            json!({"score": 80}),
            Utc::now().timestamp_millis(),
        );

        let cache = PersistentCache::new(dir.path()).await;

        assert!(cache.has("pairing_a_b").await);
        assert_eq!(cache.keys().await, vec!["pairing_a_b".to_string()]);
    }
}
