//! 内存对象存储 / In-memory object store
//!
//! 克隆共享同一份数据，可作为连接器直接交给跟踪器；支持故障注入
//! Clones share the same data, so a clone can serve as the tracker's connector;
//! supports fault injection

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BlobStore, StoreConnector};
use crate::error::StoreError;

/// 已存储对象 / Stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
struct Faults {
    get: Option<String>,
    put: Option<String>,
    connect: Option<String>,
}

#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<(String, String), StoredObject>>>,
    faults: Arc<Mutex<Faults>>,
    puts: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入原始字节（不经过跟踪器）/ Seed raw bytes, bypassing the tracker
    pub fn insert_raw(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                content_type: super::CONTENT_TYPE_JSON.to_string(),
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// 成功写入次数 / Number of successful puts
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// 之后的读取均失败（`None` 取消）/ Fail every later get (`None` clears)
    pub fn fail_gets(&self, message: Option<&str>) {
        self.faults.lock().get = message.map(str::to_string);
    }

    /// 之后的写入均失败（`None` 取消）/ Fail every later put (`None` clears)
    pub fn fail_puts(&self, message: Option<&str>) {
        self.faults.lock().put = message.map(str::to_string);
    }

    pub fn fail_connects(&self, message: Option<&str>) {
        self.faults.lock().connect = message.map(str::to_string);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        if let Some(message) = self.faults.lock().get.clone() {
            return Err(StoreError::Unavailable(message));
        }
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.body.clone())
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        if let Some(message) = self.faults.lock().put.clone() {
            return Err(StoreError::Unavailable(message));
        }
        self.objects.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl StoreConnector for MemoryBlobStore {
    type Store = MemoryBlobStore;

    async fn connect(&self) -> Result<Self::Store, StoreError> {
        if let Some(message) = self.faults.lock().connect.clone() {
            return Err(StoreError::Unavailable(message));
        }
        Ok(self.clone())
    }
}
