//! 对象存储模块 / Object Store Module
//!
//! 跟踪器只需要两项能力：按键读取（可区分“不存在”）与按键整体覆盖写入
//! The tracker needs two capabilities: get-by-key that can report "not found",
//! and put-by-key with full overwrite

use async_trait::async_trait;

use crate::error::StoreError;

pub mod memory;
pub mod s3;
pub mod sigv4;

pub use memory::{MemoryBlobStore, StoredObject};
pub use s3::{S3BlobStore, S3Connector};

/// JSON 内容类型 / JSON content type
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// 键值 Blob 存储 / Key/blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 读取对象；不存在时返回 `StoreError::NotFound`
    /// Fetch an object; `StoreError::NotFound` when the key is absent
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// 整体覆盖写入 / Overwrite the object
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// 存储连接器：每个会话建立一次连接，会话结束时释放
/// Store connector: one connection per session, released when the session ends
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: BlobStore;

    async fn connect(&self) -> Result<Self::Store, StoreError>;
}
