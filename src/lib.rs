//! 已发布对象 ID 跟踪库，状态保存在 S3 兼容对象存储中的单个 JSON 文件
//! Tracks published object ids in a single JSON blob on S3-compatible storage

pub mod comm;
pub use crate::comm::config::{ConfigManager, ConfigSource, TrackerConfig};
pub use crate::comm::tracing::init_tracing;

pub mod error;
pub use crate::error::{describe_error, Phase, SessionError, StoreError, TrackerError};

pub mod storage;
pub use crate::storage::{BlobStore, MemoryBlobStore, S3BlobStore, S3Connector, StoreConnector};

pub mod tracker;
pub use crate::tracker::{
    EvictionWindow, Identifier, ObjectsTracker, S3ObjectsTracker, Trackable, TrackerSession,
};
