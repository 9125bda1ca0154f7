//! # 已发布对象跟踪器 / Published Objects Tracker
//!
//! 把已发布对象的 ID 保存在对象存储中的单个 JSON 文件里，跨进程重启去重
//! Keeps the ids of published objects in a single JSON blob on an object store,
//! so polling pipelines skip what they already emitted across restarts
//!
//! 生命周期 / Lifecycle: `open` → `determine_new` / `publish` → `close`.
//! `scoped` 保证无论调用方代码成功、返回错误还是 panic，都会执行保存
//! `scoped` guarantees the save runs whether the body succeeds, errors or panics

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, error};

pub mod codec;
pub mod identifier;
pub mod session;
pub mod window;

pub use identifier::{Identifier, Trackable};
pub use session::TrackerSession;
pub use window::EvictionWindow;

use crate::comm::config::TrackerConfig;
use crate::error::{Phase, Result, SessionError, TrackerError};
use crate::storage::{S3Connector, StoreConnector};
use session::SessionTarget;

/// 已发布对象跟踪器 / Published objects tracker
///
/// 跟踪器本身不保存状态，状态只存在于会话中
/// The tracker holds no state itself; state lives only inside a session
pub struct ObjectsTracker<I, C> {
    config: TrackerConfig,
    window: EvictionWindow,
    connector: C,
    _id: PhantomData<fn() -> I>,
}

/// 基于 S3 的跟踪器 / S3-backed tracker
pub type S3ObjectsTracker<I> = ObjectsTracker<I, S3Connector>;

impl<I: Identifier, C: StoreConnector> ObjectsTracker<I, C> {
    /// 创建跟踪器，非法参数立即失败 / Create a tracker; invalid parameters fail fast
    pub fn new(config: TrackerConfig, connector: C) -> Result<Self> {
        config.validate()?;
        let window = NonZeroUsize::new(config.max_published_objects)
            .map(EvictionWindow::new)
            .ok_or_else(|| TrackerError::configuration("max_published_objects must be positive"))?;
        Ok(Self {
            config,
            window,
            connector,
            _id: PhantomData,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn target(&self) -> SessionTarget {
        SessionTarget {
            bucket: self.config.bucket_name.clone(),
            key: self.config.filename.clone(),
            window: self.window,
        }
    }

    /// 打开会话：连接存储并加载已发布 ID
    /// Open a session: connect to the store and load the published ids
    pub async fn open(&self) -> Result<TrackerSession<I, C::Store>> {
        debug!(
            "🗄️  opening tracker session / bucket={} key={}",
            self.config.bucket_name, self.config.filename
        );
        let store = self
            .connector
            .connect()
            .await
            .map_err(|e| TrackerError::storage(Phase::Load, &self.config.filename, e))?;
        TrackerSession::load(store, self.target()).await
    }

    /// 在会话作用域内运行 `body`，退出时总是保存
    /// Run `body` inside a session; the save always runs on exit
    ///
    /// - `body` 返回错误时原样保留，保存失败一并附带
    ///   A body error is kept unchanged, with any save failure attached
    /// - `body` panic 时先保存再继续 panic
    ///   A body panic is resumed after the save
    ///
    /// ```no_run
    /// # use s3_objects_tracker::{MemoryBlobStore, ObjectsTracker, TrackerConfig};
    /// # async fn run() -> anyhow::Result<()> {
    /// let store = MemoryBlobStore::new();
    /// let tracker: ObjectsTracker<u64, _> =
    ///     ObjectsTracker::new(TrackerConfig::new("feeds", "http://localhost:9000", "ak", "sk"), store)?;
    /// let fresh = tracker
    ///     .scoped(|session| {
    ///         Box::pin(async move {
    ///             let fresh = session.determine_new(vec![1u64, 2, 3].iter().map(|id| Id(*id)));
    ///             for item in &fresh {
    ///                 session.publish(item);
    ///             }
    ///             Ok::<_, anyhow::Error>(fresh.len())
    ///         })
    ///     })
    ///     .await;
    /// # struct Id(u64);
    /// # impl s3_objects_tracker::Trackable for Id {
    /// #     type Id = u64;
    /// #     fn id(&self) -> &u64 { &self.0 }
    /// # }
    /// # let _ = fresh;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<F, T, E>(&self, body: F) -> std::result::Result<T, SessionError<E>>
    where
        F: for<'s> FnOnce(&'s mut TrackerSession<I, C::Store>) -> BoxFuture<'s, std::result::Result<T, E>>,
    {
        let mut session = self.open().await.map_err(SessionError::Open)?;
        let outcome = AssertUnwindSafe(body(&mut session)).catch_unwind().await;
        let saved = session.close().await;

        match outcome {
            Err(panic) => {
                if let Err(e) = saved {
                    error!("❌ failed to save published ids after panic: {}", e);
                }
                std::panic::resume_unwind(panic)
            }
            Ok(Ok(value)) => saved.map(|_| value).map_err(SessionError::Save),
            Ok(Err(source)) => Err(SessionError::Body {
                source,
                save: saved.err(),
            }),
        }
    }
}

impl<I: Identifier> ObjectsTracker<I, S3Connector> {
    /// 基于配置创建 S3 跟踪器 / Create an S3-backed tracker from configuration
    pub fn s3(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let connector = S3Connector::from_config(&config)
            .map_err(|e| TrackerError::configuration(e.to_string()))?;
        Self::new(config, connector)
    }
}
