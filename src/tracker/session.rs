//! # 跟踪会话 / Tracker Session
//!
//! 一个会话 = 一次加载 + 若干次发布 + 一次保存
//! One session = one load + any number of publishes + one save
//!
//! `close` 消费会话，因此关闭后的调用无法通过编译；未关闭就被丢弃的会话会记录警告
//! `close` consumes the session, so use after close does not compile; a session
//! dropped without closing logs a warning and skips the save

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::codec;
use super::identifier::{Identifier, Trackable};
use super::window::EvictionWindow;
use crate::error::{Phase, Result, TrackerError};
use crate::storage::{BlobStore, CONTENT_TYPE_JSON};

/// 会话目标：桶、键与淘汰窗口 / Session target: bucket, key and eviction window
#[derive(Debug, Clone)]
pub(crate) struct SessionTarget {
    pub bucket: String,
    pub key: String,
    pub window: EvictionWindow,
}

pub struct TrackerSession<I, S> {
    store: Option<S>,
    target: SessionTarget,
    /// 发布顺序，允许重复 / Publish order, duplicates allowed
    published_ids: Vec<I>,
    index: HashSet<I>,
    loaded: usize,
    closed: bool,
}

impl<I: Identifier, S: BlobStore> TrackerSession<I, S> {
    /// 加载已发布 ID；键不存在时从空开始
    /// Load published ids; start empty when the key does not exist
    pub(crate) async fn load(store: S, target: SessionTarget) -> Result<Self> {
        let published_ids: Vec<I> = match store.get(&target.bucket, &target.key).await {
            Ok(bytes) => codec::decode_ids(&bytes).map_err(|source| TrackerError::Decode {
                key: target.key.clone(),
                source,
            })?,
            Err(e) if e.is_not_found() => {
                info!(
                    "📭 no prior state, starting empty / bucket={} key={}",
                    target.bucket, target.key
                );
                Vec::new()
            }
            Err(e) => return Err(TrackerError::storage(Phase::Load, &target.key, e)),
        };

        info!(
            "📥 loaded {} published ids / bucket={} key={}",
            published_ids.len(),
            target.bucket,
            target.key
        );
        let index = published_ids.iter().cloned().collect();
        Ok(Self {
            store: Some(store),
            loaded: published_ids.len(),
            target,
            published_ids,
            index,
            closed: false,
        })
    }

    /// 返回尚未发布的候选对象，保持输入顺序，不修改状态
    /// Candidates not yet published, in input order; does not mutate state
    pub fn determine_new<T, C>(&self, candidates: C) -> Vec<T>
    where
        C: IntoIterator<Item = T>,
        T: Trackable<Id = I>,
    {
        candidates
            .into_iter()
            .filter(|candidate| !self.index.contains(candidate.id()))
            .collect()
    }

    /// 记录已发布对象的 ID，不做去重检查
    /// Record the object's id; no uniqueness check
    pub fn publish<T>(&mut self, object: &T)
    where
        T: Trackable<Id = I> + ?Sized,
    {
        let id = object.id().clone();
        debug!("📌 published {:?}", id);
        self.index.insert(id.clone());
        self.published_ids.push(id);
    }

    pub fn is_published(&self, id: &I) -> bool {
        self.index.contains(id)
    }

    /// 当前内存中的 ID（保存前不截断）/ In-memory ids, untruncated until save
    pub fn published_ids(&self) -> &[I] {
        &self.published_ids
    }

    pub fn len(&self) -> usize {
        self.published_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.published_ids.is_empty()
    }

    /// 本会话新增的数量 / Ids recorded during this session
    pub fn published_in_session(&self) -> usize {
        self.published_ids.len().saturating_sub(self.loaded)
    }

    /// 截断、保存并释放存储连接 / Truncate, save and release the store connection
    pub async fn close(mut self) -> Result<()> {
        self.save().await
    }

    async fn save(&mut self) -> Result<()> {
        self.closed = true;
        let evicted = self.target.window.apply(&mut self.published_ids);
        let body = codec::encode_ids(&self.published_ids).map_err(TrackerError::Encode)?;

        // 保存后 store 随之释放 / the store is released once the save returns
        let Some(store) = self.store.take() else {
            return Ok(());
        };
        store
            .put(&self.target.bucket, &self.target.key, body, CONTENT_TYPE_JSON)
            .await
            .map_err(|e| TrackerError::storage(Phase::Save, &self.target.key, e))?;

        info!(
            "📤 saved {} published ids ({} evicted) / bucket={} key={}",
            self.published_ids.len(),
            evicted,
            self.target.bucket,
            self.target.key
        );
        Ok(())
    }
}

impl<I, S> Drop for TrackerSession<I, S> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "⚠️ tracker session dropped without saving, {} ids recorded this session are lost / bucket={} key={}",
                self.published_ids.len().saturating_sub(self.loaded),
                self.target.bucket,
                self.target.key
            );
        }
    }
}
