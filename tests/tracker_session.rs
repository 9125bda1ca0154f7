//! 跟踪器会话集成测试 / Tracker session integration tests

use anyhow::{anyhow, Result};
use futures_util::FutureExt;
use s3_objects_tracker::{
    MemoryBlobStore, ObjectsTracker, Phase, SessionError, StoreError, Trackable, TrackerConfig,
    TrackerError,
};
use std::panic::AssertUnwindSafe;

const BUCKET: &str = "test-bucket";
const KEY: &str = "data.json";

#[derive(Debug, Clone, PartialEq)]
struct Object {
    id: u64,
}

impl Trackable for Object {
    type Id = u64;

    fn id(&self) -> &u64 {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Article {
    slug: String,
}

impl Trackable for Article {
    type Id = String;

    fn id(&self) -> &String {
        &self.slug
    }
}

fn objects(ids: std::ops::Range<u64>) -> Vec<Object> {
    ids.map(|id| Object { id }).collect()
}

fn config() -> TrackerConfig {
    TrackerConfig::new(
        BUCKET,
        "http://localhost:9000",
        "test-access-key-id",
        "test-secret-access-key",
    )
}

fn tracker(store: &MemoryBlobStore, max: usize) -> Result<ObjectsTracker<u64, MemoryBlobStore>> {
    Ok(ObjectsTracker::new(
        config().with_max_published_objects(max),
        store.clone(),
    )?)
}

async fn stored_ids(store: &MemoryBlobStore, max: usize) -> Result<Vec<u64>> {
    let session = tracker(store, max)?.open().await?;
    let ids = session.published_ids().to_vec();
    session.close().await?;
    Ok(ids)
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    /// 空存储：发布 10 个，再判断 5..15，最终 0..15 / Empty store, publish 10, then 5..15
    #[tokio::test]
    async fn test_common_workflow() -> Result<()> {
        let store = MemoryBlobStore::new();
        let first = objects(0..10);

        let mut session = tracker(&store, 50)?.open().await?;
        assert!(session.is_empty());
        let fresh = session.determine_new(first.clone());
        assert_eq!(fresh, first);
        for object in &fresh {
            session.publish(object);
        }
        session.close().await?;

        let next = objects(5..15);
        let mut session = tracker(&store, 50)?.open().await?;
        assert_eq!(session.published_ids(), (0..10u64).collect::<Vec<_>>().as_slice());
        let fresh = session.determine_new(&next);
        assert_eq!(fresh, next[5..].iter().collect::<Vec<_>>());
        for object in fresh {
            session.publish(object);
        }
        session.close().await?;

        assert_eq!(stored_ids(&store, 50).await?, (0..15u64).collect::<Vec<_>>());
        Ok(())
    }

    /// 窗口为 5：0 被淘汰，1..=5 保留 / Window of 5 evicts 0 and keeps 1..=5
    #[tokio::test]
    async fn test_limit() -> Result<()> {
        let store = MemoryBlobStore::new();

        let mut session = tracker(&store, 5)?.open().await?;
        for object in session.determine_new(objects(0..5)) {
            session.publish(&object);
        }
        session.close().await?;

        let mut session = tracker(&store, 5)?.open().await?;
        assert_eq!(session.published_ids(), &[0, 1, 2, 3, 4]);
        let fresh = session.determine_new(objects(0..6));
        assert_eq!(fresh, vec![Object { id: 5 }]);
        session.publish(&fresh[0]);
        session.close().await?;

        assert_eq!(stored_ids(&store, 5).await?, vec![1, 2, 3, 4, 5]);
        Ok(())
    }

    /// 从未写入的键：空集合，全部为新 / Never-written key: empty set, everything is new
    #[tokio::test]
    async fn test_empty_object_storage() -> Result<()> {
        let store = MemoryBlobStore::new();
        let session = tracker(&store, 50)?.open().await?;
        assert!(session.published_ids().is_empty());
        let batch = objects(0..3);
        assert_eq!(session.determine_new(&batch).len(), 3);
        session.close().await?;

        assert_eq!(store.object(BUCKET, KEY).unwrap().body, b"[]\n");
        Ok(())
    }

    /// 持久化格式与内容类型 / Persisted bytes and content type
    #[tokio::test]
    async fn test_persisted_format() -> Result<()> {
        let store = MemoryBlobStore::new();
        let mut session = tracker(&store, 50)?.open().await?;
        for object in objects(0..3) {
            session.publish(&object);
        }
        session.close().await?;

        let stored = store.object(BUCKET, KEY).unwrap();
        assert_eq!(stored.body, b"[0, 1, 2]\n");
        assert_eq!(stored.content_type, "application/json");
        assert_eq!(store.put_count(), 1);
        Ok(())
    }

    /// 字符串 ID 与自定义键 / String ids under a custom key
    #[tokio::test]
    async fn test_string_ids_round_trip() -> Result<()> {
        let store = MemoryBlobStore::new();
        let tracker: ObjectsTracker<String, _> =
            ObjectsTracker::new(config().with_filename("feeds/articles.json"), store.clone())?;

        let articles: Vec<Article> = ["hello-world", "second-post"]
            .iter()
            .map(|slug| Article {
                slug: slug.to_string(),
            })
            .collect();
        let mut session = tracker.open().await?;
        for article in &articles {
            session.publish(article);
        }
        session.close().await?;

        assert_eq!(
            store.object(BUCKET, "feeds/articles.json").unwrap().body,
            b"[\"hello-world\", \"second-post\"]\n"
        );
        assert!(store.object(BUCKET, KEY).is_none());

        let session = tracker.open().await?;
        let fresh = session.determine_new(vec![
            Article {
                slug: "second-post".to_string(),
            },
            Article {
                slug: "third-post".to_string(),
            },
        ]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].slug, "third-post");
        session.close().await?;
        Ok(())
    }

    /// 过滤结果恰好是未出现的成员，保持输入顺序 / Filter yields exactly non-members in order
    #[tokio::test]
    async fn test_filter_matches_membership() -> Result<()> {
        let store = MemoryBlobStore::new();
        let known: Vec<u64> = (0..40).map(|i| (i * 7919) % 97).collect();
        let mut session = tracker(&store, 100)?.open().await?;
        for id in &known {
            session.publish(&Object { id: *id });
        }
        session.close().await?;

        let session = tracker(&store, 100)?.open().await?;
        for seed in 1..20u64 {
            let batch: Vec<Object> = (0..30)
                .map(|i| Object {
                    id: (seed * 31 + i * 13) % 120,
                })
                .collect();
            let expected: Vec<&Object> = batch.iter().filter(|o| !known.contains(&o.id)).collect();
            assert_eq!(session.determine_new(&batch), expected);
        }
        session.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod scoped_tests {
    use super::*;

    /// 会话内报错：已发布的 ID 仍被保存，原错误原样返回
    /// Error inside the session: publishes are still saved, the error propagates unchanged
    #[tokio::test]
    async fn test_exception_during_ctx() -> Result<()> {
        let store = MemoryBlobStore::new();
        let result: std::result::Result<(), SessionError<anyhow::Error>> = tracker(&store, 50)?
            .scoped(|session| {
                Box::pin(async move {
                    session.publish(&Object { id: 1 });
                    Err(anyhow!("Test exception"))
                })
            })
            .await;

        match result {
            Err(SessionError::Body { source, save: None }) => {
                assert_eq!(source.to_string(), "Test exception")
            }
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
        assert_eq!(stored_ids(&store, 50).await?, vec![1]);
        Ok(())
    }

    /// 正常退出返回调用方的值 / Normal exit returns the body's value
    #[tokio::test]
    async fn test_scoped_returns_new_objects() -> Result<()> {
        let store = MemoryBlobStore::new();
        store.insert_raw(BUCKET, KEY, "[1, 2]\n");

        let batch = objects(0..4);
        let fresh = tracker(&store, 50)?
            .scoped(move |session| {
                Box::pin(async move {
                    let fresh = session.determine_new(batch);
                    for object in &fresh {
                        session.publish(object);
                    }
                    Ok::<_, anyhow::Error>(fresh)
                })
            })
            .await
            .map_err(SessionError::into_anyhow)?;

        assert_eq!(fresh, vec![Object { id: 0 }, Object { id: 3 }]);
        assert_eq!(stored_ids(&store, 50).await?, vec![1, 2, 0, 3]);
        Ok(())
    }

    /// panic 时先保存再继续 panic / A panic still saves, then resumes
    #[tokio::test]
    async fn test_panic_during_ctx_still_saves() -> Result<()> {
        let store = MemoryBlobStore::new();
        let tracker = tracker(&store, 50)?;

        let outcome = AssertUnwindSafe(tracker.scoped(|session| {
            Box::pin(async move {
                session.publish(&Object { id: 42 });
                if session.len() == 1 {
                    panic!("body panicked");
                }
                Ok::<(), anyhow::Error>(())
            })
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(stored_ids(&store, 50).await?, vec![42]);
        Ok(())
    }

    /// 保存失败而调用方成功：返回保存错误 / Body ok but save fails: the save error surfaces
    #[tokio::test]
    async fn test_save_failure_surfaces() -> Result<()> {
        let store = MemoryBlobStore::new();
        let tracker = tracker(&store, 50)?;
        store.fail_puts(Some("bucket is read-only"));

        let result = tracker
            .scoped(|session| {
                Box::pin(async move {
                    session.publish(&Object { id: 7 });
                    Ok::<_, anyhow::Error>(())
                })
            })
            .await;

        match result {
            Err(SessionError::Save(TrackerError::Storage {
                phase: Phase::Save,
                source: StoreError::Unavailable(message),
                ..
            })) => assert_eq!(message, "bucket is read-only"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        Ok(())
    }

    /// 调用方报错且保存失败：两者都可见 / Body error and save failure are both observable
    #[tokio::test]
    async fn test_body_error_and_save_failure_are_both_kept() -> Result<()> {
        let store = MemoryBlobStore::new();
        let tracker = tracker(&store, 50)?;
        store.fail_puts(Some("connection reset"));

        let result = tracker
            .scoped(|session| {
                Box::pin(async move {
                    session.publish(&Object { id: 7 });
                    Err::<(), _>(anyhow!("feed parse failed"))
                })
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(
            err.body_error().map(|e| e.to_string()).as_deref(),
            Some("feed parse failed")
        );
        assert!(err.save_error().is_some());
        let text = err.to_string();
        assert!(text.contains("feed parse failed"));
        assert!(text.contains("connection reset"));
        assert_eq!(store.put_count(), 0);
        Ok(())
    }
}

#[cfg(test)]
mod failure_tests {
    use super::*;

    /// 非“不存在”的读取错误会中止会话 / Load errors other than not-found abort entry
    #[tokio::test]
    async fn test_load_failure_aborts_entry() -> Result<()> {
        let store = MemoryBlobStore::new();
        store.fail_gets(Some("access denied"));
        let tracker = tracker(&store, 50)?;

        assert!(matches!(
            tracker.open().await,
            Err(TrackerError::Storage {
                phase: Phase::Load,
                ..
            })
        ));

        let result = tracker
            .scoped(|session| {
                Box::pin(async move {
                    session.publish(&Object { id: 1 });
                    Ok::<_, anyhow::Error>(())
                })
            })
            .await;
        assert!(matches!(result, Err(SessionError::Open(_))));
        assert_eq!(store.put_count(), 0);
        Ok(())
    }

    /// 连接失败同样中止 / A connect failure aborts entry too
    #[tokio::test]
    async fn test_connect_failure_aborts_entry() -> Result<()> {
        let store = MemoryBlobStore::new();
        store.fail_connects(Some("dns lookup failed"));
        let err = tracker(&store, 50)?.open().await.err().unwrap();
        assert!(err.to_string().contains("dns lookup failed"));
        Ok(())
    }

    /// 内容损坏：解析错误，且不覆盖原内容 / Malformed content: decode error, blob left intact
    #[tokio::test]
    async fn test_malformed_content_is_decode_error() -> Result<()> {
        let store = MemoryBlobStore::new();
        store.insert_raw(BUCKET, KEY, "{\"ids\": [1, 2]}");
        assert!(matches!(
            tracker(&store, 50)?.open().await,
            Err(TrackerError::Decode { .. })
        ));

        store.insert_raw(BUCKET, KEY, "[\"a\", \"b\"]\n");
        assert!(matches!(
            tracker(&store, 50)?.open().await,
            Err(TrackerError::Decode { .. })
        ));
        assert_eq!(store.put_count(), 0);
        assert_eq!(store.object(BUCKET, KEY).unwrap().body, b"[\"a\", \"b\"]\n");
        Ok(())
    }

    /// 非正窗口在构造时失败 / A non-positive window fails at construction
    #[tokio::test]
    async fn test_invalid_configuration_fails_fast() -> Result<()> {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            tracker(&store, 0).map(|_| ()).map_err(|e| e.downcast::<TrackerError>()),
            Err(Ok(TrackerError::Configuration(_)))
        ));
        let result: std::result::Result<ObjectsTracker<u64, _>, _> =
            ObjectsTracker::new(TrackerConfig::new("", "http://s3", "ak", "sk"), store);
        assert!(matches!(result, Err(TrackerError::Configuration(_))));
        Ok(())
    }
}
