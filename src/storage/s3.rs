//! S3 兼容对象存储 / S3-compatible object store
//!
//! 路径风格寻址（`{endpoint}/{bucket}/{key}`），SigV4 头部签名
//! Path-style addressing (`{endpoint}/{bucket}/{key}`), SigV4 header signing

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use tracing::debug;

use super::sigv4::{self, Credentials, SigningRequest};
use super::{BlobStore, StoreConnector};
use crate::comm::config::TrackerConfig;
use crate::error::StoreError;

const NO_SUCH_KEY: &str = "NoSuchKey";

/// S3 连接器：持有端点与凭证，每个会话构建一个 HTTP 客户端
/// S3 connector: holds endpoint and credentials, builds one HTTP client per session
#[derive(Clone)]
pub struct S3Connector {
    endpoint: Url,
    credentials: Credentials,
    region: String,
    timeout: Option<Duration>,
}

impl S3Connector {
    pub fn from_config(config: &TrackerConfig) -> Result<Self, StoreError> {
        let raw = config.endpoint_url.trim();
        let endpoint =
            Url::parse(raw).map_err(|e| StoreError::Endpoint(format!("{}: {}", raw, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.host_str().is_none() {
            return Err(StoreError::Endpoint(raw.to_string()));
        }
        Ok(Self {
            endpoint,
            credentials: Credentials {
                access_key_id: config.access_key_id.clone(),
                secret_access_key: config.secret_access_key.clone(),
            },
            region: config.region.clone(),
            timeout: config.request_timeout_ms.map(Duration::from_millis),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl StoreConnector for S3Connector {
    type Store = S3BlobStore;

    async fn connect(&self) -> Result<Self::Store, StoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        debug!("🔌 S3 client ready / endpoint={}", self.endpoint);
        Ok(S3BlobStore {
            client,
            endpoint: self.endpoint.clone(),
            credentials: self.credentials.clone(),
            region: self.region.clone(),
        })
    }
}

pub struct S3BlobStore {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Credentials,
    region: String,
}

/// 对象地址 / Object address
#[derive(Debug, PartialEq, Eq)]
struct ObjectLocation {
    url: String,
    host: String,
    canonical_uri: String,
}

fn object_location(endpoint: &Url, bucket: &str, key: &str) -> ObjectLocation {
    let host = match (endpoint.host_str(), endpoint.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    let canonical_uri = format!(
        "{}/{}/{}",
        endpoint.path().trim_end_matches('/'),
        urlencoding::encode(bucket),
        sigv4::encode_key(key)
    );
    ObjectLocation {
        url: format!("{}://{}{}", endpoint.scheme(), host, canonical_uri),
        host,
        canonical_uri,
    }
}

/// 从 S3 XML 错误体中提取标签内容 / Extract a tag from an S3 XML error body
fn xml_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim())
}

fn rejected(operation: &'static str, status: StatusCode, body: &str) -> StoreError {
    StoreError::Rejected {
        operation,
        status: status.as_u16(),
        code: xml_tag(body, "Code").unwrap_or("").to_string(),
        message: xml_tag(body, "Message")
            .map(str::to_string)
            .unwrap_or_else(|| body.chars().take(200).collect()),
    }
}

/// 404 只有在 `NoSuchKey` 或空响应体时才算“无历史状态”，其余 404 仍是错误
/// A 404 means "no prior state" only for `NoSuchKey` or an empty body; any other
/// 404 (missing bucket, proxy page) is still an error
fn classify_get_failure(status: StatusCode, body: &str, bucket: &str, key: &str) -> StoreError {
    if status == StatusCode::NOT_FOUND
        && (xml_tag(body, "Code") == Some(NO_SUCH_KEY) || body.trim().is_empty())
    {
        return StoreError::not_found(bucket, key);
    }
    rejected("GetObject", status, body)
}

impl S3BlobStore {
    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StoreError> {
        let location = object_location(&self.endpoint, bucket, key);
        let now = chrono::Utc::now();
        let payload_sha256 = sigv4::sha256_hex(&body);
        let amz_date = sigv4::amz_date(&now);
        let headers = [
            ("host", location.host.clone()),
            ("x-amz-content-sha256", payload_sha256.clone()),
            ("x-amz-date", amz_date.clone()),
        ];
        let authorization = sigv4::authorization(
            &self.credentials,
            &self.region,
            &now,
            &SigningRequest {
                method: method.as_str(),
                canonical_uri: &location.canonical_uri,
                headers: &headers,
                payload_sha256: &payload_sha256,
            },
        );

        debug!("➡️  {} {}", method, location.url);
        let mut request = self
            .client
            .request(method, &location.url)
            .header("x-amz-content-sha256", payload_sha256)
            .header("x-amz-date", amz_date)
            .header("authorization", authorization);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        Ok(request.body(body).send().await?)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.send(Method::GET, bucket, key, Vec::new(), None).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_get_failure(status, &body, bucket, key))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let response = self
            .send(Method::PUT, bucket, key, body, Some(content_type))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(rejected("PutObject", status, &body))
    }
}
