//! AWS Signature V4 请求签名 / AWS Signature V4 request signing
//!
//! 仅覆盖本库需要的子集：无查询参数、头部签名、S3 服务
//! Covers the subset this crate needs: no query string, header-based auth, S3 service

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// 空请求体的 SHA-256 / SHA-256 of an empty payload
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// 访问凭证 / Access credentials
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// 待签名请求 / Request to sign
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// 已编码的路径 / Already URI-encoded path
    pub canonical_uri: &'a str,
    /// 参与签名的头部（名称小写）/ Signed headers, lowercase names
    pub headers: &'a [(&'a str, String)],
    pub payload_sha256: &'a str,
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn amz_date(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

fn date_stamp(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

/// 派生签名密钥 / Derive the signing key
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn canonical_request(req: &SigningRequest<'_>) -> (String, String) {
    let mut headers: Vec<(String, String)> = req
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        req.method, req.canonical_uri, canonical_headers, signed_headers, req.payload_sha256
    );
    (canonical, signed_headers)
}

/// 计算 `Authorization` 头 / Compute the `Authorization` header value
pub fn authorization(
    credentials: &Credentials,
    region: &str,
    now: &DateTime<Utc>,
    req: &SigningRequest<'_>,
) -> String {
    let date = date_stamp(now);
    let scope = format!("{}/{}/{}/aws4_request", date, region, SERVICE);
    let (canonical, signed_headers) = canonical_request(req);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date(now),
        scope,
        sha256_hex(canonical.as_bytes())
    );
    let key = signing_key(&credentials.secret_access_key, &date, region, SERVICE);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));
    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    )
}

/// 按 S3 规则编码对象键：保留 `/`，其余非保留字符百分号编码
/// Encode an object key the S3 way: keep `/`, percent-encode everything else
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
