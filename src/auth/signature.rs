//! Galaxy V2 request signing (HMAC-SHA1)
//!
//! ```text
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedXiaomiHeaders +
//!                CanonicalizedResource
//! ```
//!
//! A presigned URI carries `Expires` in its query, which then replaces Date.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, DATE};
use reqwest::{Method, Url};
use sha1::Sha1;
use std::collections::BTreeMap;

use crate::error::{FdsError, FdsResult};
use crate::model::{format_http_date, XIAOMI_HEADER_PREFIX};

type HmacSha1 = Hmac<Sha1>;

const AUTHORIZATION_SCHEME: &str = "Galaxy-V2";
const EXPIRES_PARAM: &str = "Expires";

/// Query parameters that take part in the canonical resource
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "quota",
    "uploads",
    "partNumber",
    "uploadId",
    "storageAccessToken",
    "metadata",
];

#[derive(Clone)]
pub struct SignatureCredential {
    access_key_id: String,
    secret_access_key: String,
}

impl SignatureCredential {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Stamp `Date` and set `Authorization: Galaxy-V2 <key id>:<signature>`
    pub(crate) fn sign(&self, request: &mut reqwest::Request) -> FdsResult<()> {
        let date = HeaderValue::from_str(&format_http_date(Utc::now()))
            .map_err(|e| FdsError::Signing(e.to_string()))?;
        request.headers_mut().insert(DATE, date);

        let string_to_sign =
            build_string_to_sign(request.method(), request.url(), request.headers())?;
        let signature = compute_signature(&self.secret_access_key, &string_to_sign)?;

        let value = HeaderValue::from_str(&format!(
            "{} {}:{}",
            AUTHORIZATION_SCHEME, self.access_key_id, signature
        ))
        .map_err(|e| FdsError::Signing(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

impl std::fmt::Debug for SignatureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCredential")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

pub(crate) fn build_string_to_sign(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
) -> FdsResult<String> {
    let content_md5 = header_value(headers, "content-md5")?;
    let content_type = header_value(headers, "content-type")?;

    let expires = url
        .query_pairs()
        .find(|(key, _)| key == EXPIRES_PARAM)
        .map(|(_, value)| value.into_owned());
    let date = match expires {
        Some(expires) => expires,
        None => header_value(headers, "date")?,
    };

    let xiaomi_headers = canonicalize_xiaomi_headers(headers)?;
    let resource = canonicalize_resource(url);

    Ok(format!(
        "{}\n{}\n{}\n{}\n{}{}",
        method.as_str(),
        content_md5,
        content_type,
        date,
        xiaomi_headers,
        resource
    ))
}

/// `x-xiaomi-*` headers lowercased, sorted, one `name:value` line each
fn canonicalize_xiaomi_headers(headers: &HeaderMap) -> FdsResult<String> {
    let mut xiaomi: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, value) in headers {
        if name.as_str().starts_with(XIAOMI_HEADER_PREFIX) {
            let value = value
                .to_str()
                .map_err(|e| FdsError::Signing(format!("header {}: {}", name, e)))?;
            xiaomi.entry(name.as_str()).or_default().push(value.trim());
        }
    }

    let mut result = String::new();
    for (name, values) in &xiaomi {
        result.push_str(name);
        result.push(':');
        result.push_str(&values.join(","));
        result.push('\n');
    }
    Ok(result)
}

/// Decoded path plus sorted sub-resource parameters
fn canonicalize_resource(url: &Url) -> String {
    let path = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());

    let mut sub_resources: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| SUB_RESOURCES.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if sub_resources.is_empty() {
        return path;
    }

    sub_resources.sort_by(|a, b| a.0.cmp(&b.0));
    let params = sub_resources
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, params)
}

fn compute_signature(secret_access_key: &str, string_to_sign: &str) -> FdsResult<String> {
    let mut mac = HmacSha1::new_from_slice(secret_access_key.as_bytes())
        .map_err(|e| FdsError::Signing(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn header_value(headers: &HeaderMap, name: &str) -> FdsResult<String> {
    match headers.get(name) {
        Some(value) => value
            .to_str()
            .map(str::to_string)
            .map_err(|e| FdsError::Signing(format!("header {}: {}", name, e))),
        None => Ok(String::new()),
    }
}
