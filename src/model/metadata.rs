//! Object metadata carried as HTTP headers

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

use crate::error::{FdsError, FdsResult};

pub const XIAOMI_HEADER_PREFIX: &str = "x-xiaomi-";
pub const XIAOMI_META_HEADER_PREFIX: &str = "x-xiaomi-meta-";
pub const ESTIMATED_OBJECT_SIZE: &str = "x-xiaomi-estimated-object-size";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

pub const LAST_MODIFIED: &str = "Last-Modified";
pub const CONTENT_MD5: &str = "Content-MD5";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CACHE_CONTROL: &str = "Cache-Control";

const PREDEFINED_HEADERS: [&str; 6] = [
    LAST_MODIFIED,
    CONTENT_MD5,
    CONTENT_TYPE,
    CONTENT_LENGTH,
    CONTENT_ENCODING,
    CACHE_CONTROL,
];

/// RFC 1123 date in GMT, as used by the `Date` and `Last-Modified` headers
pub(crate) const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub(crate) fn format_http_date(date: DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Predefined headers plus user entries under the `x-xiaomi-meta-` prefix.
///
/// User keys must carry the prefix and are stored lowercase, matching how
/// the store echoes them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    user_metadata: BTreeMap<String, String>,
    predefined_metadata: BTreeMap<String, String>,
}

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep user metadata and predefined headers, ignore the rest
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut metadata = Self::default();
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let key = name.as_str();
            if key.starts_with(XIAOMI_META_HEADER_PREFIX) {
                metadata
                    .user_metadata
                    .insert(key.to_string(), value.to_string());
            } else if let Some(canonical) = predefined_header(key) {
                metadata
                    .predefined_metadata
                    .insert(canonical.to_string(), value.to_string());
            }
        }
        metadata
    }

    pub fn user_metadata(&self) -> &BTreeMap<String, String> {
        &self.user_metadata
    }

    pub fn add_user_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> FdsResult<()> {
        let key = key.into().to_ascii_lowercase();
        if !key.starts_with(XIAOMI_META_HEADER_PREFIX) {
            return Err(FdsError::InvalidMetadata { key });
        }
        self.user_metadata.insert(key, value.into());
        Ok(())
    }

    pub fn add_predefined_metadata(
        &mut self,
        key: &str,
        value: impl Into<String>,
    ) -> FdsResult<()> {
        let canonical = predefined_header(key).ok_or_else(|| FdsError::InvalidMetadata {
            key: key.to_string(),
        })?;
        self.predefined_metadata
            .insert(canonical.to_string(), value.into());
        Ok(())
    }

    /// `None` when unset or unparsable
    pub fn content_length(&self) -> Option<u64> {
        self.predefined_metadata
            .get(CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn set_content_length(&mut self, content_length: u64) {
        self.predefined_metadata
            .insert(CONTENT_LENGTH.to_string(), content_length.to_string());
    }

    pub fn content_type(&self) -> Option<&str> {
        self.predefined(CONTENT_TYPE)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.predefined_metadata
            .insert(CONTENT_TYPE.to_string(), content_type.into());
    }

    pub fn content_md5(&self) -> Option<&str> {
        self.predefined(CONTENT_MD5)
    }

    pub fn set_content_md5(&mut self, content_md5: impl Into<String>) {
        self.predefined_metadata
            .insert(CONTENT_MD5.to_string(), content_md5.into());
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.predefined(CONTENT_ENCODING)
    }

    pub fn set_content_encoding(&mut self, content_encoding: impl Into<String>) {
        self.predefined_metadata
            .insert(CONTENT_ENCODING.to_string(), content_encoding.into());
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.predefined(CACHE_CONTROL)
    }

    pub fn set_cache_control(&mut self, cache_control: impl Into<String>) {
        self.predefined_metadata
            .insert(CACHE_CONTROL.to_string(), cache_control.into());
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.predefined(LAST_MODIFIED).and_then(parse_http_date)
    }

    pub fn set_last_modified(&mut self, last_modified: DateTime<Utc>) {
        self.predefined_metadata
            .insert(LAST_MODIFIED.to_string(), format_http_date(last_modified));
    }

    /// Predefined and user entries merged, user entries last
    pub fn all_metadata(&self) -> BTreeMap<String, String> {
        let mut all = self.predefined_metadata.clone();
        all.extend(
            self.user_metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        all
    }

    fn predefined(&self, key: &str) -> Option<&str> {
        self.predefined_metadata.get(key).map(String::as_str)
    }
}

fn predefined_header(key: &str) -> Option<&'static str> {
    PREDEFINED_HEADERS
        .iter()
        .copied()
        .find(|h| h.eq_ignore_ascii_case(key))
}
