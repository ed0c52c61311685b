//! Client configuration and endpoint resolution

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FdsError, FdsResult};

const URI_HTTP_PREFIX: &str = "http://";
const URI_HTTPS_PREFIX: &str = "https://";
const URI_FILES: &str = "files";
const URI_CDN: &str = "cdn";
const URI_FDS_SUFFIX: &str = ".fds.api.xiaomi.com";
const URI_FDS_SSL_SUFFIX: &str = ".fds-ssl.api.xiaomi.com";

pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 50 * 1000;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 50 * 1000;
pub const DEFAULT_MAX_RETRY_TIMES: u32 = 3;
pub const DEFAULT_UPLOAD_PART_SIZE: usize = 4096;
/// Parts uploading at the same time
pub const DEFAULT_MAX_CONCURRENT_PARTS: usize = 4;
/// Parts buffered in memory waiting for a free upload slot
pub const DEFAULT_WORK_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FdsClientConfig {
    pub region_name: String,
    pub enable_https: bool,
    pub enable_cdn_for_upload: bool,
    pub enable_cdn_for_download: bool,
    /// When set, every endpoint resolves to this URI (mock servers in tests)
    pub base_uri_override: Option<String>,
    pub connection_timeout_ms: u64,
    pub socket_timeout_ms: u64,
    pub socket_send_buffer_size_hint: usize,
    pub socket_receive_buffer_size_hint: usize,
    pub max_retry_times: u32,
    pub upload_part_size: usize,
    pub max_concurrent_parts: usize,
    pub work_queue_capacity: usize,
}

impl Default for FdsClientConfig {
    fn default() -> Self {
        Self {
            region_name: String::new(),
            enable_https: true,
            enable_cdn_for_upload: false,
            enable_cdn_for_download: true,
            base_uri_override: None,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            socket_send_buffer_size_hint: 0,
            socket_receive_buffer_size_hint: 0,
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            upload_part_size: DEFAULT_UPLOAD_PART_SIZE,
            max_concurrent_parts: DEFAULT_MAX_CONCURRENT_PARTS,
            work_queue_capacity: DEFAULT_WORK_QUEUE_CAPACITY,
        }
    }
}

impl FdsClientConfig {
    pub fn with_region(mut self, region_name: impl Into<String>) -> Self {
        self.region_name = region_name.into();
        self
    }

    pub fn with_https(mut self, enable_https: bool) -> Self {
        self.enable_https = enable_https;
        self
    }

    pub fn with_cdn_for_upload(mut self, enable: bool) -> Self {
        self.enable_cdn_for_upload = enable;
        self
    }

    pub fn with_cdn_for_download(mut self, enable: bool) -> Self {
        self.enable_cdn_for_download = enable;
        self
    }

    pub fn with_base_uri_override(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri_override = Some(base_uri.into());
        self
    }

    pub fn with_connection_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connection_timeout_ms = timeout_ms;
        self
    }

    pub fn with_socket_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.socket_timeout_ms = timeout_ms;
        self
    }

    pub fn with_socket_buffer_size_hints(mut self, send: usize, receive: usize) -> Self {
        self.socket_send_buffer_size_hint = send;
        self.socket_receive_buffer_size_hint = receive;
        self
    }

    pub fn with_max_retry_times(mut self, max_retry_times: u32) -> Self {
        self.max_retry_times = max_retry_times;
        self
    }

    pub fn with_upload_part_size(mut self, upload_part_size: usize) -> Self {
        self.upload_part_size = upload_part_size;
        self
    }

    pub fn with_max_concurrent_parts(mut self, max_concurrent_parts: usize) -> Self {
        self.max_concurrent_parts = max_concurrent_parts;
        self
    }

    pub fn with_work_queue_capacity(mut self, work_queue_capacity: usize) -> Self {
        self.work_queue_capacity = work_queue_capacity;
        self
    }

    /// Reject settings the transfer engine cannot run with
    pub fn validate(&self) -> FdsResult<()> {
        if self.upload_part_size == 0 {
            return Err(FdsError::InvalidArgument(
                "upload part size may not be negative or zero".to_string(),
            ));
        }
        if self.max_concurrent_parts == 0 {
            return Err(FdsError::InvalidArgument(
                "max concurrent parts may not be zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Every call gets at least one attempt
    pub fn attempts(&self) -> u32 {
        self.max_retry_times.max(1)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn base_uri(&self) -> String {
        self.build_base_uri(false)
    }

    pub fn cdn_base_uri(&self) -> String {
        self.build_base_uri(true)
    }

    pub fn download_base_uri(&self) -> String {
        self.build_base_uri(self.enable_cdn_for_download)
    }

    pub fn upload_base_uri(&self) -> String {
        self.build_base_uri(self.enable_cdn_for_upload)
    }

    fn build_base_uri(&self, enable_cdn: bool) -> String {
        if let Some(base) = &self.base_uri_override {
            return base.trim_end_matches('/').to_string();
        }

        let scheme = if self.enable_https {
            URI_HTTPS_PREFIX
        } else {
            URI_HTTP_PREFIX
        };
        let host = if enable_cdn { URI_CDN } else { URI_FILES };
        let prefix = if self.region_name.is_empty() {
            host.to_string()
        } else {
            format!("{}-{}", self.region_name, host)
        };
        let suffix = if enable_cdn && self.enable_https {
            URI_FDS_SSL_SUFFIX
        } else {
            URI_FDS_SUFFIX
        };
        format!("{}{}{}", scheme, prefix, suffix)
    }
}
