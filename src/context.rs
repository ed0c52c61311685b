//! Shared client state and request construction

use chrono::Utc;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH, DATE};
use reqwest::{Body, Method, Url};
use std::collections::BTreeMap;

use crate::auth::Credential;
use crate::config::FdsClientConfig;
use crate::error::{FdsError, FdsResult};
use crate::model::format_http_date;
use crate::transfer::PartPool;

/// Everything a transfer needs, owned by one client and shared by its tasks
pub(crate) struct ClientContext {
    pub config: FdsClientConfig,
    pub http: reqwest::Client,
    pub credential: Credential,
    pub pool: PartPool,
}

impl ClientContext {
    pub fn new(config: FdsClientConfig, credential: Credential) -> FdsResult<Self> {
        config.validate()?;
        let http = build_http_client(&config)?;
        let pool = PartPool::new(config.max_concurrent_parts, config.work_queue_capacity);
        Ok(Self {
            config,
            http,
            credential,
            pool,
        })
    }

    /// Build an authenticated request. `Content-Length` entries in
    /// `headers` are dropped, the transport computes it from the body.
    pub fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &BTreeMap<String, String>,
        body: Option<Body>,
    ) -> FdsResult<reqwest::Request> {
        let mut url = Url::parse(uri).map_err(|_| FdsError::InvalidUri {
            uri: uri.to_string(),
        })?;
        self.credential.decorate_uri(&mut url);

        let mut request = reqwest::Request::new(method, url);
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| FdsError::InvalidMetadata { key: key.clone() })?;
            if name == CONTENT_LENGTH {
                continue;
            }
            let value = HeaderValue::from_str(value)
                .map_err(|_| FdsError::InvalidMetadata { key: key.clone() })?;
            request.headers_mut().insert(name, value);
        }

        let date = HeaderValue::from_str(&format_http_date(Utc::now()))
            .map_err(|e| FdsError::Signing(e.to_string()))?;
        request.headers_mut().insert(DATE, date);
        *request.body_mut() = body;

        self.credential.decorate_request(&mut request)?;
        Ok(request)
    }

    pub async fn send(&self, request: reqwest::Request) -> FdsResult<reqwest::Response> {
        let uri = request.url().to_string();
        self.http
            .execute(request)
            .await
            .map_err(|e| FdsError::transport(uri, e))
    }
}

pub(crate) fn build_http_client(config: &FdsClientConfig) -> FdsResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connection_timeout())
        .read_timeout(config.socket_timeout())
        .tcp_nodelay(true)
        .build()
        .map_err(FdsError::HttpClient)
}
