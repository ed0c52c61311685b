//! OAuth credential exchanged for a storage access token

use log::{debug, info};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};

use crate::error::{FdsError, FdsResult};
use crate::model::StorageAccessToken;

const OAUTH_SCHEME: &str = "OAuth";
const STORAGE_ACCESS_TOKEN: &str = "storageAccessToken";
const APP_ID: &str = "appId";
const OAUTH_APP_ID: &str = "oauthAppId";
const OAUTH_ACCESS_TOKEN: &str = "oauthAccessToken";
const OAUTH_PROVIDER: &str = "oauthProvider";
const OAUTH_MAC_KEY: &str = "oauthMacKey";
const OAUTH_MAC_ALGORITHM: &str = "oauthMacAlgorithm";

/// Provider side credentials handed to the exchange call
#[derive(Debug, Clone)]
pub struct OAuthParams {
    pub app_id: String,
    pub oauth_app_id: String,
    pub oauth_access_token: String,
    pub oauth_provider: String,
    pub mac_key: String,
    pub mac_algorithm: String,
}

#[derive(Clone)]
pub struct OAuthCredential {
    app_id: String,
    storage_access_token: StorageAccessToken,
}

impl OAuthCredential {
    /// One GET against the service base URI. Any failure is a
    /// [`FdsError::CredentialExchange`].
    pub async fn exchange(
        http: &reqwest::Client,
        service_base_uri: &str,
        params: &OAuthParams,
    ) -> FdsResult<Self> {
        let uri = exchange_uri(service_base_uri, params);
        let exchange_error = |reason: String| FdsError::CredentialExchange {
            uri: uri.clone(),
            reason,
        };

        debug!("oauth_exchange_start: app_id={}", params.app_id);
        let response = http
            .get(&uri)
            .header(AUTHORIZATION, OAUTH_SCHEME)
            .send()
            .await
            .map_err(|e| exchange_error(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(exchange_error(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| exchange_error(e.to_string()))?;
        let token: StorageAccessToken =
            serde_json::from_slice(&body).map_err(|e| exchange_error(e.to_string()))?;
        if token.token.is_empty() {
            return Err(exchange_error("empty storage access token".to_string()));
        }

        info!(
            "oauth_exchange_done: app_id={} expire_time={}",
            params.app_id, token.expire_time
        );
        Ok(Self::from_token(params.app_id.clone(), token))
    }

    /// Wrap a token obtained earlier
    pub fn from_token(
        app_id: impl Into<String>,
        storage_access_token: StorageAccessToken,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            storage_access_token,
        }
    }

    pub fn storage_access_token(&self) -> &StorageAccessToken {
        &self.storage_access_token
    }

    pub(crate) fn decorate_uri(&self, uri: &mut Url) {
        uri.query_pairs_mut()
            .append_pair(APP_ID, &self.app_id)
            .append_pair(STORAGE_ACCESS_TOKEN, &self.storage_access_token.token);
    }

    pub(crate) fn decorate_request(&self, request: &mut reqwest::Request) {
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static(OAUTH_SCHEME));
    }
}

impl std::fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("app_id", &self.app_id)
            .field("expire_time", &self.storage_access_token.expire_time)
            .finish_non_exhaustive()
    }
}

fn exchange_uri(service_base_uri: &str, params: &OAuthParams) -> String {
    let query = [
        (APP_ID, &params.app_id),
        (OAUTH_APP_ID, &params.oauth_app_id),
        (OAUTH_ACCESS_TOKEN, &params.oauth_access_token),
        (OAUTH_PROVIDER, &params.oauth_provider),
        (OAUTH_MAC_ALGORITHM, &params.mac_algorithm),
        (OAUTH_MAC_KEY, &params.mac_key),
    ]
    .iter()
    .map(|(key, value)| format!("&{}={}", key, urlencoding::encode(value)))
    .collect::<String>();

    format!(
        "{}/?{}{}",
        service_base_uri.trim_end_matches('/'),
        STORAGE_ACCESS_TOKEN,
        query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> OAuthParams {
        OAuthParams {
            app_id: "app1".to_string(),
            oauth_app_id: "oa".to_string(),
            oauth_access_token: "t/k".to_string(),
            oauth_provider: "XiaoMi".to_string(),
            mac_key: "mk".to_string(),
            mac_algorithm: "HmacSha1".to_string(),
        }
    }

    #[test]
    fn exchange_uri_lists_every_parameter() {
        assert_eq!(
            exchange_uri("http://localhost:9000/", &params()),
            "http://localhost:9000/?storageAccessToken&appId=app1&oauthAppId=oa\
             &oauthAccessToken=t%2Fk&oauthProvider=XiaoMi&oauthMacAlgorithm=HmacSha1\
             &oauthMacKey=mk"
        );
    }

    #[test]
    fn requests_carry_app_id_and_token() {
        let credential = OAuthCredential::from_token(
            "app1",
            StorageAccessToken {
                token: "sat".to_string(),
                expire_time: 1,
            },
        );
        let mut uri = Url::parse("http://localhost/b/o").unwrap();
        credential.decorate_uri(&mut uri);
        assert_eq!(uri.query(), Some("appId=app1&storageAccessToken=sat"));
    }
}
