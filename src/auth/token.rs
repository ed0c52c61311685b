//! Session token (SSO) credential

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Url;

use crate::error::{FdsError, FdsResult};

const SSO_SCHEME: &str = "SSO";
const SERVICE_TOKEN_PARAM: &str = "serviceToken";
const APP_ID_PARAM: &str = "appId";

#[derive(Clone)]
pub struct SessionTokenCredential {
    service_token: String,
    app_id: Option<String>,
}

impl SessionTokenCredential {
    pub fn new(service_token: impl Into<String>) -> FdsResult<Self> {
        let service_token = service_token.into();
        if service_token.is_empty() {
            return Err(FdsError::InvalidArgument(
                "service token may not be empty".to_string(),
            ));
        }
        Ok(Self {
            service_token,
            app_id: None,
        })
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub(crate) fn decorate_uri(&self, uri: &mut Url) {
        let mut query = uri.query_pairs_mut();
        query.append_pair(SERVICE_TOKEN_PARAM, &self.service_token);
        if let Some(app_id) = &self.app_id {
            query.append_pair(APP_ID_PARAM, app_id);
        }
    }

    pub(crate) fn decorate_request(&self, request: &mut reqwest::Request) {
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static(SSO_SCHEME));
    }
}

impl std::fmt::Debug for SessionTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenCredential")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}
