//! Request authentication
//!
//! Every outgoing request goes through exactly one [`Credential`]. The URI is
//! decorated before the request is built, the request itself once headers
//! are final so a signature covers them.

mod oauth;
mod signature;
mod token;

pub use oauth::{OAuthCredential, OAuthParams};
pub use signature::SignatureCredential;
pub use token::SessionTokenCredential;

use reqwest::Url;

use crate::error::FdsResult;

#[derive(Debug, Clone)]
pub enum Credential {
    Signature(SignatureCredential),
    SessionToken(SessionTokenCredential),
    OAuth(OAuthCredential),
}

impl Credential {
    pub fn signature(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Credential::Signature(SignatureCredential::new(access_key_id, secret_access_key))
    }

    pub fn session_token(service_token: impl Into<String>) -> FdsResult<Self> {
        Ok(Credential::SessionToken(SessionTokenCredential::new(
            service_token,
        )?))
    }

    /// Exchange provider tokens for a storage access token
    pub async fn oauth(
        http: &reqwest::Client,
        service_base_uri: &str,
        params: &OAuthParams,
    ) -> FdsResult<Self> {
        Ok(Credential::OAuth(
            OAuthCredential::exchange(http, service_base_uri, params).await?,
        ))
    }

    pub fn decorate_uri(&self, uri: &mut Url) {
        match self {
            Credential::Signature(_) => {}
            Credential::SessionToken(credential) => credential.decorate_uri(uri),
            Credential::OAuth(credential) => credential.decorate_uri(uri),
        }
    }

    pub fn decorate_request(&self, request: &mut reqwest::Request) -> FdsResult<()> {
        match self {
            Credential::Signature(credential) => credential.sign(request)?,
            Credential::SessionToken(credential) => credential.decorate_request(request),
            Credential::OAuth(credential) => credential.decorate_request(request),
        }
        Ok(())
    }
}

impl From<SignatureCredential> for Credential {
    fn from(credential: SignatureCredential) -> Self {
        Credential::Signature(credential)
    }
}

impl From<SessionTokenCredential> for Credential {
    fn from(credential: SessionTokenCredential) -> Self {
        Credential::SessionToken(credential)
    }
}

impl From<OAuthCredential> for Credential {
    fn from(credential: OAuthCredential) -> Self {
        Credential::OAuth(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use reqwest::Method;

    fn decorate(credential: &Credential) -> reqwest::Request {
        let mut uri = Url::parse("http://localhost/b/o?uploadId=1").unwrap();
        credential.decorate_uri(&mut uri);
        let mut request = reqwest::Request::new(Method::PUT, uri);
        credential.decorate_request(&mut request).unwrap();
        request
    }

    #[test]
    fn every_variant_sets_an_authorization_scheme() {
        let signature = decorate(&Credential::signature("AK", "SK"));
        assert!(signature.headers()[AUTHORIZATION]
            .to_str()
            .unwrap()
            .starts_with("Galaxy-V2 AK:"));
        assert_eq!(signature.url().query(), Some("uploadId=1"));

        let sso = decorate(&Credential::session_token("tok").unwrap());
        assert_eq!(sso.headers()[AUTHORIZATION], "SSO");
        assert_eq!(sso.url().query(), Some("uploadId=1&serviceToken=tok"));
    }
}
