//! Public client facade

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Method, StatusCode};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};

use crate::auth::{Credential, OAuthParams};
use crate::config::FdsClientConfig;
use crate::context::{build_http_client, ClientContext};
use crate::error::{FdsError, FdsResult};
use crate::model::{
    FdsObject, ObjectMetadata, PutObjectResult, UserParam, APPLICATION_OCTET_STREAM,
};
use crate::progress::ProgressListener;
use crate::transfer::{download, upload};

/// Client for one FDS endpoint and credential. Cloning is cheap and clones
/// share the HTTP connection pool and the part upload pool.
#[derive(Clone)]
pub struct FdsClient {
    ctx: Arc<ClientContext>,
}

impl FdsClient {
    pub fn new(credential: Credential, config: FdsClientConfig) -> FdsResult<Self> {
        Ok(Self {
            ctx: Arc::new(ClientContext::new(config, credential)?),
        })
    }

    /// Exchange OAuth tokens against the configured endpoint, then build
    /// the client with the resulting credential
    pub async fn with_oauth(
        params: &OAuthParams,
        config: FdsClientConfig,
    ) -> FdsResult<Self> {
        let http = build_http_client(&config)?;
        let credential = Credential::oauth(&http, &config.base_uri(), params).await?;
        Self::new(credential, config)
    }

    pub fn config(&self) -> &FdsClientConfig {
        &self.ctx.config
    }

    pub fn credential(&self) -> &Credential {
        &self.ctx.credential
    }

    /// Upload `source` under `object_name`. `metadata` must carry the
    /// content length.
    pub async fn put_object<R>(
        &self,
        bucket: &str,
        object_name: &str,
        source: R,
        metadata: ObjectMetadata,
        params: &[UserParam],
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> FdsResult<PutObjectResult>
    where
        R: AsyncRead + Unpin + Send,
    {
        upload::upload_object(
            &self.ctx,
            bucket,
            Some(object_name),
            source,
            metadata,
            params,
            listener,
        )
        .await
    }

    /// Upload with a store assigned object name
    pub async fn post_object<R>(
        &self,
        bucket: &str,
        source: R,
        metadata: ObjectMetadata,
        params: &[UserParam],
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> FdsResult<PutObjectResult>
    where
        R: AsyncRead + Unpin + Send,
    {
        upload::upload_object(&self.ctx, bucket, None, source, metadata, params, listener).await
    }

    /// Upload a local file. Length, content type and last modified time
    /// come from the file.
    pub async fn put_object_file(
        &self,
        bucket: &str,
        object_name: Option<&str>,
        path: &Path,
        params: &[UserParam],
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> FdsResult<PutObjectResult> {
        let not_found = |e: std::io::Error| {
            FdsError::io(
                format!("Unable to find the file to be uploaded: {}", path.display()),
                e,
            )
        };
        let file = File::open(path).await.map_err(not_found)?;
        let file_metadata = file.metadata().await.map_err(not_found)?;

        let mut metadata = ObjectMetadata::new();
        metadata.set_content_length(file_metadata.len());
        metadata.set_content_type(mime_type(path));
        if let Ok(modified) = file_metadata.modified() {
            metadata.set_last_modified(DateTime::<Utc>::from(modified));
        }
        debug!(
            "put_object_file: {} size={} content_type={}",
            path.display(),
            file_metadata.len(),
            metadata.content_type().unwrap_or_default()
        );

        upload::upload_object(
            &self.ctx,
            bucket,
            object_name,
            BufReader::new(file),
            metadata,
            params,
            listener,
        )
        .await
    }

    /// Open a live content stream for `bucket/object_name` on the download endpoint
    pub async fn get_object(
        &self,
        bucket: &str,
        object_name: &str,
        offset: u64,
        params: &[UserParam],
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> FdsResult<FdsObject> {
        let uri = self.object_uri(bucket, object_name)?;
        download::get_object(&self.ctx, &uri, offset, params, listener).await
    }

    /// Same as [`FdsClient::get_object`] for a complete, possibly presigned, URI
    pub async fn get_object_from_uri(
        &self,
        uri: &str,
        offset: u64,
        params: &[UserParam],
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> FdsResult<FdsObject> {
        download::get_object(&self.ctx, uri, offset, params, listener).await
    }

    pub async fn get_object_to_file(
        &self,
        bucket: &str,
        object_name: &str,
        destination: &Path,
        params: &[UserParam],
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> FdsResult<ObjectMetadata> {
        let uri = self.object_uri(bucket, object_name)?;
        download::get_object_to_file(&self.ctx, &uri, destination, params, listener).await
    }

    pub async fn get_object_from_uri_to_file(
        &self,
        uri: &str,
        destination: &Path,
        params: &[UserParam],
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> FdsResult<ObjectMetadata> {
        download::get_object_to_file(&self.ctx, uri, destination, params, listener).await
    }

    /// HEAD the object: 200 is true, 404 is false, anything else an error
    pub async fn does_object_exist(&self, bucket: &str, object_name: &str) -> FdsResult<bool> {
        check_names(bucket, object_name)?;
        let uri = format!("{}/{}/{}", self.ctx.config.base_uri(), bucket, object_name);
        let request = self
            .ctx
            .request(Method::HEAD, &uri, &BTreeMap::new(), None)?;
        let response = self.ctx.send(request).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(FdsError::UnexpectedStatus {
                operation: "head object",
                bucket: bucket.to_string(),
                object: object_name.to_string(),
                uri,
                status,
            }),
        }
    }

    fn object_uri(&self, bucket: &str, object_name: &str) -> FdsResult<String> {
        check_names(bucket, object_name)?;
        Ok(format!(
            "{}/{}/{}",
            self.ctx.config.download_base_uri(),
            bucket,
            object_name
        ))
    }
}

impl std::fmt::Debug for FdsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FdsClient")
            .field("config", &self.ctx.config)
            .field("credential", &self.ctx.credential)
            .finish()
    }
}

fn check_names(bucket: &str, object_name: &str) -> FdsResult<()> {
    if bucket.is_empty() {
        return Err(FdsError::InvalidArgument(
            "bucket name may not be empty".to_string(),
        ));
    }
    if object_name.is_empty() {
        return Err(FdsError::InvalidArgument(
            "object name may not be empty".to_string(),
        ));
    }
    Ok(())
}

fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(APPLICATION_OCTET_STREAM)
        .to_string()
}
