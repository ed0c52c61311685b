//! Downloaded object handle

use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use super::ObjectMetadata;
use crate::error::{FdsError, FdsResult};
use crate::progress::{ProgressListener, ProgressStream};

/// A fetched object. Its content can be consumed once.
#[derive(Debug)]
pub struct FdsObject {
    bucket_name: String,
    object_name: String,
    metadata: ObjectMetadata,
    content: ObjectContent,
}

impl FdsObject {
    pub(crate) fn new(
        bucket_name: String,
        object_name: String,
        metadata: ObjectMetadata,
        content: ObjectContent,
    ) -> Self {
        Self {
            bucket_name,
            object_name,
            metadata,
            content,
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn metadata(&self) -> &ObjectMetadata {
        &self.metadata
    }

    pub fn content_mut(&mut self) -> &mut ObjectContent {
        &mut self.content
    }

    pub fn into_content(self) -> ObjectContent {
        self.content
    }

    pub fn into_parts(self) -> (ObjectMetadata, ObjectContent) {
        (self.metadata, self.content)
    }
}

/// Live response body of a GET, counted against the progress listener
pub struct ObjectContent {
    inner: ProgressStream<BoxStream<'static, FdsResult<Bytes>>>,
}

impl ObjectContent {
    /// `start` is the offset the body begins at, `total` the full length
    pub(crate) fn from_response(
        response: reqwest::Response,
        uri: String,
        listener: Option<Arc<dyn ProgressListener>>,
        start: u64,
        total: u64,
    ) -> Self {
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| FdsError::transport(uri.clone(), e)))
            .boxed();
        Self {
            inner: ProgressStream::new(body, listener, start, total),
        }
    }

    /// Buffer the remaining content in memory
    pub async fn bytes(mut self) -> FdsResult<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(self.map(|chunk| chunk.map_err(std::io::Error::other)))
    }
}

impl Stream for ObjectContent {
    type Item = FdsResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl fmt::Debug for ObjectContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectContent").finish_non_exhaustive()
    }
}
