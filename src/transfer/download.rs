//! Object download, streaming or into a file with range resume

use futures_util::StreamExt;
use log::info;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Method, StatusCode, Url};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::context::ClientContext;
use crate::error::{FdsError, FdsResult};
use crate::model::{
    append_params, is_derived_rendition, FdsObject, ObjectContent, ObjectMetadata, UserParam,
};
use crate::progress::ProgressListener;

/// Write buffer size for downloads (2 MB) - reduces I/O operations
const WRITE_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Bucket and object name from the first two path segments of `uri`
pub(crate) fn parse_object_uri(uri: &str) -> FdsResult<(String, String)> {
    let invalid = || FdsError::InvalidUri {
        uri: uri.to_string(),
    };
    let url = Url::parse(uri).map_err(|_| invalid())?;
    let path = url.path().strip_prefix('/').unwrap_or(url.path());
    let (bucket, object) = path.split_once('/').ok_or_else(invalid)?;
    if bucket.is_empty() {
        return Err(invalid());
    }
    let decode = |s: &str| {
        urlencoding::decode(s)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| s.to_string())
    };
    Ok((decode(bucket), decode(object)))
}

/// GET `uri` and hand back the live body. A positive `offset` asks for a
/// range continuation unless a derived rendition is requested.
pub(crate) async fn get_object(
    ctx: &ClientContext,
    uri: &str,
    offset: u64,
    params: &[UserParam],
    listener: Option<Arc<dyn ProgressListener>>,
) -> FdsResult<FdsObject> {
    open_object(ctx, uri, offset, params, listener)
        .await
        .map(|opened| opened.object)
}

/// A fetched object and whether its body continues at the requested offset
struct OpenedObject {
    object: FdsObject,
    resumed: bool,
}

async fn open_object(
    ctx: &ClientContext,
    uri: &str,
    offset: u64,
    params: &[UserParam],
    listener: Option<Arc<dyn ProgressListener>>,
) -> FdsResult<OpenedObject> {
    let uri = append_params(uri, params);
    let (bucket, object_name) = parse_object_uri(&uri)?;

    let ranged = offset > 0 && !is_derived_rendition(params);
    let mut headers = BTreeMap::new();
    if ranged {
        headers.insert(RANGE.to_string(), format!("bytes={}-", offset));
    }

    let request = ctx.request(Method::GET, &uri, &headers, None)?;
    let response = ctx.send(request).await?;
    let status = response.status();
    if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
        return Err(FdsError::UnexpectedStatus {
            operation: "get object",
            bucket,
            object: object_name,
            uri,
            status,
        });
    }

    // A plain 200 is the whole object even when a range was asked for
    let resumed = ranged && status == StatusCode::PARTIAL_CONTENT;
    if resumed {
        if let Some(start) = content_range_start(response.headers()) {
            if start != offset {
                return Err(FdsError::Protocol {
                    operation: "get object",
                    bucket,
                    object: object_name,
                    reason: format!("asked for offset {} but got range from {}", offset, start),
                });
            }
        }
    }

    let metadata = ObjectMetadata::from_headers(response.headers());
    let length = metadata
        .content_length()
        .or_else(|| response.content_length())
        .unwrap_or(0);
    let start = if resumed { offset } else { 0 };
    let content = ObjectContent::from_response(response, uri, listener, start, start + length);
    Ok(OpenedObject {
        object: FdsObject::new(bucket, object_name, metadata, content),
        resumed,
    })
}

/// First byte position of a `Content-Range: bytes <first>-<last>/<len>` header
fn content_range_start(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (first, _) = range.split_once('-')?;
    first.trim().parse().ok()
}

/// Download into `destination`, retrying up to the configured budget.
///
/// After a failed attempt that had started writing, the next request
/// continues from the current file length and appends. If the store answers
/// that request with the whole object the file is rewritten from zero.
/// Derived renditions always restart from zero and overwrite.
pub(crate) async fn get_object_to_file(
    ctx: &ClientContext,
    uri: &str,
    destination: &Path,
    params: &[UserParam],
    listener: Option<Arc<dyn ProgressListener>>,
) -> FdsResult<ObjectMetadata> {
    let derived = is_derived_rendition(params);
    let attempts = ctx.config.attempts();
    let mut attempt = 0;
    let mut file_started = false;

    loop {
        attempt += 1;
        let offset = if file_started && !derived {
            tokio::fs::metadata(destination)
                .await
                .map(|m| m.len())
                .unwrap_or(0)
        } else {
            0
        };

        let outcome = match open_object(ctx, uri, offset, params, listener.clone()).await {
            Ok(opened) => {
                file_started = true;
                if offset > 0 && !opened.resumed {
                    info!(
                        "download_range_ignored: uri={} file={} offset={}",
                        uri,
                        destination.display(),
                        offset
                    );
                }
                store_object(ctx, opened.object, destination, opened.resumed).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(metadata) => return Ok(metadata),
            Err(e) if !e.is_retryable() || attempt >= attempts => return Err(e),
            Err(e) => {
                info!(
                    "download_retry: uri={} file={} attempt={} offset={} cause={}",
                    uri,
                    destination.display(),
                    attempt,
                    offset,
                    e
                );
            }
        }
    }
}

/// Stream the object body into the file. Bytes received before a body
/// error are flushed so the file length is the resume offset.
async fn store_object(
    ctx: &ClientContext,
    object: FdsObject,
    destination: &Path,
    append: bool,
) -> FdsResult<ObjectMetadata> {
    let store_error = |e: std::io::Error, bucket: &str, object: &str| {
        FdsError::io(
            format!(
                "Unable to store object[{}/{}] content to disk {}",
                bucket,
                object,
                destination.display()
            ),
            e,
        )
    };
    let bucket = object.bucket_name().to_string();
    let object_name = object.object_name().to_string();

    // Create parent directories if needed
    if !append {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| store_error(e, &bucket, &object_name))?;
            }
        }
    }

    let mut file = if append {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(destination)
            .await
    } else {
        File::create(destination).await
    }
    .map_err(|e| store_error(e, &bucket, &object_name))?;

    let (metadata, mut content) = object.into_parts();
    let capacity = match ctx.config.socket_receive_buffer_size_hint {
        0 => WRITE_BUFFER_SIZE,
        hint => hint,
    };
    let mut write_buffer = Vec::with_capacity(capacity);

    let mut body_error = None;
    while let Some(chunk) = content.next().await {
        match chunk {
            Ok(chunk) => {
                write_buffer.extend_from_slice(&chunk);
                if write_buffer.len() >= capacity {
                    file.write_all(&write_buffer)
                        .await
                        .map_err(|e| store_error(e, &bucket, &object_name))?;
                    write_buffer.clear();
                }
            }
            Err(e) => {
                body_error = Some(e);
                break;
            }
        }
    }
    drop(content);

    if !write_buffer.is_empty() {
        file.write_all(&write_buffer)
            .await
            .map_err(|e| store_error(e, &bucket, &object_name))?;
    }
    file.flush()
        .await
        .map_err(|e| store_error(e, &bucket, &object_name))?;

    match body_error {
        Some(e) => Err(e),
        None => Ok(metadata),
    }
}
