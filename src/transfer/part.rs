//! One part of a multipart upload and its retry loop

use bytes::Bytes;
use log::{debug, info};
use reqwest::{Method, StatusCode};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::context::ClientContext;
use crate::error::{FdsError, FdsResult};
use crate::model::UploadPartResult;

/// Byte range of one part, numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    pub part_number: u32,
    pub offset: u64,
    pub size: u64,
}

pub fn part_count(total_size: u64, part_size: u64) -> u64 {
    total_size.div_ceil(part_size)
}

/// Split `total_size` into `ceil(total_size / part_size)` parts. Every part
/// except the last is exactly `part_size` bytes.
///
/// Part numbers are `u32`, a split needing more parts is rejected.
pub fn split_parts(total_size: u64, part_size: u64) -> FdsResult<Vec<PartPlan>> {
    let count = part_count(total_size, part_size);
    let count = u32::try_from(count).map_err(|_| {
        FdsError::InvalidArgument(format!(
            "{} bytes in parts of {} bytes needs {} parts, more than {}",
            total_size,
            part_size,
            count,
            u32::MAX
        ))
    })?;
    Ok((1..=count)
        .map(|part_number| {
            let offset = u64::from(part_number - 1) * part_size;
            PartPlan {
                part_number,
                offset,
                size: part_size.min(total_size - offset),
            }
        })
        .collect())
}

/// Identity of an upload session as seen by a part task
#[derive(Debug, Clone)]
pub(crate) struct PartTarget {
    pub bucket: String,
    pub object_name: String,
    pub upload_id: String,
}

/// Upload one part, re-sending the whole payload on each attempt until it
/// succeeds or the retry budget runs out. Only the last failure surfaces.
pub(crate) async fn upload_part(
    ctx: &ClientContext,
    target: &PartTarget,
    part_number: u32,
    data: Bytes,
) -> FdsResult<UploadPartResult> {
    let uri = format!(
        "{}/{}/{}?uploadId={}&partNumber={}",
        ctx.config.upload_base_uri(),
        target.bucket,
        target.object_name,
        target.upload_id,
        part_number
    );
    let attempts = ctx.config.attempts();
    let started = Instant::now();

    let mut attempt = 0;
    loop {
        attempt += 1;
        match put_part(ctx, target, &uri, data.clone()).await {
            Ok(result) => {
                debug!(
                    "multipart_part_done: {}/{} part={} size={} attempts={} elapsed_ms={}",
                    target.bucket,
                    target.object_name,
                    part_number,
                    result.part_size,
                    attempt,
                    started.elapsed().as_millis()
                );
                return Ok(result);
            }
            Err(e) if !e.is_retryable() || attempt >= attempts => return Err(e),
            Err(e) => {
                info!(
                    "multipart_part_retry: {}/{} upload_id={} part={} attempt={} cause={}",
                    target.bucket, target.object_name, target.upload_id, part_number, attempt, e
                );
            }
        }
    }
}

async fn put_part(
    ctx: &ClientContext,
    target: &PartTarget,
    uri: &str,
    data: Bytes,
) -> FdsResult<UploadPartResult> {
    let request = ctx.request(Method::PUT, uri, &BTreeMap::new(), Some(data.into()))?;
    let response = ctx.send(request).await?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(FdsError::UnexpectedStatus {
            operation: "upload part",
            bucket: target.bucket.clone(),
            object: target.object_name.clone(),
            uri: uri.to_string(),
            status,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FdsError::transport(uri, e))?;
    let protocol_error = |reason: String| FdsError::Protocol {
        operation: "upload part",
        bucket: target.bucket.clone(),
        object: target.object_name.clone(),
        reason,
    };
    let result: UploadPartResult =
        serde_json::from_slice(&body).map_err(|e| protocol_error(e.to_string()))?;
    if !result.is_valid() {
        return Err(protocol_error(format!(
            "missing etag or part size, upload id {}",
            target.upload_id
        )));
    }
    Ok(result)
}
