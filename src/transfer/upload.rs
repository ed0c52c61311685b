//! Multipart upload orchestration: init, split, parallel parts, complete or abort

use bytes::Bytes;
use log::{info, warn};
use reqwest::{Method, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::part::{split_parts, upload_part, PartPlan, PartTarget};
use crate::context::ClientContext;
use crate::error::{FdsError, FdsResult};
use crate::model::{
    append_params, InitMultipartUploadResult, ObjectMetadata, PutObjectResult, UploadPartResult,
    UploadPartResultList, UserParam, APPLICATION_OCTET_STREAM, ESTIMATED_OBJECT_SIZE,
};
use crate::progress::{ProgressListener, ProgressReader};

/// One multipart upload, from a successful init to complete or abort
#[derive(Debug, Clone)]
pub struct TransferSession {
    pub bucket: String,
    pub object_name: String,
    pub upload_id: String,
    pub total_size: u64,
    pub part_size: u64,
}

impl TransferSession {
    fn target(&self) -> PartTarget {
        PartTarget {
            bucket: self.bucket.clone(),
            object_name: self.object_name.clone(),
            upload_id: self.upload_id.clone(),
        }
    }

    fn uri(&self, ctx: &ClientContext) -> String {
        format!(
            "{}/{}/{}?uploadId={}",
            ctx.config.upload_base_uri(),
            self.bucket,
            self.object_name,
            self.upload_id
        )
    }
}

/// Upload `source` as one object. `object_name == None` lets the store
/// assign the name. The source is read sequentially and dropped exactly
/// once when this returns.
pub(crate) async fn upload_object<R>(
    ctx: &Arc<ClientContext>,
    bucket: &str,
    object_name: Option<&str>,
    source: R,
    mut metadata: ObjectMetadata,
    params: &[UserParam],
    listener: Option<Arc<dyn ProgressListener>>,
) -> FdsResult<PutObjectResult>
where
    R: AsyncRead + Unpin + Send,
{
    if bucket.is_empty() {
        return Err(FdsError::InvalidArgument(
            "bucket name may not be empty".to_string(),
        ));
    }
    if object_name == Some("") {
        return Err(FdsError::InvalidArgument(
            "object name may not be empty".to_string(),
        ));
    }
    let total_size = metadata.content_length().ok_or_else(|| {
        FdsError::InvalidArgument("content length is required".to_string())
    })?;
    if metadata.content_type().is_none() {
        metadata.set_content_type(APPLICATION_OCTET_STREAM);
    }

    let plans = split_parts(total_size, ctx.config.upload_part_size as u64)?;

    let mut source = ProgressReader::new(source, listener, total_size);
    let session = init_multipart_upload(ctx, bucket, object_name, total_size).await?;
    info!(
        "multipart_start: {}/{} upload_id={} size={} part_size={}",
        session.bucket, session.object_name, session.upload_id, total_size, session.part_size
    );

    let outcome = match upload_parts(ctx, &session, &plans, &mut source).await {
        Ok(parts) => complete_multipart_upload(ctx, &session, &metadata, parts, params).await,
        Err(e) => Err(e),
    };
    drop(source);

    match outcome {
        Ok(result) => {
            info!(
                "multipart_complete: {}/{} upload_id={}",
                session.bucket, session.object_name, session.upload_id
            );
            Ok(result)
        }
        Err(e) => {
            if let Err(abort_err) = abort_multipart_upload(ctx, &session).await {
                warn!(
                    "multipart_abort_failed: {}/{} upload_id={} cause={}",
                    session.bucket, session.object_name, session.upload_id, abort_err
                );
            }
            Err(e)
        }
    }
}

/// Read and submit every part, then wait for all of them in part-number
/// order. Every submitted task resolves before this returns.
async fn upload_parts<R>(
    ctx: &Arc<ClientContext>,
    session: &TransferSession,
    plans: &[PartPlan],
    source: &mut R,
) -> FdsResult<Vec<UploadPartResult>>
where
    R: AsyncRead + Unpin,
{
    let mut handles = Vec::with_capacity(plans.len());
    let mut submit_error = None;

    for plan in plans {
        // Reserve before reading so buffered parts stay within the pool bounds
        let slot = match ctx.pool.reserve(plan.part_number).await {
            Ok(slot) => slot,
            Err(e) => {
                submit_error = Some(e);
                break;
            }
        };

        let mut buffer = vec![0u8; plan.size as usize];
        if let Err(e) = source.read_exact(&mut buffer).await {
            submit_error = Some(FdsError::io(
                format!(
                    "Fail to read data from input stream, part {} size {}",
                    plan.part_number, plan.size
                ),
                e,
            ));
            break;
        }

        let data = Bytes::from(buffer);
        let task_ctx = Arc::clone(ctx);
        let target = session.target();
        let part_number = plan.part_number;
        let handle = slot.spawn(async move {
            upload_part(&task_ctx, &target, part_number, data).await
        });
        handles.push((part_number, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut first_error = None;
    for (part_number, handle) in handles {
        match handle.await {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(FdsError::TaskFailed {
                    part_number,
                    reason: e.to_string(),
                });
            }
        }
    }

    if let Some(e) = first_error.or(submit_error) {
        return Err(e);
    }
    if results.len() != plans.len() {
        return Err(FdsError::Protocol {
            operation: "upload part",
            bucket: session.bucket.clone(),
            object: session.object_name.clone(),
            reason: format!("{} of {} parts uploaded", results.len(), plans.len()),
        });
    }
    Ok(results)
}

async fn init_multipart_upload(
    ctx: &ClientContext,
    bucket: &str,
    object_name: Option<&str>,
    estimated_size: u64,
) -> FdsResult<TransferSession> {
    let uri = format!(
        "{}/{}/{}?uploads",
        ctx.config.upload_base_uri(),
        bucket,
        object_name.unwrap_or("")
    );
    let method = if object_name.is_some() {
        Method::PUT
    } else {
        Method::POST
    };
    let mut headers = BTreeMap::new();
    headers.insert(
        ESTIMATED_OBJECT_SIZE.to_string(),
        estimated_size.to_string(),
    );

    let request = ctx.request(method, &uri, &headers, None)?;
    let response = ctx.send(request).await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(FdsError::UnexpectedStatus {
            operation: "initiate multipart upload",
            bucket: bucket.to_string(),
            object: object_name.unwrap_or_default().to_string(),
            uri,
            status,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FdsError::transport(uri.as_str(), e))?;
    let protocol_error = |reason: String| FdsError::Protocol {
        operation: "initiate multipart upload",
        bucket: bucket.to_string(),
        object: object_name.unwrap_or_default().to_string(),
        reason,
    };
    let result: InitMultipartUploadResult =
        serde_json::from_slice(&body).map_err(|e| protocol_error(e.to_string()))?;
    match (result.bucket_name, result.object_name, result.upload_id) {
        (Some(bucket), Some(object_name), Some(upload_id)) => Ok(TransferSession {
            bucket,
            object_name,
            upload_id,
            total_size: estimated_size,
            part_size: ctx.config.upload_part_size as u64,
        }),
        _ => Err(protocol_error(
            "missing upload id, bucket name or object name".to_string(),
        )),
    }
}

async fn complete_multipart_upload(
    ctx: &ClientContext,
    session: &TransferSession,
    metadata: &ObjectMetadata,
    parts: Vec<UploadPartResult>,
    params: &[UserParam],
) -> FdsResult<PutObjectResult> {
    // Every param is appended with '&', the URI already has a query
    let uri = append_params(&session.uri(ctx), params);
    let list = UploadPartResultList {
        upload_part_result_list: parts,
    };
    let body = serde_json::to_vec(&list).map_err(|source| FdsError::Encode {
        what: "upload part result list",
        source,
    })?;

    let request = ctx.request(Method::PUT, &uri, &metadata.all_metadata(), Some(body.into()))?;
    let response = ctx.send(request).await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(FdsError::UnexpectedStatus {
            operation: "complete multipart upload",
            bucket: session.bucket.clone(),
            object: session.object_name.clone(),
            uri,
            status,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FdsError::transport(uri.as_str(), e))?;
    let mut result: PutObjectResult =
        serde_json::from_slice(&body).map_err(|e| FdsError::Protocol {
            operation: "complete multipart upload",
            bucket: session.bucket.clone(),
            object: session.object_name.clone(),
            reason: e.to_string(),
        })?;
    result = result.validate(&session.bucket, &session.object_name)?;
    result.fds_service_base_uri = ctx.config.base_uri();
    result.cdn_service_base_uri = ctx.config.cdn_base_uri();
    Ok(result)
}

async fn abort_multipart_upload(ctx: &ClientContext, session: &TransferSession) -> FdsResult<()> {
    let uri = session.uri(ctx);
    let request = ctx.request(Method::DELETE, &uri, &BTreeMap::new(), None)?;
    let response = ctx.send(request).await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(FdsError::UnexpectedStatus {
            operation: "abort multipart upload",
            bucket: session.bucket.clone(),
            object: session.object_name.clone(),
            uri,
            status,
        });
    }
    info!(
        "multipart_abort: {}/{} upload_id={}",
        session.bucket, session.object_name, session.upload_id
    );
    Ok(())
}
