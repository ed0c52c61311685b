#![allow(dead_code)]

use fds_client::{Credential, FdsClient, FdsClientConfig, ObjectMetadata};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PART_SIZE: usize = 4096;
pub const BUCKET: &str = "bucket";
pub const UPLOAD_ID: &str = "upload-1";

pub fn config(base_uri: &str) -> FdsClientConfig {
    FdsClientConfig::default()
        .with_base_uri_override(base_uri)
        .with_upload_part_size(PART_SIZE)
        .with_max_retry_times(3)
        .with_max_concurrent_parts(2)
        .with_work_queue_capacity(2)
}

pub fn client(base_uri: &str) -> FdsClient {
    FdsClient::new(Credential::signature("AKID", "secret"), config(base_uri)).unwrap()
}

/// Deterministic, non repeating within a part
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn metadata(len: usize) -> ObjectMetadata {
    let mut metadata = ObjectMetadata::new();
    metadata.set_content_length(len as u64);
    metadata
}

pub fn part_result(part_number: u32, size: usize) -> Value {
    json!({ "partNumber": part_number, "partSize": size, "etag": format!("etag-{}", part_number) })
}

pub fn put_result(object: &str) -> Value {
    json!({
        "bucketName": BUCKET,
        "objectName": object,
        "accessKeyId": "AKID",
        "signature": "c2lnbmF0dXJl",
        "expires": 1_900_000_000_000i64
    })
}

pub async fn mount_init(server: &MockServer, object: &str) {
    Mock::given(method("PUT"))
        .and(path(format!("/{}/{}", BUCKET, object)))
        .and(query_param("uploads", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucketName": BUCKET,
            "objectName": object,
            "uploadId": UPLOAD_ID
        })))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_part(server: &MockServer, object: &str, part_number: u32, size: usize) {
    Mock::given(method("PUT"))
        .and(path(format!("/{}/{}", BUCKET, object)))
        .and(query_param("uploadId", UPLOAD_ID))
        .and(query_param("partNumber", part_number.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(part_result(part_number, size)))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_complete(server: &MockServer, object: &str, expected_calls: u64) {
    Mock::given(method("PUT"))
        .and(path(format!("/{}/{}", BUCKET, object)))
        .and(query_param("uploadId", UPLOAD_ID))
        .and(query_param_is_missing("partNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_json(put_result(object)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_abort(server: &MockServer, object: &str, expected_calls: u64) {
    Mock::given(method("DELETE"))
        .and(path(format!("/{}/{}", BUCKET, object)))
        .and(query_param("uploadId", UPLOAD_ID))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Requests seen by the server whose query carries `partNumber=<n>`
pub async fn part_requests(server: &MockServer, part_number: u32) -> usize {
    let wanted = part_number.to_string();
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| {
            r.url
                .query_pairs()
                .any(|(k, v)| k == "partNumber" && v == wanted.as_str())
        })
        .count()
}

/// One canned HTTP/1.1 response per accepted connection
pub enum Canned {
    /// Advertise `total` bytes but close after sending `body`
    Truncated { status: u16, total: usize, body: Vec<u8> },
    Full { status: u16, body: Vec<u8> },
}

/// A bare TCP responder for bodies that end early. Returns the base URI
/// and the raw request heads in arrival order.
pub async fn raw_server(responses: Vec<Canned>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_uri = format!("http://{}", listener.local_addr().unwrap());
    let heads = Arc::new(Mutex::new(Vec::new()));
    let seen = heads.clone();

    tokio::spawn(async move {
        for canned in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            seen.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&head).to_ascii_lowercase());

            let (status, length, body) = match canned {
                Canned::Truncated { status, total, body } => (status, total, body),
                Canned::Full { status, body } => (status, body.len(), body),
            };
            let reason = if status == 206 { "Partial Content" } else { "OK" };
            let response_head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status, reason, length
            );
            let _ = socket.write_all(response_head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.flush().await;
            let _ = socket.shutdown().await;
        }
    });

    (base_uri, heads)
}

pub fn range_header(head: &str) -> Option<String> {
    head.lines()
        .find_map(|line| line.strip_prefix("range:"))
        .map(|value| value.trim().to_string())
}
