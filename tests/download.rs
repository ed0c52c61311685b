mod common;

use common::*;
use fds_client::{FdsError, ProgressListener, UserParam};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn positive_offset_requests_a_range() {
    let server = MockServer::start().await;
    let data = payload(40960);

    Mock::given(method("GET"))
        .and(path("/bucket/big"))
        .and(header("range", "bytes=10240-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(data[10240..].to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let object = client(&server.uri())
        .get_object(BUCKET, "big", 10240, &[], None)
        .await
        .unwrap();
    assert_eq!(object.bucket_name(), BUCKET);
    assert_eq!(object.object_name(), "big");
    let body = object.into_content().bytes().await.unwrap();
    assert_eq!(body.as_ref(), &data[10240..]);
}

#[tokio::test]
async fn zero_offset_sends_no_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/small"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload(100)))
        .expect(1)
        .mount(&server)
        .await;

    let object = client(&server.uri())
        .get_object(BUCKET, "small", 0, &[], None)
        .await
        .unwrap();
    assert_eq!(object.into_content().bytes().await.unwrap().len(), 100);

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("range"));
}

#[tokio::test]
async fn thumbnail_ignores_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload(64)))
        .expect(1)
        .mount(&server)
        .await;

    client(&server.uri())
        .get_object(BUCKET, "photo.jpg", 500, &[UserParam::thumb(32, 32)], None)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("range"));
    assert_eq!(requests[0].url.query_pairs().find(|(k, _)| k == "thumb").unwrap().1, "1");
}

#[tokio::test]
async fn presigned_uri_is_downloaded_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/shared.bin"))
        .and(wiremock::matchers::query_param("Signature", "c2ln"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"shared".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let uri = format!(
        "{}/bucket/shared.bin?GalaxyAccessKeyId=AKID&Expires=1900000000000&Signature=c2ln",
        server.uri()
    );
    let object = client(&server.uri())
        .get_object_from_uri(&uri, 0, &[], None)
        .await
        .unwrap();
    assert_eq!(object.object_name(), "shared.bin");
    assert_eq!(object.into_content().bytes().await.unwrap().as_ref(), b"shared");
}

#[tokio::test]
async fn missing_object_is_an_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .get_object(BUCKET, "gone", 0, &[], None)
        .await
        .unwrap_err();
    match err {
        FdsError::UnexpectedStatus { operation, status, .. } => {
            assert_eq!(operation, "get object");
            assert_eq!(status.as_u16(), 404);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn file_download_writes_body_and_parent_dirs() {
    let server = MockServer::start().await;
    let data = payload(9000);
    Mock::given(method("GET"))
        .and(path("/bucket/file.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(data.clone())
                .insert_header("content-type", "application/x-test"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("nested/deeper/file.bin");
    let metadata = client(&server.uri())
        .get_object_to_file(BUCKET, "file.bin", &destination, &[], None)
        .await
        .unwrap();

    assert_eq!(metadata.content_type(), Some("application/x-test"));
    assert_eq!(tokio::fs::read(&destination).await.unwrap(), data);
}

#[tokio::test]
async fn truncated_body_resumes_with_range_and_appends() {
    let data = payload(20000);
    let half = 8000;
    let (base_uri, heads) = raw_server(vec![
        Canned::Truncated {
            status: 200,
            total: data.len(),
            body: data[..half].to_vec(),
        },
        Canned::Full {
            status: 206,
            body: data[half..].to_vec(),
        },
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("resumed.bin");
    client(&base_uri)
        .get_object_to_file(BUCKET, "resumed.bin", &destination, &[], None)
        .await
        .unwrap();

    let heads = heads.lock().unwrap();
    assert_eq!(heads.len(), 2);
    assert_eq!(range_header(&heads[0]), None);
    assert_eq!(range_header(&heads[1]), Some(format!("bytes={}-", half)));
    assert_eq!(tokio::fs::read(&destination).await.unwrap(), data);
}

#[tokio::test]
async fn ignored_range_rewrites_the_file_from_zero() {
    let data = payload(20000);
    let (base_uri, heads) = raw_server(vec![
        Canned::Truncated {
            status: 200,
            total: data.len(),
            body: data[..8000].to_vec(),
        },
        Canned::Full {
            status: 200,
            body: data.clone(),
        },
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("whole.bin");
    client(&base_uri)
        .get_object_to_file(BUCKET, "whole.bin", &destination, &[], None)
        .await
        .unwrap();

    let heads = heads.lock().unwrap();
    assert_eq!(range_header(&heads[1]), Some("bytes=8000-".to_string()));
    assert_eq!(tokio::fs::read(&destination).await.unwrap(), data);
}

#[tokio::test]
async fn resumed_download_progress_keeps_counting_to_the_object_size() {
    let data = payload(20000);
    let half = 8000;
    let (base_uri, _heads) = raw_server(vec![
        Canned::Truncated {
            status: 200,
            total: data.len(),
            body: data[..half].to_vec(),
        },
        Canned::Full {
            status: 206,
            body: data[half..].to_vec(),
        },
    ])
    .await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let listener: Arc<dyn ProgressListener> = Arc::new(move |transferred: u64, total: u64| {
        sink.lock().unwrap().push((transferred, total));
    });

    let dir = tempfile::tempdir().unwrap();
    client(&base_uri)
        .get_object_to_file(BUCKET, "resumed.bin", &dir.path().join("r.bin"), &[], Some(listener))
        .await
        .unwrap();

    let calls = calls.lock().unwrap();
    let size = data.len() as u64;
    assert!(calls.iter().all(|&(_, total)| total == size));
    assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(calls.last(), Some(&(size, size)));
}

#[tokio::test]
async fn truncated_thumbnail_restarts_from_zero() {
    let data = payload(5000);
    let (base_uri, heads) = raw_server(vec![
        Canned::Truncated {
            status: 200,
            total: data.len(),
            body: data[..1000].to_vec(),
        },
        Canned::Full {
            status: 200,
            body: data.clone(),
        },
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("thumb.jpg");
    client(&base_uri)
        .get_object_to_file(
            BUCKET,
            "thumb.jpg",
            &destination,
            &[UserParam::thumb(64, 64)],
            None,
        )
        .await
        .unwrap();

    let heads = heads.lock().unwrap();
    assert_eq!(heads.len(), 2);
    assert_eq!(range_header(&heads[1]), None);
    assert!(heads[1].contains("thumb=1"));
    assert_eq!(tokio::fs::read(&destination).await.unwrap(), data);
}

#[tokio::test]
async fn server_errors_exhaust_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("down.bin");
    let err = client(&server.uri())
        .get_object_to_file(BUCKET, "down", &destination, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FdsError::UnexpectedStatus { .. }));
    assert!(!destination.exists());
}

#[tokio::test]
async fn unwritable_destination_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/obj"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload(10)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = client(&server.uri())
        .get_object_to_file(BUCKET, "obj", dir.path(), &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FdsError::Io { .. }));
}

#[tokio::test]
async fn download_progress_ends_at_total() {
    let server = MockServer::start().await;
    let data = payload(30000);
    Mock::given(method("GET"))
        .and(path("/bucket/tracked"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
        .mount(&server)
        .await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let listener: Arc<dyn ProgressListener> = Arc::new(move |transferred: u64, total: u64| {
        sink.lock().unwrap().push((transferred, total));
    });

    let dir = tempfile::tempdir().unwrap();
    client(&server.uri())
        .get_object_to_file(BUCKET, "tracked", &dir.path().join("t.bin"), &[], Some(listener))
        .await
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.last(), Some(&(data.len() as u64, data.len() as u64)));
}
