mod common;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bucket_sync_core::contract::{FileService, Identity, MockFileService, SignMethod, Visibility};
use bucket_sync_core::error::{SyncError, TransportError};
use bucket_sync_core::synchronise::SyncContext;
use bucket_sync_core::upload::{upload, UploadRequest};
use common::{remote_file, signature, test_settings};
use tempfile::tempdir;

/// 10 files at the root, 10 in `a/`, 10 in `a/b/`, plus two rejected by the filter.
fn populate(root: &Path) {
    fs::create_dir_all(root.join("a/b")).unwrap();
    for i in 0..10 {
        fs::write(root.join(format!("root-{i}.txt")), b"r").unwrap();
        fs::write(root.join(format!("a/mid-{i}.png")), b"m").unwrap();
        fs::write(root.join(format!("a/b/leaf-{i}.json")), b"l").unwrap();
    }
    fs::write(root.join("tool.exe"), b"x").unwrap();
    fs::write(root.join("a/b/archive.tar"), b"x").unwrap();
}

/// A service that signs any directory and echoes uploads back, recording
/// how often each directory was signed.
fn echo_service(signs: Arc<Mutex<HashMap<String, usize>>>) -> MockFileService {
    let mut service = MockFileService::new();
    service.expect_sign().returning(move |scope| {
        assert_eq!(scope.method, SignMethod::Upsert);
        *signs.lock().unwrap().entry(scope.path.clone()).or_default() += 1;
        Ok(signature(&format!("sig:{}", scope.path)))
    });
    service
        .expect_upload()
        .returning(|sig: &str, _path: &Path, filename: &str| {
            let dir = sig.trim_start_matches("sig:");
            if filename.starts_with("broken") {
                return Err(TransportError::EmptyResponse("upload"));
            }
            Ok(remote_file(&format!("{dir}/{filename}"), dir, filename))
        });
    service
}

fn context(service: MockFileService) -> SyncContext {
    let service: Arc<dyn FileService> = Arc::new(service);
    SyncContext::new(service, Identity::new("tenant-1", "token"), test_settings())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn uploads_tree_with_one_signature_per_directory() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let signs = Arc::new(Mutex::new(HashMap::new()));
    let ctx = context(echo_service(signs.clone()));

    let report = upload(
        &ctx,
        UploadRequest {
            source: dir.path().to_path_buf(),
            destination: "/uploads/".to_string(),
            visibility: Visibility::Public,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.succeeded.len(), 30);
    assert!(report.all_succeeded());

    let destinations: Vec<&str> = report.succeeded.iter().map(|s| s.destination.as_str()).collect();
    assert!(destinations.contains(&"/uploads/root-0.txt"));
    assert!(destinations.contains(&"/uploads/a/mid-3.png"));
    assert!(destinations.contains(&"/uploads/a/b/leaf-9.json"));
    assert!(!destinations.iter().any(|d| d.ends_with(".exe") || d.ends_with(".tar")));

    let signs = signs.lock().unwrap();
    assert_eq!(signs.len(), 3);
    assert_eq!(signs.get("/uploads"), Some(&1));
    assert_eq!(signs.get("/uploads/a"), Some(&1));
    assert_eq!(signs.get("/uploads/a/b"), Some(&1));
}

#[tokio::test]
async fn single_file_source_is_uploaded_under_destination() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("one.txt");
    fs::write(&file, b"1").unwrap();
    let ctx = context(echo_service(Arc::new(Mutex::new(HashMap::new()))));

    let report = upload(
        &ctx,
        UploadRequest {
            source: file,
            destination: "uploads".to_string(),
            visibility: Visibility::Public,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].destination, "/uploads/one.txt");
    assert_eq!(
        report.succeeded[0].url.as_deref(),
        Some("https://cdn.example.test//uploads/one.txt")
    );
}

#[tokio::test]
async fn failing_file_is_recorded_and_others_continue() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "b.txt", "broken.txt", "c.txt"] {
        fs::write(dir.path().join(name), b"x").unwrap();
    }
    let ctx = context(echo_service(Arc::new(Mutex::new(HashMap::new()))));

    let report = upload(
        &ctx,
        UploadRequest {
            source: dir.path().to_path_buf(),
            destination: "/uploads".to_string(),
            visibility: Visibility::Private,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.succeeded.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].item.ends_with("broken.txt"));
}

#[tokio::test]
async fn signing_failure_fails_only_that_directory() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("locked")).unwrap();
    fs::write(dir.path().join("open.txt"), b"x").unwrap();
    fs::write(dir.path().join("locked/secret.txt"), b"x").unwrap();

    let mut service = MockFileService::new();
    service.expect_sign().returning(|scope| {
        if scope.path.ends_with("locked") {
            Err(TransportError::EmptyResponse("signature"))
        } else {
            Ok(signature(&format!("sig:{}", scope.path)))
        }
    });
    service
        .expect_upload()
        .times(1)
        .returning(|_, _, filename| Ok(remote_file("id", "/uploads", filename)));
    let ctx = context(service);

    let report = upload(
        &ctx,
        UploadRequest {
            source: dir.path().to_path_buf(),
            destination: "/uploads".to_string(),
            visibility: Visibility::Public,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("signature"));
}

#[tokio::test]
async fn missing_source_is_fatal() {
    let dir = tempdir().unwrap();
    let mut service = MockFileService::new();
    service.expect_sign().never();
    let ctx = context(service);

    let err = upload(
        &ctx,
        UploadRequest {
            source: dir.path().join("does-not-exist"),
            destination: "/uploads".to_string(),
            visibility: Visibility::Public,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SyncError::InvalidSource { .. }));
}
