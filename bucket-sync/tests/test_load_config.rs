use bucket_sync::load_config::{apply, load_config, load_settings, FileConfig, API_URL_ENV};
use bucket_sync_core::config::{EngineSettings, DEFAULT_BASE_URL, DEFAULT_UPLOAD_QUEUE};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn defaults_without_file() {
    env::remove_var(API_URL_ENV);
    let settings = load_settings(None).expect("defaults should load");

    assert_eq!(settings.client.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.upload_queue, DEFAULT_UPLOAD_QUEUE);
    assert_eq!(settings.download_queue, 10);
    assert_eq!(settings.signature_ttl, Duration::from_secs(300));
    assert!(settings.workers >= 1);
    assert!(settings.extensions.iter().any(|e| e == "png"));
}

#[test]
#[serial]
fn yaml_overrides_selected_fields() {
    env::remove_var(API_URL_ENV);
    let file = config_file(
        r#"
api:
  base_url: https://files.example.test
  timeout_secs: 5
transfer:
  workers: 3
  download_queue: 4
  extensions: [txt, pdf]
retry:
  max_retries: 1
  initial_interval_ms: 20
"#,
    );

    let settings = load_settings(Some(file.path())).expect("config should load");
    assert_eq!(settings.client.base_url, "https://files.example.test");
    assert_eq!(settings.client.timeout, Duration::from_secs(5));
    assert_eq!(settings.workers, 3);
    assert_eq!(settings.download_queue, 4);
    assert_eq!(settings.upload_queue, DEFAULT_UPLOAD_QUEUE);
    assert_eq!(settings.extensions, vec!["txt".to_string(), "pdf".to_string()]);
    assert_eq!(settings.retry.max_retries, 1);
    assert_eq!(settings.retry.initial_interval, Duration::from_millis(20));
    assert_eq!(settings.retry.multiplier, 1.5);
}

#[test]
#[serial]
fn environment_overrides_base_url() {
    let file = config_file("api:\n  base_url: https://from-file.example.test\n");
    env::set_var(API_URL_ENV, "https://from-env.example.test");

    let settings = load_settings(Some(file.path()));
    env::remove_var(API_URL_ENV);

    assert_eq!(settings.unwrap().client.base_url, "https://from-env.example.test");
}

#[test]
fn unknown_keys_and_bad_yaml_are_rejected() {
    let unknown = config_file("transfer:\n  wokers: 3\n");
    assert!(load_config(unknown.path()).is_err());

    let broken = config_file("api: [unterminated\n");
    let err = load_config(broken.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));

    assert!(load_config("/definitely/not/here.yaml").is_err());
}

#[test]
fn invalid_values_are_rejected() {
    let file = config_file("transfer:\n  workers: 0\n");
    let parsed: FileConfig = load_config(file.path()).unwrap();
    let err = apply(EngineSettings::default(), parsed).unwrap_err();
    assert!(format!("{err:#}").contains("transfer.workers"));

    let file = config_file("retry:\n  multiplier: 0.5\n");
    let parsed = load_config(file.path()).unwrap();
    assert!(apply(EngineSettings::default(), parsed).is_err());

    let file = config_file("api:\n  timeout_secs: 120\n");
    let parsed = load_config(file.path()).unwrap();
    let err = apply(EngineSettings::default(), parsed).unwrap_err();
    assert!(format!("{err:#}").contains("api.timeout_secs"));
}
