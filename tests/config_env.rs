// tests/config_env.rs
use std::env;
use std::fs;
use std::time::Duration;

use newswire::config::{AppConfig, CacheBackend, ENV_CACHE_DIR, ENV_FETCH_TIMEOUT_MS};
use newswire::registry::{load_registry_default, ENV_SOURCES_PATH};

#[serial_test::serial]
#[test]
fn env_drives_app_config() {
    env::set_var(ENV_FETCH_TIMEOUT_MS, "1500");
    env::set_var(ENV_CACHE_DIR, "cache/test_config_env");
    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.fetch_timeout, Duration::from_millis(1500));
    assert_eq!(cfg.cache, CacheBackend::File("cache/test_config_env".into()));
    env::remove_var(ENV_FETCH_TIMEOUT_MS);
    env::remove_var(ENV_CACHE_DIR);
}

#[serial_test::serial]
#[test]
fn registry_path_comes_from_env() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("custom.json");
    fs::write(
        &p,
        r#"{"sources":[{"id":"x","name":"X","kind":"json_feed","url":"https://x.example/feed.json","interval_secs":30}]}"#,
    )
    .unwrap();

    env::set_var(ENV_SOURCES_PATH, p.display().to_string());
    let reg = load_registry_default().unwrap();
    env::remove_var(ENV_SOURCES_PATH);

    assert_eq!(reg.len(), 1);
    assert_eq!(reg.interval("x"), Some(Duration::from_secs(30)));
}
