//! Configuration file round-trips through the real filesystem.

use winkeyd::config::Config;

#[tokio::test]
async fn create_default_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    Config::create_default(path).await.unwrap();
    let config = Config::load(path).await.unwrap();

    assert_eq!(config.keyer.baud_rate, 1200);
    assert_eq!(config.network.port, 6789);
    assert_eq!(config.cw.speed, 24);
}

#[tokio::test]
async fn load_missing_file_is_descriptive() {
    let err = Config::load("/nonexistent/winkeyd.toml").await.unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[tokio::test]
async fn load_rejects_bad_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(&path, "not valid toml [").await.unwrap();

    let err = Config::load(path.to_str().unwrap()).await.unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}
