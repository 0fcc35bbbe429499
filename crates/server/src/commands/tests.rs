use super::*;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.database_path = dir.path().join("hookgate.db");
    config
}

#[tokio::test]
async fn test_connect_db_migrates() {
    let dir = TempDir::new().unwrap();
    let pool = connect_db(&config_in(&dir)).await.unwrap();

    assert!(applied_version(&pool).await.unwrap() > 0);
    assert!(dir.path().join("hookgate.db").exists());
}

#[tokio::test]
async fn test_purge_older_than_keeps_recent() {
    let dir = TempDir::new().unwrap();
    let pool = connect_db(&config_in(&dir)).await.unwrap();

    let two_days_ago = Timestamp::now().saturating_sub(Duration::from_secs(48 * 3600));
    queries::insert_record(&pool, "t1", "old", two_days_ago)
        .await
        .unwrap();
    queries::insert_record(&pool, "t1", "new", Timestamp::now())
        .await
        .unwrap();

    assert_eq!(purge_older_than(&pool, 24).await.unwrap(), 1);
    assert_eq!(queries::count_records(&pool).await.unwrap(), 1);
    assert!(queries::get_record(&pool, "t1", "new").await.unwrap().is_some());
}

#[tokio::test]
async fn test_purge_command_runs() {
    let dir = TempDir::new().unwrap();
    purge(&config_in(&dir), 1).await.unwrap();
}

#[test]
fn test_init_then_check_config() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_directory(dir.path().to_path_buf()).unwrap();

    init_config(&manager).unwrap();
    assert!(manager.config_path().exists());
    check_config(&manager, true).unwrap();

    // Second init leaves the file alone
    init_config(&manager).unwrap();
}

#[test]
fn test_check_config_rejects_short_secret() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_directory(dir.path().to_path_buf()).unwrap();
    std::fs::write(
        manager.config_path(),
        "[ingest.sources.github]\nsecret = \"short\"\n",
    )
    .unwrap();

    assert!(check_config(&manager, true).is_err());
}
