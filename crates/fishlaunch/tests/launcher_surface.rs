mod common;

use chrono::{Duration, Utc};
use fishlaunch::{FileSettingsStore, SettingsStore};
use fishlaunch_core::{NewsCache, NewsId, NewsItem};

use common::{Reply, launcher, offline_url, update_server};

fn cached_item() -> NewsItem {
    NewsItem {
        id: NewsId::Text("spring".to_string()),
        title: "Spring event".to_string(),
        date: "2024-04-01".to_string(),
        content: "Trout are biting".to_string(),
        image: None,
    }
}

#[tokio::test]
async fn fresh_news_cache_serves_offline_requests() {
    let app_root = tempfile::tempdir().expect("app root should be created");
    let harness = launcher(app_root.path(), &offline_url().await, None);
    NewsCache::new(vec![cached_item()], Utc::now() - Duration::hours(1))
        .save(&harness.paths.news_cache_file())
        .expect("cache should be saved");

    let news = harness.service.get_news_items().await;

    assert_eq!(news, vec![cached_item()]);
}

#[tokio::test]
async fn expired_news_cache_is_ignored() {
    let app_root = tempfile::tempdir().expect("app root should be created");
    let harness = launcher(app_root.path(), &offline_url().await, None);
    NewsCache::new(vec![cached_item()], Utc::now() - Duration::hours(25))
        .save(&harness.paths.news_cache_file())
        .expect("cache should be saved");

    assert!(harness.service.get_news_items().await.is_empty());
}

#[tokio::test]
async fn remote_news_is_cached_for_later() {
    let server = update_server(vec![(
        "news.json",
        Reply::Json(
            r#"[{"id":1,"title":"Patch day","date":"2024-06-01","content":"New lures"},{"title":"broken"}]"#
                .to_string(),
        ),
    )])
    .await;
    let app_root = tempfile::tempdir().expect("app root should be created");
    let harness = launcher(app_root.path(), &server.base_url, None);

    let news = harness.service.get_news_items().await;

    assert_eq!(news.len(), 1);
    assert_eq!(news[0].title, "Patch day");
    let cache = NewsCache::load(&harness.paths.news_cache_file()).expect("cache should be written");
    assert_eq!(cache.news, news);
}

#[test]
fn launch_in_empty_directory_reports_missing_executable() {
    let install = tempfile::tempdir().expect("install dir should be created");
    let app_root = tempfile::tempdir().expect("app root should be created");
    let harness = launcher(app_root.path(), "http://127.0.0.1:9", Some(install.path()));

    let result = harness.service.launch_game(install.path());

    assert!(!result.success);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|error| error.contains("No executable found"))
    );
}

#[test]
fn game_directory_survives_restart() {
    let install = tempfile::tempdir().expect("install dir should be created");
    let app_root = tempfile::tempdir().expect("app root should be created");
    let harness = launcher(app_root.path(), "http://127.0.0.1:9", None);

    assert!(harness.service.set_game_directory(install.path()));

    let reloaded = FileSettingsStore::from_paths(&harness.paths).load();
    assert_eq!(reloaded.game_directory.as_deref(), Some(install.path()));
    assert_eq!(reloaded.server_url, "http://127.0.0.1:9");
}

#[test]
fn version_defaults_until_a_manifest_exists() {
    let install = tempfile::tempdir().expect("install dir should be created");
    let app_root = tempfile::tempdir().expect("app root should be created");
    let harness = launcher(app_root.path(), "http://127.0.0.1:9", Some(install.path()));

    assert_eq!(harness.service.get_game_version(install.path()), "0.0.0");

    std::fs::write(install.path().join("version.json"), "not json").expect("file should be written");
    assert_eq!(harness.service.get_game_version(install.path()), "0.0.0");

    std::fs::write(install.path().join("version.json"), r#"{"version":"2.0.1"}"#)
        .expect("file should be written");
    assert_eq!(harness.service.get_game_version(install.path()), "2.0.1");
}
