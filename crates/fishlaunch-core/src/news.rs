use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fs_atomic::{ParentDir, write_json_atomic};

/// How long a cached news batch stays usable.
pub const NEWS_CACHE_TTL: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NewsId {
    Number(serde_json::Number),
    Text(String),
}

impl std::fmt::Display for NewsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NewsId::Number(number) => write!(f, "{number}"),
            NewsId::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: NewsId,
    pub title: String,
    pub date: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Extract the well-formed entries of a news payload.
///
/// Returns `None` when the payload is not a JSON array at all. Individual
/// entries lacking an id, title, date, or content are dropped so one bad
/// entry cannot hide the rest of the batch.
#[must_use]
pub fn parse_news_items(payload: &Value) -> Option<Vec<NewsItem>> {
    let entries = payload.as_array()?;
    let items: Vec<NewsItem> = entries.iter().filter_map(news_item_from_value).collect();
    let dropped = entries.len() - items.len();
    if dropped > 0 {
        warn!("Dropped {dropped} malformed news entries");
    }
    Some(items)
}

fn news_item_from_value(value: &Value) -> Option<NewsItem> {
    let object = value.as_object()?;
    let id = match object.get("id")? {
        Value::Number(number) => NewsId::Number(number.clone()),
        Value::String(text) => NewsId::Text(text.clone()),
        _ => return None,
    };
    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(NewsItem {
        id,
        title: text("title")?,
        date: text("date")?,
        content: text("content")?,
        image: text("image").filter(|image| !image.is_empty()),
    })
}

/// On-disk copy of the last successful remote news fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsCache {
    pub timestamp: DateTime<Utc>,
    pub news: Vec<NewsItem>,
}

impl NewsCache {
    #[must_use]
    pub fn new(news: Vec<NewsItem>, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, news }
    }

    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(cache) => Some(cache),
            Err(error) => {
                warn!("Ignoring unreadable news cache {}: {error}", path.display());
                None
            }
        }
    }

    /// Cached items, provided the cache is no older than [`NEWS_CACHE_TTL`]
    /// at `now`.
    #[must_use]
    pub fn load_fresh(path: &Path, now: DateTime<Utc>) -> Option<Vec<NewsItem>> {
        let cache = Self::load(path)?;
        if cache.is_expired(now) {
            debug!("News cache from {} has expired", cache.timestamp);
            return None;
        }
        Some(cache.news)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) > NEWS_CACHE_TTL
    }

    /// Persist the cache, creating its directory when needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        write_json_atomic(path, self, ParentDir::Create)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_item(id: u64) -> NewsItem {
        NewsItem {
            id: NewsId::Number(id.into()),
            title: format!("Patch notes {id}"),
            date: "2025-06-01".to_string(),
            content: "Boats are faster.".to_string(),
            image: None,
        }
    }

    #[test]
    fn parse_keeps_valid_entries_and_drops_malformed_ones() {
        let payload = json!([
            { "id": 1, "title": "One", "date": "2025-01-01", "content": "a" },
            { "id": "two", "title": "Two", "date": "2025-01-02", "content": "b", "image": "https://cdn/2.png" },
            { "title": "No id", "date": "2025-01-03", "content": "c" },
            { "id": 4, "title": 4, "date": "2025-01-04", "content": "d" },
            { "id": 5, "title": "No content", "date": "2025-01-05" },
            { "id": null, "title": "Null id", "date": "2025-01-06", "content": "f" },
            "not an object",
            { "id": 7, "title": "Empty image", "date": "2025-01-07", "content": "g", "image": "" }
        ]);

        let items = parse_news_items(&payload).expect("array payload should parse");

        let ids: Vec<String> = items.iter().map(|item| item.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "two", "7"]);
        assert_eq!(items[1].image.as_deref(), Some("https://cdn/2.png"));
        assert!(items[2].image.is_none());
    }

    #[test]
    fn parse_rejects_non_array_payloads() {
        assert!(parse_news_items(&json!({ "news": [] })).is_none());
        assert!(parse_news_items(&json!("news")).is_none());
    }

    #[test]
    fn news_id_serializes_back_to_original_shape() {
        let numeric = serde_json::to_value(NewsId::Number(3_u64.into())).expect("serialize id");
        let text = serde_json::to_value(NewsId::Text("x-3".into())).expect("serialize id");

        assert_eq!(numeric, json!(3));
        assert_eq!(text, json!("x-3"));
    }

    #[test]
    fn cache_is_fresh_within_ttl() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("cache").join("news-cache.json");
        let written_at = Utc::now() - Duration::hours(23);

        NewsCache::new(vec![sample_item(1)], written_at)
            .save(&path)
            .expect("cache should be saved");

        let news = NewsCache::load_fresh(&path, Utc::now()).expect("cache should be fresh");
        assert_eq!(news, vec![sample_item(1)]);
    }

    #[test]
    fn cache_past_ttl_is_treated_as_absent() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("news-cache.json");
        let written_at = Utc::now() - Duration::hours(25);

        NewsCache::new(vec![sample_item(1)], written_at)
            .save(&path)
            .expect("cache should be saved");

        assert!(NewsCache::load_fresh(&path, Utc::now()).is_none());
    }

    #[test]
    fn cache_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let cache = NewsCache::new(Vec::new(), now - NEWS_CACHE_TTL);

        assert!(!cache.is_expired(now));
        assert!(cache.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn cache_timestamp_is_rfc3339_on_disk() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("news-cache.json");

        NewsCache::new(vec![sample_item(9)], Utc::now())
            .save(&path)
            .expect("cache should be saved");

        let raw: Value = serde_json::from_str(
            &std::fs::read_to_string(&path).expect("cache should be readable"),
        )
        .expect("cache should be JSON");
        let timestamp = raw["timestamp"].as_str().expect("timestamp should be a string");
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert_eq!(raw["news"][0]["id"], json!(9));
    }

    #[test]
    fn corrupt_cache_loads_as_none() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("news-cache.json");
        std::fs::write(&path, "{broken").expect("cache file should be written");

        assert!(NewsCache::load_fresh(&path, Utc::now()).is_none());
    }
}
