use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use crate::http::{join_url, normalize_server_url};
use crate::news::{NewsCache, NewsItem, parse_news_items};
use crate::version_store::{VERSION_FILE, VersionManifest};

pub const NEWS_FILE: &str = "news.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("invalid {what} from {origin}")]
    Invalid { what: &'static str, origin: String },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{remote}; local fallback failed: {fallback}")]
    Unavailable {
        #[source]
        remote: Box<CatalogError>,
        fallback: Box<CatalogError>,
    },
}

/// Source of the published version and news manifests.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Base URL the catalog serves from; relative update files resolve
    /// against it.
    fn server_url(&self) -> &str;

    async fn fetch_remote_version(&self) -> Result<VersionManifest, CatalogError>;

    async fn fetch_news(&self) -> Result<Vec<NewsItem>, CatalogError>;
}

/// Catalog backed by `<server>/version.json` and `<server>/news.json`.
///
/// Failed remote reads fall back to same-named files in a local directory
/// (the working directory unless configured), which keeps offline and dev
/// setups working. News additionally falls back to the on-disk cache.
pub struct HttpCatalog {
    client: reqwest::Client,
    server_url: String,
    fallback_dir: Option<PathBuf>,
    news_cache_file: Option<PathBuf>,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(client: reqwest::Client, server_url: &str) -> Self {
        Self {
            client,
            server_url: normalize_server_url(server_url),
            fallback_dir: None,
            news_cache_file: None,
        }
    }

    #[must_use]
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_news_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.news_cache_file = Some(path.into());
        self
    }

    fn fallback_file(&self, name: &str) -> Option<PathBuf> {
        self.fallback_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .map(|dir| dir.join(name))
    }

    async fn fetch_remote_text(&self, name: &str) -> Result<(String, String), CatalogError> {
        let url = join_url(&self.server_url, name);
        debug!("Fetching {url}");

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|source| CatalogError::Request {
                    url: url.clone(),
                    source,
                })?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                url,
                status: response.status(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|source| CatalogError::Request {
                url: url.clone(),
                source,
            })?;
        Ok((url, body))
    }

    async fn read_fallback_text(&self, name: &str) -> Result<(String, String), CatalogError> {
        let path = self.fallback_file(name).ok_or_else(|| CatalogError::Invalid {
            what: "fallback location",
            origin: name.to_string(),
        })?;
        info!("Using local {name} at {}", path.display());
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
        Ok((path.display().to_string(), body))
    }

    /// Cache IO syncs to disk, so it runs on the blocking pool.
    async fn save_news_cache(&self, news: &[NewsItem]) {
        let Some(path) = self.news_cache_file.clone() else {
            return;
        };
        let cache = NewsCache::new(news.to_vec(), Utc::now());
        let written = tokio::task::spawn_blocking(move || {
            if let Err(error) = cache.save(&path) {
                warn!("Failed to cache news at {}: {error}", path.display());
            }
        })
        .await;
        if let Err(join_error) = written {
            warn!("News cache write task failed: {join_error}");
        }
    }

    async fn cached_news(&self) -> Option<Vec<NewsItem>> {
        let path = self.news_cache_file.clone()?;
        tokio::task::spawn_blocking(move || NewsCache::load_fresh(&path, Utc::now()))
            .await
            .unwrap_or_else(|join_error| {
                warn!("News cache read task failed: {join_error}");
                None
            })
    }
}

fn manifest_from(origin: String, body: &str) -> Result<VersionManifest, CatalogError> {
    VersionManifest::parse(body).ok_or(CatalogError::Invalid {
        what: "version data",
        origin,
    })
}

fn news_from(origin: String, body: &str) -> Result<Vec<NewsItem>, CatalogError> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(parse_news_items)
        .ok_or(CatalogError::Invalid {
            what: "news data",
            origin,
        })
}

#[async_trait]
impl Catalog for HttpCatalog {
    fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn fetch_remote_version(&self) -> Result<VersionManifest, CatalogError> {
        let remote = self
            .fetch_remote_text(VERSION_FILE)
            .await
            .and_then(|(url, body)| manifest_from(url, &body));
        let remote_error = match remote {
            Ok(manifest) => return Ok(manifest),
            Err(error) => error,
        };
        warn!("Remote version check failed: {remote_error}");

        let fallback = self
            .read_fallback_text(VERSION_FILE)
            .await
            .and_then(|(path, body)| manifest_from(path, &body));
        fallback.map_err(|fallback_error| {
            warn!("Local version fallback failed: {fallback_error}");
            CatalogError::Unavailable {
                remote: Box::new(remote_error),
                fallback: Box::new(fallback_error),
            }
        })
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>, CatalogError> {
        let remote = self
            .fetch_remote_text(NEWS_FILE)
            .await
            .and_then(|(url, body)| news_from(url, &body));
        let remote_error = match remote {
            Ok(news) => {
                self.save_news_cache(&news).await;
                return Ok(news);
            }
            Err(error) => error,
        };
        warn!("Remote news fetch failed: {remote_error}");

        let fallback = self
            .read_fallback_text(NEWS_FILE)
            .await
            .and_then(|(path, body)| news_from(path, &body));
        let fallback_error = match fallback {
            Ok(news) => return Ok(news),
            Err(error) => error,
        };
        debug!("Local news fallback failed: {fallback_error}");

        if let Some(news) = self.cached_news().await {
            info!("Serving {} cached news items", news.len());
            return Ok(news);
        }

        Err(CatalogError::Unavailable {
            remote: Box::new(remote_error),
            fallback: Box::new(fallback_error),
        })
    }
}
