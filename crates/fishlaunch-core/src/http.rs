use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const FALLBACK_ARCHIVE_NAME: &str = "update.zip";

/// Timeouts and identification applied to every request the launcher makes.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("fishlaunch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Build the shared HTTP client.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(options: &HttpOptions) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(options.request_timeout)
        .connect_timeout(options.connect_timeout)
        .user_agent(options.user_agent.clone())
        .build()
}

/// Canonical form of a configured server base URL: no trailing slash and an
/// explicit scheme (`http://` is assumed when none is given).
#[must_use]
pub fn normalize_server_url(server_url: &str) -> String {
    let trimmed = server_url.trim().trim_end_matches('/');
    if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Join a catalog file name onto the server base URL.
#[must_use]
pub fn join_url(server_url: &str, file: &str) -> String {
    format!(
        "{}/{}",
        normalize_server_url(server_url),
        file.trim_start_matches('/')
    )
}

/// Absolute URLs are used verbatim; anything else is relative to the server.
#[must_use]
pub fn resolve_download_url(file: &str, server_url: &str) -> String {
    if has_http_scheme(file) {
        file.to_string()
    } else {
        join_url(server_url, file)
    }
}

/// Local file name for a downloaded archive: the last path segment of the URL
/// with query/fragment removed, or `update.zip` when nothing usable remains.
#[must_use]
pub fn archive_file_name(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    let raw_name = without_suffix.rsplit('/').next().unwrap_or_default();
    if raw_name.contains('\\') {
        return FALLBACK_ARCHIVE_NAME.to_string();
    }
    std::path::Path::new(raw_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && !name.contains(".."))
        .map_or_else(|| FALLBACK_ARCHIVE_NAME.to_string(), str::to_string)
}

fn has_http_scheme(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
