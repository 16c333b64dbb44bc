//! REST resource fetcher used by poll cycles.

use std::time::Duration;

use async_trait::async_trait;
use events::Category;
use serde_json::Value;

use crate::endpoints::to_http_scheme;
use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch one tracked dashboard resource as opaque JSON.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, category: Category) -> Result<Value, ClientError>;
}

/// Request path for a tracked resource.
#[must_use]
pub fn resource_path(category: Category, recent_limit: usize) -> String {
    match category {
        Category::DashboardStats => "/api/dashboard/stats".to_owned(),
        Category::Truck => format!("/api/trucks?limit={recent_limit}"),
        Category::Maintenance => format!("/api/maintenance?limit={recent_limit}"),
    }
}

pub struct HttpFetcher {
    http: reqwest::Client,
    base_url: String,
    recent_limit: usize,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, recent_limit: usize) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = to_http_scheme(base_url.trim_end_matches('/'));
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidEndpoint(base_url));
        }
        Ok(Self { http, base_url, recent_limit })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, category: Category) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, resource_path(category, self.recent_limit));
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::HttpStatus(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths_request_recent_limit() {
        assert_eq!(resource_path(Category::DashboardStats, 5), "/api/dashboard/stats");
        assert_eq!(resource_path(Category::Truck, 5), "/api/trucks?limit=5");
        assert_eq!(resource_path(Category::Maintenance, 3), "/api/maintenance?limit=3");
    }

    #[test]
    fn live_scheme_base_is_translated() {
        let fetcher = HttpFetcher::new("wss://fleet.example.com/", 5).expect("valid base");
        assert_eq!(fetcher.base_url(), "https://fleet.example.com");
    }

    #[test]
    fn non_http_base_is_rejected() {
        assert!(matches!(HttpFetcher::new("ftp://x", 5), Err(ClientError::InvalidEndpoint(_))));
    }
}
