use super::FetchError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

pub const NVD_API_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One keyword search against the CVE API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvdQuery {
    pub keyword: String,
    pub results_per_page: usize,
    pub start_index: usize,
}

impl NvdQuery {
    pub fn new(keyword: impl Into<String>, results_per_page: usize) -> Self {
        Self {
            keyword: keyword.into(),
            results_per_page,
            start_index: 0,
        }
    }
}

/// Performs a single CVE search and returns the decoded JSON body.
#[async_trait]
pub trait NvdTransport: Send + Sync {
    async fn search(&self, query: &NvdQuery) -> Result<Value, FetchError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("depwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    /// Transport for the public NVD endpoint with the standard
    /// [`REQUEST_TIMEOUT`].
    pub fn nvd(api_key: Option<String>) -> Result<Self, FetchError> {
        Self::new(NVD_API_URL, api_key, REQUEST_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn map_reqwest(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(error.to_string())
    }
}

#[async_trait]
impl NvdTransport for ReqwestTransport {
    async fn search(&self, query: &NvdQuery) -> Result<Value, FetchError> {
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[
                ("keywordSearch", query.keyword.clone()),
                ("resultsPerPage", query.results_per_page.to_string()),
                ("startIndex", query.start_index.to_string()),
            ])
            .header(ACCEPT, "application/json");

        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }

        let response = request.send().await.map_err(map_reqwest)?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(map_reqwest)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nvd_transport_has_request_timeout() {
        let transport = ReqwestTransport::nvd(Some(String::new())).unwrap();
        assert_eq!(transport.base_url(), NVD_API_URL);
        assert_eq!(transport.timeout(), Duration::from_secs(30));
        assert!(transport.api_key.is_none());
    }
}
