//! HTTP transport for remote KML documents.

use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::RemoteError;
use crate::config::RemoteConfig;

const KML_ACCEPT: &str =
    "application/vnd.google-earth.kml+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.5";

/// Status and body of one GET
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBody {
    pub status: u16,
    pub body: String,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can GET a document.
///
/// Transport failures and timeouts come back as `RemoteError`; HTTP error
/// statuses come back as a `FetchedBody` for the resolver to judge.
pub trait DocumentFetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedBody, RemoteError>> + Send;
}

/// reqwest-backed fetcher with a bounded timeout and redirect budget
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &RemoteConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .redirect(Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedBody, RemoteError>> + Send {
        let client = self.client.clone();
        let timeout = self.timeout;
        let url = url.clone();

        async move {
            debug!("GET {}", url);

            let response = client
                .get(url.clone())
                .header(ACCEPT, KML_ACCEPT)
                .send()
                .await
                .map_err(|e| transport_error(&url, e, timeout))?;

            let status = response.status().as_u16();
            if !response.status().is_success() {
                return Ok(FetchedBody {
                    status,
                    body: String::new(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| transport_error(&url, e, timeout))?;

            Ok(FetchedBody { status, body })
        }
    }
}

fn transport_error(url: &Url, err: reqwest::Error, timeout: Duration) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        RemoteError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
