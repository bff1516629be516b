//! HTTP access to remote repositories with retry on transient failures.

use std::time::Duration;

use graven_util::errors::GravenError;
use reqwest::{Client, Response, StatusCode};

use crate::repository::MavenRepository;

/// What one request attempt amounted to.
enum Attempt {
    /// The file exists (`Some`) or the repository does not have it (`None`).
    Done(Option<Vec<u8>>),
    /// Worth another try: 5xx, timeouts and refused connections.
    Transient(String),
}

/// A shared HTTP client plus the retry schedule applied to every request.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    attempts: u32,
    backoff: Duration,
}

impl Downloader {
    pub fn new(request_timeout: Duration) -> miette::Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("graven/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GravenError::Network {
                message: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }

    /// Override the retry schedule. `attempts` is clamped to at least one.
    pub fn with_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// GET `url` from `repo`.
    ///
    /// `Ok(None)` means 404. Other client errors fail immediately; transient
    /// failures are retried with linear backoff before giving up.
    pub async fn fetch(&self, repo: &MavenRepository, url: &str) -> miette::Result<Option<Vec<u8>>> {
        let mut reason = String::new();
        for attempt in 0..self.attempts {
            if attempt > 0 {
                tracing::debug!("retry {attempt} for {url} after: {reason}");
                tokio::time::sleep(self.backoff * attempt).await;
            }
            let sent = repo.authorize(self.client.get(url)).send().await;
            match self.settle(url, sent).await? {
                Attempt::Done(body) => return Ok(body),
                Attempt::Transient(why) => reason = why,
            }
        }
        Err(GravenError::Network {
            message: format!("{url} still failing after {} attempts: {reason}", self.attempts),
        }
        .into())
    }

    /// [`fetch`](Self::fetch), decoded as UTF-8 (lossily).
    pub async fn fetch_text(&self, repo: &MavenRepository, url: &str) -> miette::Result<Option<String>> {
        let body = self.fetch(repo, url).await?;
        Ok(body.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn settle(
        &self,
        url: &str,
        sent: Result<Response, reqwest::Error>,
    ) -> Result<Attempt, GravenError> {
        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => return Ok(Attempt::Transient(e.to_string())),
            Err(e) => {
                return Err(GravenError::Network {
                    message: format!("GET {url}: {e}"),
                })
            }
        };
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Attempt::Done(None)),
            status if status.is_server_error() => Ok(Attempt::Transient(format!("HTTP {status}"))),
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| GravenError::Network {
                    message: format!("reading body of {url}: {e}"),
                })?;
                Ok(Attempt::Done(Some(body.to_vec())))
            }
            status => Err(GravenError::Network {
                message: format!("HTTP {status} for {url}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_never_drop_to_zero() {
        let downloader = Downloader::with_client(Client::new()).with_retries(0, Duration::ZERO);
        assert_eq!(downloader.attempts, 1);
    }

    #[tokio::test]
    async fn refused_connections_give_up_after_the_schedule() {
        let repo = MavenRepository::from_repository(
            &graven_core::repository::Repository::new("dead", "http://127.0.0.1:9"),
            None,
        );
        let downloader = Downloader::with_client(Client::new()).with_retries(2, Duration::ZERO);
        let err = downloader
            .fetch(&repo, "http://127.0.0.1:9/x.pom")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("after 2 attempts"), "got: {err}");
    }
}
