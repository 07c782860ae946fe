//! Concurrent multi-source fetching.
//!
//! Every source runs in its own task. A failing source contributes nothing
//! and never affects its siblings. Results are concatenated in registration
//! order, not completion order, and duplicates are kept.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;

use crate::download::fetch_text;
use crate::error::{AppError, Result};
use crate::parser::{parse_body, ServerRecord};

#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    /// Timeout of each individual GET.
    pub request_timeout: Duration,
    /// How long the caller waits on each source task before abandoning it.
    pub join_timeout: Duration,
}

/// Cooperative stop flag shared with a [`Fetcher`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Fetcher {
    client: Client,
    sources: Vec<String>,
    settings: FetchSettings,
    stop: StopHandle,
}

impl Fetcher {
    /// The request timeout must not exceed the join timeout, so an abandoned
    /// task never outlives the caller's wait by more than one request.
    pub fn new(client: Client, sources: Vec<String>, settings: FetchSettings) -> Result<Self> {
        if settings.request_timeout > settings.join_timeout {
            return Err(AppError::config(format!(
                "request timeout {:?} exceeds join timeout {:?}",
                settings.request_timeout, settings.join_timeout
            )));
        }
        Ok(Self {
            client,
            sources,
            settings,
            stop: StopHandle::default(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the running fetch not to start any further sources.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Fetch every source and return the aggregated records.
    ///
    /// Each run starts with a cleared stop flag.
    pub async fn fetch_all(&self) -> Vec<ServerRecord> {
        self.stop.reset();
        self.dispatch().await
    }

    async fn dispatch(&self) -> Vec<ServerRecord> {
        let mut handles = Vec::with_capacity(self.sources.len());
        for url in &self.sources {
            if self.stop.is_stopped() {
                log::info!("Fetch stopped, skipping remaining sources");
                break;
            }
            let client = self.client.clone();
            let url = url.clone();
            let timeout = self.settings.request_timeout;
            handles.push(tokio::spawn(
                async move { fetch_source(&client, &url, timeout).await },
            ));
            // Let a stop requested from another task land before the next spawn.
            tokio::task::yield_now().await;
        }

        let mut servers = Vec::new();
        for (index, handle) in handles.into_iter().enumerate() {
            match tokio::time::timeout(self.settings.join_timeout, handle).await {
                Ok(Ok(records)) => servers.extend(records),
                Ok(Err(e)) => {
                    log::warn!("Source task {} failed: {}", index, e);
                }
                Err(_) => {
                    log::warn!(
                        "Source task {} did not finish within {:?}, abandoning it",
                        index,
                        self.settings.join_timeout
                    );
                }
            }
        }

        log::info!(
            "Fetched {} servers from {} sources",
            servers.len(),
            self.sources.len()
        );
        servers
    }
}

/// Run a fetch in the background; the caller may await or drop the handle.
pub fn spawn_fetch(fetcher: Arc<Fetcher>) -> JoinHandle<Vec<ServerRecord>> {
    tokio::spawn(async move { fetcher.fetch_all().await })
}

async fn fetch_source(client: &Client, url: &str, timeout: Duration) -> Vec<ServerRecord> {
    match fetch_text(client, url, timeout).await {
        Ok(body) => {
            let records = parse_body(&body);
            log::debug!("{} valid servers from {}", records.len(), url);
            records
        }
        Err(e) => {
            log::warn!("Skipping source: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(request: u64, join: u64) -> FetchSettings {
        FetchSettings {
            request_timeout: Duration::from_millis(request),
            join_timeout: Duration::from_millis(join),
        }
    }

    #[test]
    fn request_timeout_longer_than_join_is_rejected() {
        let result = Fetcher::new(Client::new(), Vec::new(), settings(2000, 1000));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stopped_dispatch_launches_nothing() {
        let fetcher = Fetcher::new(
            Client::new(),
            vec!["http://127.0.0.1:9/unreachable".to_string()],
            settings(100, 200),
        )
        .unwrap();
        fetcher.stop();
        assert!(fetcher.dispatch().await.is_empty());
        assert!(fetcher.stop_handle().is_stopped());
    }

    #[tokio::test]
    async fn new_run_clears_stop_flag() {
        let fetcher = Fetcher::new(Client::new(), Vec::new(), settings(100, 200)).unwrap();
        let handle = fetcher.stop_handle();
        handle.stop();
        assert!(fetcher.fetch_all().await.is_empty());
        assert!(!handle.is_stopped());
    }
}
