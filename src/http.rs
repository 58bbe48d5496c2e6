//! The single outbound HTTP performer. `RequestExecutor` is a trait so the scheduler's
//! outcome-handling tests can substitute a scripted fake instead of issuing
//! real network calls.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::CoreError;
use crate::pool::{Endpoint, Protocol};

/// Outcome of one outbound request: the body text, or a `CoreError` the
/// scheduler's outcome table already knows how to route (`Transport`,
/// `Timeout`).
pub struct FetchResult {
    pub body: String,
    pub latency: Duration,
}

#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(
        &self,
        url: &str,
        protocol: Protocol,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<FetchResult, CoreError>;
}

/// `reqwest`-backed executor. A `reqwest::Client` is built per distinct
/// proxy endpoint and cached, since proxies rotate across the pool but each
/// individual proxy is reused across many requests within its lifetime, and
/// a `reqwest::Client` is tied to one proxy configuration at construction.
pub struct ReqwestExecutor {
    clients: Mutex<HashMap<String, reqwest::Client>>,
}

impl ReqwestExecutor {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, protocol: Protocol, endpoint: &Endpoint) -> Result<reqwest::Client, CoreError> {
        let key = format!("{}://{}:{}", protocol.as_url_scheme(), endpoint.host, endpoint.port);
        if let Some(client) = self.clients.lock().unwrap().get(&key) {
            return Ok(client.clone());
        }

        let mut proxy_url = format!("{}://{}:{}", protocol.as_url_scheme(), endpoint.host, endpoint.port);
        if let Some((user, pass)) = &endpoint.credentials {
            proxy_url = format!(
                "{}://{}:{}@{}:{}",
                protocol.as_url_scheme(),
                user,
                pass,
                endpoint.host,
                endpoint.port
            );
        }
        let proxy = reqwest::Proxy::all(&proxy_url).map_err(CoreError::Transport)?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .build()
            .map_err(CoreError::Transport)?;

        self.clients.lock().unwrap().insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ReqwestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(
        &self,
        url: &str,
        protocol: Protocol,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<FetchResult, CoreError> {
        let client = self.client_for(protocol, endpoint)?;
        let started = Instant::now();

        let response = client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout(timeout)
                } else {
                    CoreError::Transport(e)
                }
            })?;

        let body = response.text().await.map_err(CoreError::Transport)?;
        Ok(FetchResult {
            body,
            latency: started.elapsed(),
        })
    }
}

#[cfg(test)]
pub mod fake {
    //! A scripted executor for scheduler tests — returns queued responses in
    //! order instead of issuing real network calls.
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct ScriptedExecutor {
        responses: Vec<Result<String, CoreError>>,
        next: AtomicUsize,
    }

    impl ScriptedExecutor {
        pub fn new(responses: Vec<Result<String, CoreError>>) -> Self {
            Self {
                responses,
                next: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RequestExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            _url: &str,
            _protocol: Protocol,
            _endpoint: &Endpoint,
            _timeout: Duration,
        ) -> Result<FetchResult, CoreError> {
            let idx = self.next.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(idx) {
                Some(Ok(body)) => Ok(FetchResult {
                    body: body.clone(),
                    latency: Duration::from_millis(10),
                }),
                Some(Err(_)) => Err(match &self.responses[idx] {
                    Err(CoreError::Timeout(d)) => CoreError::Timeout(*d),
                    Err(CoreError::FatalEngine(m)) => CoreError::FatalEngine(m.clone()),
                    _ => CoreError::NoAvailable,
                }),
                None => Err(CoreError::NoAvailable),
            }
        }
    }
}
