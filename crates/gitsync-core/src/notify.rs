//! Post-sync notifications

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::config::{NotifyConfig, NotifyMethod};
use crate::{Error, Result};

/// Announces a successful materialization to an external listener.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification to `endpoint`.
    async fn notify(&self, endpoint: &NotifyConfig) -> Result<()>;
}

/// Sends one bodiless HTTP request per notification.
///
/// Any non-2xx response counts as a delivery failure.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("git-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn method(method: NotifyMethod) -> Method {
    match method {
        NotifyMethod::Get => Method::GET,
        NotifyMethod::Post => Method::POST,
        NotifyMethod::Head => Method::HEAD,
    }
}

#[async_trait]
impl NotificationSink for HttpNotifier {
    async fn notify(&self, endpoint: &NotifyConfig) -> Result<()> {
        let failed = |message: String| Error::NotificationFailed {
            endpoint: endpoint.url.to_string(),
            message,
        };

        let response = self
            .client
            .request(method(endpoint.method), endpoint.url.clone())
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("endpoint answered {status}")));
        }

        tracing::debug!(url = %endpoint.url, method = %endpoint.method, %status, "Notification delivered");
        Ok(())
    }
}
