//! fal.ai client: queue API for image-to-image generation and the storage
//! API for publishing the uploaded portrait.

mod queue;
mod storage;

use std::time::Duration;

use reqwest::{Client as HttpClient, Response};

use crate::{config::FalConfig, errors::Result};

#[derive(Clone, Debug)]
pub struct FalClient {
    http: HttpClient,
    model: String,
    queue_base_url: String,
    storage_base_url: String,
    poll_interval: Duration,
}

impl FalClient {
    pub fn from_config(config: &FalConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent("PortraitStudio/0.1")
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            model: config.model.clone(),
            queue_base_url: config.queue_base_url.clone(),
            storage_base_url: config.storage_base_url.clone(),
            poll_interval: config.poll_interval,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Turns a non-2xx response into an error message carrying the body.
async fn ensure_success(response: Response, action: &str) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(format!("{action} 返回状态码 {status}: {}", body.trim()))
}

fn request_failed(action: &str, err: reqwest::Error) -> String {
    format!("{action} 请求失败: {err}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use axum::Router;

    use crate::config::{DEFAULT_FAL_MODEL, FalConfig};

    /// Serves `router` on an ephemeral local port and returns its base URL.
    pub async fn spawn_mock(router: impl FnOnce(String) -> Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let app = router(base.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });
        base
    }

    pub fn config_for(base: &str) -> FalConfig {
        FalConfig {
            api_key: None,
            model: DEFAULT_FAL_MODEL.to_string(),
            queue_base_url: base.to_string(),
            storage_base_url: base.to_string(),
            poll_interval: Duration::from_millis(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}
