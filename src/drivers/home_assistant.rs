//! Home Assistant REST driver
//!
//! Posts service data to `{base_url}/api/services/{endpoint}` with a bearer
//! token read from the environment on every call, so a token exported after
//! start-up is picked up without a restart.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{ApiError, ServiceDriver};
use crate::config::HomeAssistantConfig;

pub struct HomeAssistantDriver {
    http: reqwest::Client,
    base_url: String,
    token_env: String,
}

impl HomeAssistantDriver {
    pub fn new(config: &HomeAssistantConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("m2ha/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_env: config.token_env.clone(),
        })
    }

    /// Full URL of a service endpoint
    pub fn service_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/services/{}",
            self.base_url,
            endpoint.trim_start_matches('/')
        )
    }

    /// Whether the token variable is set to a non-empty value
    pub fn has_token(&self) -> bool {
        self.token().is_ok()
    }

    pub fn token_env(&self) -> &str {
        &self.token_env
    }

    fn token(&self) -> Result<String, ApiError> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::MissingToken {
                var: self.token_env.clone(),
            })
    }
}

#[async_trait]
impl ServiceDriver for HomeAssistantDriver {
    fn name(&self) -> &str {
        "home-assistant"
    }

    async fn call_service(&self, endpoint: &str, body: &Value) -> Result<(), ApiError> {
        let token = self.token()?;
        let url = self.service_url(endpoint);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %url, status = status.as_u16(), "Service call accepted");
        Ok(())
    }
}
