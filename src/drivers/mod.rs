//! Outbound service drivers
//!
//! A driver executes one service call. The dispatcher owns no transport
//! details: it hands a command to whatever driver it was built with.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod console;
pub mod home_assistant;

pub use console::ConsoleDriver;
pub use home_assistant::HomeAssistantDriver;

/// Failure of a single service call
#[derive(Debug, Error)]
pub enum ApiError {
    /// The access token environment variable is unset or empty
    #[error("{var} environment variable not set")]
    MissingToken { var: String },

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    /// Connection, timeout, or body encoding failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Driver trait - every outbound integration implements this
///
/// Methods take `&self` so drivers can be shared behind `Arc<dyn ServiceDriver>`.
#[async_trait]
pub trait ServiceDriver: Send + Sync {
    /// Driver name for logs (e.g. "home-assistant", "console")
    fn name(&self) -> &str;

    /// Call a service
    ///
    /// # Arguments
    /// * `endpoint` - Service path relative to the API root (e.g. "light/turn_on")
    /// * `body` - JSON service data
    async fn call_service(&self, endpoint: &str, body: &Value) -> Result<(), ApiError>;
}
