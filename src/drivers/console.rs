//! Console driver - logs service calls instead of sending them
//!
//! Backs the `monitor` command: the whole pipeline runs, including
//! throttling, but nothing leaves the machine.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::{ApiError, ServiceDriver};

pub struct ConsoleDriver {
    name: String,
    /// Number of calls seen so far
    call_count: AtomicU64,
}

impl ConsoleDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ServiceDriver for ConsoleDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call_service(&self, endpoint: &str, body: &Value) -> Result<(), ApiError> {
        let n = self.call_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!("🎛️  [{}] #{} would call {} {}", self.name, n, endpoint, body);
        Ok(())
    }
}
