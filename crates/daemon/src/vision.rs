use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::info;

use crate::config::VisionConfig;

/// Produces a prose description of what a video shows.
#[async_trait::async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn describe(&self, media_path: &Path) -> Result<String>;
}

/// Calls the ML service's frame-sampling vision endpoint.
pub struct MlServiceVision {
    http: reqwest::Client,
    service_url: String,
}

impl MlServiceVision {
    pub fn new(config: &VisionConfig) -> Self {
        MlServiceVision {
            http: reqwest::Client::new(),
            service_url: config.service_url.clone(),
        }
    }
}

#[async_trait::async_trait]
impl VisionAnalyzer for MlServiceVision {
    async fn describe(&self, media_path: &Path) -> Result<String> {
        info!("[Vision] Describing {}", media_path.display());
        let response = self
            .http
            .post(format!("{}/vision/describe", self.service_url))
            .json(&serde_json::json!({
                "mediaPath": media_path.to_string_lossy(),
            }))
            .send()
            .await
            .context("Failed to reach the ML service")?;

        if !response.status().is_success() {
            return Err(anyhow!("ML service vision describe failed: {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        body.get("description")
            .and_then(|d| d.as_str())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| anyhow!("Invalid response format from ML service"))
    }
}
