//! Metrics sink client.
//!
//! The monitoring endpoint accepts one GET per sample with the sample packed
//! into query parameters. Reporting is best-effort: failures are logged and
//! never reach the monitor's state.

use chrono::{DateTime, Utc};

pub struct MetricsClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetricsClient {
    /// Returns `None` when no monitoring URL is configured.
    pub fn from_url(base_url: &str) -> Option<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return None;
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Some(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    /// Emit one per-folder count sample.
    pub async fn report_count(&self, name: &str, dt: DateTime<Utc>, count: u64) {
        let url = format!("{}/dataservice/api/data", self.base_url);
        let values = format!("{},{},{}", name, dt.format("%Y-%m-%d %H:%M:%S"), count);
        let result = self
            .http
            .get(&url)
            .query(&[
                ("parameters", "name,dt,count"),
                ("values", values.as_str()),
                ("name", "simple_count_post"),
            ])
            .send()
            .await;

        match result {
            Ok(response) => {
                if !response.status().is_success() {
                    tracing::warn!(
                        folder = %name,
                        status = %response.status(),
                        "metric report rejected"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(folder = %name, error = %e, "error updating statistics");
            }
        }
    }
}
