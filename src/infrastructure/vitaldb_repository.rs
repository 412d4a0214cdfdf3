// VitalDB open API client (catalog tables and signal windows as CSV)
use crate::application::data_source::{CatalogSource, CatalogTable, SignalSource};
use crate::domain::error::{DashboardError, DashboardResult};
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct VitalDbRepository {
    base_url: String,
    client: reqwest::Client,
}

impl VitalDbRepository {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build VitalDB HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn table_url(&self, table: CatalogTable) -> Option<String> {
        match table {
            CatalogTable::Cases => Some(format!("{}/cases", self.base_url)),
            CatalogTable::Tracks(id) => Some(format!("{}/trks?caseid={}", self.base_url, id)),
            CatalogTable::Labs(id) => Some(format!("{}/labs?caseid={}", self.base_url, id)),
            CatalogTable::Hierarchy => None,
        }
    }

    fn signal_url(&self, track_id: &str, start: f64, end: f64) -> String {
        format!(
            "{}/{}?from={}&to={}",
            self.base_url,
            urlencoding::encode(track_id),
            start,
            end
        )
    }

    async fn get_text(&self, url: &str, resource: &str) -> DashboardResult<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "text/csv")
            .send()
            .await
            .map_err(|e| DashboardError::fetch(resource, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(DashboardError::fetch(resource, format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| DashboardError::fetch(resource, e))
    }
}

#[async_trait]
impl CatalogSource for VitalDbRepository {
    fn name(&self) -> &str {
        "vitaldb"
    }

    async fn fetch_table(&self, table: CatalogTable) -> DashboardResult<String> {
        let Some(url) = self.table_url(table) else {
            return Err(DashboardError::fetch(
                table.to_string(),
                "not served by the VitalDB API",
            ));
        };
        self.get_text(&url, &table.to_string()).await
    }
}

#[async_trait]
impl SignalSource for VitalDbRepository {
    async fn fetch_signal(&self, track_id: &str, start: f64, end: f64) -> DashboardResult<String> {
        if track_id.trim().is_empty() {
            return Err(DashboardError::invalid("trackId", "must not be empty"));
        }
        let url = self.signal_url(track_id, start, end);
        self.get_text(&url, track_id).await
    }
}
