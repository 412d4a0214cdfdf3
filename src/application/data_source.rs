// Source traits for catalog tables and signal windows, plus the ordered chain
use crate::domain::case::CaseId;
use crate::domain::error::{DashboardError, DashboardResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A catalog table. Track and lab tables may come back unfiltered; callers
/// filter by case id after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogTable {
    Cases,
    Tracks(CaseId),
    Labs(CaseId),
    /// `case_hierarchy.json`
    Hierarchy,
}

impl fmt::Display for CatalogTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogTable::Cases => write!(f, "cases"),
            CatalogTable::Tracks(id) => write!(f, "tracks for case {}", id),
            CatalogTable::Labs(id) => write!(f, "labs for case {}", id),
            CatalogTable::Hierarchy => write!(f, "case hierarchy"),
        }
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Raw text of `table`, or an error if this source does not have it.
    async fn fetch_table(&self, table: CatalogTable) -> DashboardResult<String>;
}

#[async_trait]
pub trait SignalSource: Send + Sync {
    /// `Time,<value>` CSV for a track between `start` and `end` seconds.
    async fn fetch_signal(&self, track_id: &str, start: f64, end: f64) -> DashboardResult<String>;
}

/// Catalog sources tried in order; the first success wins.
#[derive(Clone, Default)]
pub struct SourceChain {
    sources: Vec<Arc<dyn CatalogSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Arc<dyn CatalogSource>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub async fn fetch_table(&self, table: CatalogTable) -> DashboardResult<String> {
        let mut last_error = None;
        for source in &self.sources {
            match source.fetch_table(table).await {
                Ok(text) => {
                    tracing::debug!("Loaded {} from {}", table, source.name());
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!("Source {} failed for {}: {}", source.name(), table, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            DashboardError::fetch(table.to_string(), "no catalog source configured")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        name: &'static str,
        result: DashboardResult<String>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(name: &'static str, result: DashboardResult<String>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CatalogSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_table(&self, _table: CatalogTable) -> DashboardResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_success() {
        let processed = FixedSource::new("processed", Err(DashboardError::fetch("cases", "missing")));
        let raw = FixedSource::new("raw", Ok("caseid\n1\n".to_string()));
        let remote = FixedSource::new("remote", Ok("caseid\n2\n".to_string()));
        let chain = SourceChain::new(vec![processed.clone(), raw.clone(), remote.clone()]);

        let text = chain.fetch_table(CatalogTable::Cases).await.unwrap();
        assert_eq!(text, "caseid\n1\n");
        assert_eq!(processed.calls.load(Ordering::SeqCst), 1);
        assert_eq!(raw.calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_reports_last_error() {
        let a = FixedSource::new("a", Err(DashboardError::fetch("cases", "first")));
        let b = FixedSource::new("b", Err(DashboardError::fetch("cases", "second")));
        let chain = SourceChain::new(vec![a, b]);

        let err = chain.fetch_table(CatalogTable::Cases).await.unwrap_err();
        assert_eq!(err, DashboardError::fetch("cases", "second"));
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let err = SourceChain::default()
            .fetch_table(CatalogTable::Labs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Fetch { .. }));
    }
}
