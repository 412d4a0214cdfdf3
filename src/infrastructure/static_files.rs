// Catalog tables served from a local data directory
use crate::application::data_source::{CatalogSource, CatalogTable};
use crate::domain::error::{DashboardError, DashboardResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File naming of a data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLayout {
    /// Output of the preprocessing step, with operation types and a hierarchy
    Processed,
    /// Tables as downloaded from VitalDB
    Raw,
}

impl FileLayout {
    fn file_name(self, table: CatalogTable) -> Option<&'static str> {
        match (self, table) {
            (FileLayout::Processed, CatalogTable::Cases) => Some("cases_processed.txt"),
            (FileLayout::Processed, CatalogTable::Tracks(_)) => Some("tracks_processed.txt"),
            (FileLayout::Processed, CatalogTable::Labs(_)) => Some("labs_processed.txt"),
            (FileLayout::Processed, CatalogTable::Hierarchy) => Some("case_hierarchy.json"),
            (FileLayout::Raw, CatalogTable::Cases) => Some("cases.txt"),
            (FileLayout::Raw, CatalogTable::Tracks(_)) => Some("trks.txt"),
            (FileLayout::Raw, CatalogTable::Labs(_)) => Some("labs.txt"),
            (FileLayout::Raw, CatalogTable::Hierarchy) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticFileSource {
    name: String,
    dir: PathBuf,
    layout: FileLayout,
}

impl StaticFileSource {
    pub fn new(dir: impl Into<PathBuf>, layout: FileLayout) -> Self {
        let dir = dir.into();
        let name = match layout {
            FileLayout::Processed => format!("processed:{}", dir.display()),
            FileLayout::Raw => format!("raw:{}", dir.display()),
        };
        Self { name, dir, layout }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl CatalogSource for StaticFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_table(&self, table: CatalogTable) -> DashboardResult<String> {
        let Some(file_name) = self.layout.file_name(table) else {
            return Err(DashboardError::fetch(
                table.to_string(),
                format!("{} has no such table", self.name),
            ));
        };
        let path = self.dir.join(file_name);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DashboardError::fetch(path.display().to_string(), e))?;
        if text.trim().is_empty() {
            return Err(DashboardError::parse(path.display().to_string(), "file is empty"));
        }
        tracing::debug!("Read {} bytes from {}", text.len(), path.display());
        Ok(text)
    }
}
