//! Catalog sources
//!
//! The catalog is the list of `{title, region}` rows the pipeline starts from. It is scraped
//! once from the catalog page and persisted as a table; later runs read the table.

use async_trait::async_trait;
use ldc_common::BlobStore;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::CatalogEntry;
use crate::tables;

const USER_AGENT: &str = concat!("ldc-ingest/", env!("CARGO_PKG_VERSION"));

/// Header texts identifying the title and region columns
const TITLE_HEADER: &str = "nama lagu";
const REGION_HEADER: &str = "asal daerah";

/// Catalog source errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Catalog page returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Catalog page has no table")]
    NoTable,

    #[error("Catalog table unreadable: {0}")]
    TableError(String),
}

/// Source of catalog entries
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Load all catalog entries in catalog order
    async fn load(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

/// Catalog read back from the persisted `data/catalog.csv`
pub struct TableCatalogSource {
    store: Arc<dyn BlobStore>,
}

impl TableCatalogSource {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CatalogSource for TableCatalogSource {
    async fn load(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        tables::read_catalog(self.store.as_ref())
            .await
            .map_err(|e| CatalogError::TableError(e.to_string()))
    }
}

/// Scrapes the first HTML table of the catalog page
pub struct HtmlCatalogSource {
    http_client: reqwest::Client,
    url: String,
}

impl HtmlCatalogSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CatalogSource for HtmlCatalogSource {
    async fn load(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        tracing::info!(url = %self.url, "Fetching catalog page");

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let entries = parse_catalog_html(&html)?;
        tracing::info!(entries = entries.len(), "Catalog page parsed");
        Ok(entries)
    }
}

/// Extract catalog entries from the first `<table>` of a page
///
/// Columns are located by header text ("Nama Lagu" / "Asal Daerah"); without a recognizable
/// header the last two cells of each row are taken as title and region. Cell text is trimmed
/// and inner spaces become `_`, matching the persisted catalog format.
pub fn parse_catalog_html(html: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or(CatalogError::NoTable)?;

    let rows: Vec<Vec<String>> = table
        .select(&row_selector)
        .map(|row| row.select(&cell_selector).map(cell_text).collect())
        .collect();

    let header = rows.iter().enumerate().find_map(|(index, cells)| {
        let title = column_index(cells, TITLE_HEADER)?;
        let region = column_index(cells, REGION_HEADER)?;
        Some((index, title, region))
    });

    let entries = match header {
        Some((header_row, title_col, region_col)) => rows
            .iter()
            .skip(header_row + 1)
            .filter_map(|cells| entry_from(cells.get(title_col)?, cells.get(region_col)?))
            .collect(),
        None => rows
            .iter()
            .filter(|cells| cells.len() >= 2)
            .filter_map(|cells| entry_from(&cells[cells.len() - 2], &cells[cells.len() - 1]))
            .collect(),
    };

    Ok(entries)
}

fn selector(css: &str) -> Result<Selector, CatalogError> {
    Selector::parse(css).map_err(|e| CatalogError::TableError(format!("selector '{}': {:?}", css, e)))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn column_index(cells: &[String], header: &str) -> Option<usize> {
    cells
        .iter()
        .position(|cell| cell.replace('_', " ").to_lowercase() == header)
}

fn entry_from(title: &str, region: &str) -> Option<CatalogEntry> {
    if title.is_empty() || region.is_empty() {
        return None;
    }
    Some(CatalogEntry::new(title, region))
}
