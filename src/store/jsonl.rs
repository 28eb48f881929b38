//! Local JSON-lines store.
//!
//! Each line is one JSON object keyed by the stored column names
//! (see [`crate::models::ArticleRecord`]). Appends go to the end of the file; the
//! rare single-cell update used by the image pipeline rewrites the file
//! through a temporary sibling and a rename.

use super::{Repository, RowStore};
use crate::error::StoreError;
use crate::models::{
    ArticleRecord, StoredRow, FIELD_ARTICLE_URL, FIELD_CROPPED_IMAGE_URL, FIELD_IMAGE_URL,
};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

type Row = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parsed rows paired with their line numbers; a missing file is empty.
    async fn read_rows(&self) -> Result<Vec<(usize, Row)>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            rows.push((line_no, serde_json::from_str::<Row>(line)?));
        }
        Ok(rows)
    }
}

fn text_field(row: &Row, name: &str) -> Option<String> {
    row.get(name).and_then(Value::as_str).map(str::to_string)
}

impl Repository for JsonlStore {
    #[instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    async fn existing_urls(&self) -> Result<Vec<String>, StoreError> {
        let urls: Vec<String> = self
            .read_rows()
            .await?
            .iter()
            .filter_map(|(_, row)| text_field(row, FIELD_ARTICLE_URL))
            .collect();
        info!(count = urls.len(), "Read existing article URLs");
        Ok(urls)
    }

    async fn ensure_field(&mut self, name: &str) -> Result<(), StoreError> {
        // Lines are schemaless objects; a field exists as soon as it is written.
        debug!(field = name, "JSON-lines store needs no schema change");
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = records.len()))]
    async fn append(&mut self, records: &[ArticleRecord]) -> Result<(), StoreError> {
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl RowStore for JsonlStore {
    async fn rows(&self) -> Result<Vec<StoredRow>, StoreError> {
        Ok(self
            .read_rows()
            .await?
            .into_iter()
            .map(|(line_no, row)| StoredRow {
                id: line_no.to_string(),
                image_url: text_field(&row, FIELD_IMAGE_URL),
                cropped_image_url: text_field(&row, FIELD_CROPPED_IMAGE_URL),
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self, value))]
    async fn write_field(&mut self, row_id: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let target: usize = row_id
            .parse()
            .map_err(|_| StoreError::UnknownRow(row_id.to_string()))?;
        let content = fs::read_to_string(&self.path).await?;

        let mut found = false;
        let mut out = String::with_capacity(content.len() + value.len());
        for (line_no, line) in content.lines().enumerate() {
            if line_no == target && !line.trim().is_empty() {
                let mut row: Row = serde_json::from_str(line)?;
                row.insert(field.to_string(), Value::String(value.to_string()));
                out.push_str(&serde_json::to_string(&row)?);
                found = true;
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        if !found {
            return Err(StoreError::UnknownRow(row_id.to_string()));
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, out).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
