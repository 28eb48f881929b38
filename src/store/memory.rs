//! In-memory store for tests: records every append call and can be told to
//! fail a given call.

use super::{Repository, RowStore};
use crate::error::StoreError;
use crate::models::{
    ArticleRecord, StoredRow, FIELD_ARTICLE_URL, FIELD_CROPPED_IMAGE_URL, FIELD_IMAGE_URL,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Rows as field maps, in insertion order.
    pub rows: Vec<BTreeMap<String, String>>,
    pub fields: BTreeSet<String>,
    /// Sizes of successful append calls, in order.
    pub flushes: Vec<usize>,
    /// 1-based append call numbers that should fail.
    pub fail_appends: BTreeSet<usize>,
    append_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls(urls: &[&str]) -> Self {
        let mut store = Self::new();
        for url in urls {
            let mut row = BTreeMap::new();
            row.insert(FIELD_ARTICLE_URL.to_string(), url.to_string());
            store.rows.push(row);
        }
        store
    }

    pub fn with_row(mut self, fields: &[(&str, &str)]) -> Self {
        self.rows.push(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.get(FIELD_ARTICLE_URL).cloned())
            .collect()
    }
}

fn record_fields(record: &ArticleRecord) -> BTreeMap<String, String> {
    let serde_json::Value::Object(map) = serde_json::to_value(record).unwrap_or_default() else {
        return BTreeMap::new();
    };
    map.into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect()
}

impl Repository for MemoryStore {
    async fn existing_urls(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.urls())
    }

    async fn ensure_field(&mut self, name: &str) -> Result<(), StoreError> {
        self.fields.insert(name.to_string());
        Ok(())
    }

    async fn append(&mut self, records: &[ArticleRecord]) -> Result<(), StoreError> {
        self.append_calls += 1;
        if self.fail_appends.contains(&self.append_calls) {
            return Err(StoreError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.rows.extend(records.iter().map(record_fields));
        self.flushes.push(records.len());
        Ok(())
    }
}

impl RowStore for MemoryStore {
    async fn rows(&self) -> Result<Vec<StoredRow>, StoreError> {
        Ok(self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| StoredRow {
                id: i.to_string(),
                image_url: r.get(FIELD_IMAGE_URL).cloned(),
                cropped_image_url: r.get(FIELD_CROPPED_IMAGE_URL).cloned(),
            })
            .collect())
    }

    async fn write_field(&mut self, row_id: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let row = row_id
            .parse::<usize>()
            .ok()
            .and_then(|i| self.rows.get_mut(i))
            .ok_or_else(|| StoreError::UnknownRow(row_id.to_string()))?;
        row.insert(field.to_string(), value.to_string());
        Ok(())
    }
}
