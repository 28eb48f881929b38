//! Persisted article store.
//!
//! The pipeline only needs three things from a store, captured by
//! [`Repository`]: read every existing article URL, make sure a field exists,
//! and append records. The image pipeline additionally reads rows and writes
//! single cells ([`RowStore`]).
//!
//! # Backends
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | JSON lines | [`jsonl`] | One record per line in a local file |
//! | Airtable | [`airtable`] | REST API with a static token; 10 records per write |
//! | In-memory | [`memory`] | Tests only |
//!
//! [`AnyStore`] picks a backend from configuration.

pub mod airtable;
pub mod jsonl;
#[cfg(test)]
pub mod memory;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{ArticleRecord, StoredRow};
use std::error::Error;

/// Append-only article repository.
pub trait Repository {
    /// The raw `Article URL` value of every stored record.
    async fn existing_urls(&self) -> Result<Vec<String>, StoreError>;

    /// Make sure a field (column) named `name` exists.
    async fn ensure_field(&mut self, name: &str) -> Result<(), StoreError>;

    /// Append `records` in order. Either every record is written or an error
    /// is returned.
    async fn append(&mut self, records: &[ArticleRecord]) -> Result<(), StoreError>;
}

/// Row-level access used by the image pipeline.
pub trait RowStore: Repository {
    /// Every stored row with its image fields.
    async fn rows(&self) -> Result<Vec<StoredRow>, StoreError>;

    /// Overwrite one field of one row.
    async fn write_field(&mut self, row_id: &str, field: &str, value: &str) -> Result<(), StoreError>;
}

/// A store backend chosen at runtime.
#[derive(Debug)]
pub enum AnyStore {
    Jsonl(jsonl::JsonlStore),
    Airtable(airtable::AirtableStore),
}

impl AnyStore {
    /// Build the configured backend. `airtable_token` is required for Airtable.
    pub fn from_config(
        config: &StoreConfig,
        client: reqwest::Client,
        airtable_token: Option<&str>,
    ) -> Result<Self, Box<dyn Error>> {
        match config {
            StoreConfig::Jsonl { path } => Ok(AnyStore::Jsonl(jsonl::JsonlStore::new(path.clone()))),
            StoreConfig::Airtable { base_id, table } => {
                let token = airtable_token
                    .filter(|t| !t.trim().is_empty())
                    .ok_or("Airtable store needs an API key (--airtable-api-key or AIRTABLE_API_KEY)")?;
                Ok(AnyStore::Airtable(airtable::AirtableStore::new(
                    client,
                    token.to_string(),
                    base_id.clone(),
                    table.clone(),
                )))
            }
        }
    }
}

impl Repository for AnyStore {
    async fn existing_urls(&self) -> Result<Vec<String>, StoreError> {
        match self {
            AnyStore::Jsonl(s) => s.existing_urls().await,
            AnyStore::Airtable(s) => s.existing_urls().await,
        }
    }

    async fn ensure_field(&mut self, name: &str) -> Result<(), StoreError> {
        match self {
            AnyStore::Jsonl(s) => s.ensure_field(name).await,
            AnyStore::Airtable(s) => s.ensure_field(name).await,
        }
    }

    async fn append(&mut self, records: &[ArticleRecord]) -> Result<(), StoreError> {
        match self {
            AnyStore::Jsonl(s) => s.append(records).await,
            AnyStore::Airtable(s) => s.append(records).await,
        }
    }
}

impl RowStore for AnyStore {
    async fn rows(&self) -> Result<Vec<StoredRow>, StoreError> {
        match self {
            AnyStore::Jsonl(s) => s.rows().await,
            AnyStore::Airtable(s) => s.rows().await,
        }
    }

    async fn write_field(&mut self, row_id: &str, field: &str, value: &str) -> Result<(), StoreError> {
        match self {
            AnyStore::Jsonl(s) => s.write_field(row_id, field, value).await,
            AnyStore::Airtable(s) => s.write_field(row_id, field, value).await,
        }
    }
}
