//! Data models for scraped articles and their stored representation.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ListingEntry`]: The fields read from one entry block on a listing page
//! - [`ArticleDetails`]: Optional fields read from the article's own page
//! - [`ArticleRecord`]: The complete, canonical unit of work handed to the sink
//! - [`StoredRow`]: A row as read back from the store by the image pipeline
//!
//! Column names are shared by every store backend so that a table populated
//! by one backend reads the same way as another.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const FIELD_ARTICLE_URL: &str = "Article URL";
pub const FIELD_IMAGE_URL: &str = "ImageFile URL";
pub const FIELD_CROPPED_IMAGE_URL: &str = "Cropped Image URL";

/// One entry block from a listing page, already validated.
///
/// `article_url` is canonical; `title` and `summary` are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub category: String,
    pub title: String,
    pub summary: String,
    pub article_url: String,
    pub image_url: Option<String>,
}

/// Enrichment read from an article's detail page. Both fields may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDetails {
    pub publication_date: Option<NaiveDate>,
    pub author: Option<String>,
}

/// A new article, ready to be committed.
///
/// Serializes with the stored column names so it can be written verbatim as
/// a JSON line or an Airtable `fields` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Publication Date", default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,
    #[serde(rename = "Author", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Article URL")]
    pub article_url: String,
    #[serde(rename = "ImageFile URL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ArticleRecord {
    /// Combine a listing entry with its (possibly empty) enrichment.
    pub fn from_parts(entry: ListingEntry, details: ArticleDetails) -> Self {
        Self {
            category: entry.category,
            title: entry.title,
            publication_date: details.publication_date,
            author: details.author,
            summary: entry.summary,
            article_url: entry.article_url,
            image_url: entry.image_url,
        }
    }
}

/// A persisted row as seen by the image pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Backend-specific row identifier (line number, record id, ...).
    pub id: String,
    pub image_url: Option<String>,
    pub cropped_image_url: Option<String>,
}

impl StoredRow {
    /// A row needs cropping when it has a source image and no processed one.
    pub fn needs_crop(&self) -> bool {
        let has_image = self.image_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        let has_cropped = self
            .cropped_image_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        has_image && !has_cropped
    }
}
