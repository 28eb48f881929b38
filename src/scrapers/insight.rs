//! IESE Insight article listing scraper.
//!
//! Listing pages are served at `/search/articles/`, `/search/articles/2/`, ...
//! and contain one `div.box-icon` block per article:
//!
//! ```html
//! <div class="box-icon">
//!   <a class="img-container" href="/insight/articles/slug/">
//!     <img src="placeholder.gif" data-src="https://.../photo.jpg">
//!   </a>
//!   <a class="subtitle-link" href="/insight/strategy/">Strategy</a>
//!   <a class="title-link" href="/insight/articles/slug/"><h3 class="title-icon">Title</h3></a>
//!   <p class="subtitle-icon">Summary</p>
//! </div>
//! ```
//!
//! Article pages carry a JSON-LD graph with the publication date and a
//! `div.author-name` with the byline.

use super::jsonld::article_publication_date;
use crate::error::ExtractError;
use crate::fetch::Fetcher;
use crate::identity::{normalize, resolve};
use crate::models::{ArticleDetails, ListingEntry};
use crate::utils::clean_text;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static ENTRY: Lazy<Selector> = Lazy::new(|| selector("div.box-icon"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("h3.title-icon"));
static SUMMARY: Lazy<Selector> = Lazy::new(|| selector("p.subtitle-icon"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| selector("a.subtitle-link"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a.title-link"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("a.img-container img"));
static AUTHOR: Lazy<Selector> = Lazy::new(|| selector("div.author-name"));

/// Non-empty, whitespace-collapsed text of the first match.
fn first_text(fragment: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    fragment
        .select(sel)
        .next()
        .map(|el| clean_text(el.text()))
        .filter(|t| !t.is_empty())
}

/// Image reference of an entry, lazy-load attribute first.
///
/// The `img` element itself is required; an element with neither attribute
/// set yields `Ok(None)`.
fn image_reference(fragment: &ElementRef<'_>) -> Result<Option<String>, ExtractError> {
    let img = fragment
        .select(&IMAGE)
        .next()
        .ok_or(ExtractError::MissingField("image"))?;
    Ok(["data-src", "src"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string))
}

/// Read one entry block into a [`ListingEntry`].
///
/// Title, summary, category, article link and the image element are
/// required; the entry is rejected as a whole if any is missing.
pub fn extract_listing_entry(
    fragment: &ElementRef<'_>,
    origin: &Url,
) -> Result<ListingEntry, ExtractError> {
    let title = first_text(fragment, &TITLE).ok_or(ExtractError::MissingField("title"))?;
    let summary = first_text(fragment, &SUMMARY).ok_or(ExtractError::MissingField("summary"))?;
    let category =
        first_text(fragment, &CATEGORY).ok_or(ExtractError::MissingField("category"))?;
    let href = fragment
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(ExtractError::MissingField("article link"))?;

    let image_url = image_reference(fragment)?.map(|src| resolve(origin, &src).unwrap_or(src));
    let article_url = normalize(&resolve(origin, href)?)?;

    Ok(ListingEntry {
        category,
        title,
        summary,
        article_url,
        image_url,
    })
}

/// Split a listing page into per-entry extraction results, in page order.
///
/// An empty vector means the page has no entry blocks (end of listing).
pub fn parse_listing(html: &str, origin: &Url) -> Vec<Result<ListingEntry, ExtractError>> {
    let document = Html::parse_document(html);
    document
        .select(&ENTRY)
        .map(|fragment| extract_listing_entry(&fragment, origin))
        .collect()
}

/// Read publication date and author from an article page.
pub fn parse_article_details(html: &str) -> ArticleDetails {
    let document = Html::parse_document(html);
    let author = document
        .select(&AUTHOR)
        .next()
        .map(|el| clean_text(el.text()))
        .filter(|a| !a.is_empty());

    ArticleDetails {
        publication_date: article_publication_date(&document),
        author,
    }
}

/// Fetch an article page and read its enrichment fields.
///
/// Never fails: a fetch error is logged and yields empty details.
#[instrument(level = "debug", skip(fetcher))]
pub async fn fetch_article_details<F: Fetcher>(fetcher: &F, url: &str) -> ArticleDetails {
    match fetcher.fetch_text(url).await {
        Ok(html) => {
            let details = parse_article_details(&html);
            debug!(
                date = ?details.publication_date,
                author = ?details.author,
                "Parsed article details"
            );
            details
        }
        Err(e) => {
            warn!(%url, error = %e, "Article details unavailable; continuing without them");
            ArticleDetails::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeFetcher;
    use chrono::NaiveDate;

    fn origin() -> Url {
        Url::parse("https://www.iese.edu").unwrap()
    }

    fn entry_html(title: &str, summary: &str, href: &str) -> String {
        format!(
            r#"<div class="box-icon">
                 <a class="img-container" href="{href}"><img src="/img/placeholder.gif" data-src="https://cdn.iese.edu/photo.jpg"></a>
                 <a class="subtitle-link" href="/insight/strategy/">Strategy</a>
                 <a class="title-link" href="{href}"><h3 class="title-icon">{title}</h3></a>
                 <p class="subtitle-icon">{summary}</p>
               </div>"#
        )
    }

    fn listing(entries: &[String]) -> String {
        format!("<html><body><main>{}</main></body></html>", entries.join("\n"))
    }

    #[test]
    fn test_complete_entry() {
        let html = listing(&[entry_html(
            "Lead  with\n purpose",
            "Why it matters",
            "/insight/articles/lead/?utm=x",
        )]);
        let entries = parse_listing(&html, &origin());
        assert_eq!(entries.len(), 1);
        let entry = entries[0].as_ref().unwrap();
        assert_eq!(entry.title, "Lead with purpose");
        assert_eq!(entry.summary, "Why it matters");
        assert_eq!(entry.category, "Strategy");
        assert_eq!(entry.article_url, "https://www.iese.edu/insight/articles/lead");
        assert_eq!(entry.image_url.as_deref(), Some("https://cdn.iese.edu/photo.jpg"));
    }

    #[test]
    fn test_missing_title_rejects_only_that_entry() {
        let broken = r#"<div class="box-icon">
              <a class="subtitle-link">Strategy</a>
              <a class="title-link" href="/insight/articles/x/"></a>
              <p class="subtitle-icon">Summary</p>
            </div>"#
            .to_string();
        let html = listing(&[broken, entry_html("Fine", "Also fine", "/insight/articles/y/")]);
        let entries = parse_listing(&html, &origin());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Err(ExtractError::MissingField("title")));
        assert!(entries[1].is_ok());
    }

    #[test]
    fn test_blank_summary_is_missing() {
        let html = listing(&[entry_html("Title", "   ", "/insight/articles/z/")]);
        let entries = parse_listing(&html, &origin());
        assert_eq!(entries[0], Err(ExtractError::MissingField("summary")));
    }

    #[test]
    fn test_image_falls_back_to_src() {
        let with_src = r#"<div class="box-icon">
              <a class="img-container"><img src="/img/a.jpg"></a>
              <a class="subtitle-link">Cat</a>
              <a class="title-link" href="https://www.iese.edu/insight/articles/a/"><h3 class="title-icon">A</h3></a>
              <p class="subtitle-icon">S</p>
            </div>"#
            .to_string();
        let bare_img = r#"<div class="box-icon">
              <a class="img-container"><img alt=""></a>
              <a class="subtitle-link">Cat</a>
              <a class="title-link" href="/insight/articles/c/"><h3 class="title-icon">C</h3></a>
              <p class="subtitle-icon">S</p>
            </div>"#
            .to_string();
        let entries = parse_listing(&listing(&[with_src, bare_img]), &origin());
        assert_eq!(
            entries[0].as_ref().unwrap().image_url.as_deref(),
            Some("https://www.iese.edu/img/a.jpg")
        );
        assert_eq!(entries[1].as_ref().unwrap().image_url, None);
    }

    #[test]
    fn test_missing_image_element_rejects_entry() {
        let without = r#"<div class="box-icon">
              <a class="subtitle-link">Cat</a>
              <a class="title-link" href="/insight/articles/b"><h3 class="title-icon">B</h3></a>
              <p class="subtitle-icon">S</p>
            </div>"#
            .to_string();
        let html = listing(&[without, entry_html("Fine", "S", "/insight/articles/d/")]);
        let entries = parse_listing(&html, &origin());
        assert_eq!(entries[0], Err(ExtractError::MissingField("image")));
        assert!(entries[1].is_ok());
    }

    #[test]
    fn test_empty_page_has_no_entries() {
        let entries = parse_listing("<html><body><p>No results</p></body></html>", &origin());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_details_from_page() {
        let html = r#"<html><head>
            <script type="application/ld+json" class="yoast-schema-graph">
              {"@graph":[{"@type":"Article","datePublished":"2024-01-15T09:30:00+01:00"}]}
            </script></head>
            <body><div class="author-name"> Jane   Doe </div></body></html>"#;
        let details = parse_article_details(html);
        assert_eq!(details.publication_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(details.author.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_details_absent_when_page_lacks_them() {
        let details = parse_article_details("<html><body><p>Body only</p></body></html>");
        assert_eq!(details, ArticleDetails::default());
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_empty_details() {
        let fetcher = FakeFetcher::new().status("https://www.iese.edu/insight/articles/x", 500);
        let details = fetch_article_details(&fetcher, "https://www.iese.edu/insight/articles/x").await;
        assert_eq!(details, ArticleDetails::default());
    }
}
