//! Schema.org JSON-LD helpers.
//!
//! Article pages embed a Yoast-style graph:
//!
//! ```json
//! {"@context": "https://schema.org", "@graph": [
//!   {"@type": "WebPage", ...},
//!   {"@type": "Article", "datePublished": "2024-05-02T08:00:00+00:00", ...}
//! ]}
//! ```

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector"));

static LEADING_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})").expect("valid regex"));

const ARTICLE_TYPES: [&str; 3] = ["Article", "NewsArticle", "BlogPosting"];

/// Whether a JSON-LD node is typed as an article (string or array form).
fn is_article(node: &Value) -> bool {
    let is_article_type = |t: &str| ARTICLE_TYPES.contains(&t);
    match node.get("@type") {
        Some(Value::String(t)) => is_article_type(t.as_str()),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(is_article_type),
        _ => false,
    }
}

/// Candidate entity nodes of one JSON-LD document, in document order.
fn entities(doc: &Value) -> Vec<&Value> {
    match doc {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get("@graph").and_then(Value::as_array) {
            Some(graph) => graph.iter().collect(),
            None => vec![doc],
        },
        _ => Vec::new(),
    }
}

/// Keep only the calendar date of an ISO-8601 timestamp.
pub fn date_component(raw: &str) -> Option<NaiveDate> {
    let caps = LEADING_DATE.captures(raw)?;
    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()
}

/// Publication date of the first `Article` entity that carries one.
///
/// Blocks that fail to parse as JSON are skipped.
pub fn article_publication_date(document: &Html) -> Option<NaiveDate> {
    for script in document.select(&LD_JSON) {
        let text = script.text().collect::<String>();
        let Ok(doc) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };
        for node in entities(&doc) {
            if !is_article(node) {
                continue;
            }
            if let Some(date) = node
                .get("datePublished")
                .and_then(Value::as_str)
                .and_then(date_component)
            {
                return Some(date);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><head><script type="application/ld+json" class="yoast-schema-graph">{json}</script></head><body></body></html>"#
        ))
    }

    #[test]
    fn test_date_component_discards_time_and_zone() {
        assert_eq!(
            date_component("2024-05-02T08:00:00+02:00"),
            NaiveDate::from_ymd_opt(2024, 5, 2)
        );
        assert_eq!(date_component("2024-05-02"), NaiveDate::from_ymd_opt(2024, 5, 2));
        assert_eq!(date_component("May 2, 2024"), None);
        assert_eq!(date_component("2024-13-40"), None);
    }

    #[test]
    fn test_graph_article_date() {
        let doc = page(
            r#"{"@context":"https://schema.org","@graph":[
                {"@type":"WebPage","datePublished":"2020-01-01T00:00:00+00:00"},
                {"@type":"Article","datePublished":"2024-05-02T08:00:00+00:00"}
            ]}"#,
        );
        assert_eq!(article_publication_date(&doc), NaiveDate::from_ymd_opt(2024, 5, 2));
    }

    #[test]
    fn test_article_without_date_is_skipped() {
        let doc = page(
            r#"{"@graph":[
                {"@type":"Article"},
                {"@type":["Article","BlogPosting"],"datePublished":"2023-02-14"}
            ]}"#,
        );
        assert_eq!(article_publication_date(&doc), NaiveDate::from_ymd_opt(2023, 2, 14));
    }

    #[test]
    fn test_root_object_article() {
        let doc = page(r#"{"@type":"Article","datePublished":"2022-07-09T10:00:00Z"}"#);
        assert_eq!(article_publication_date(&doc), NaiveDate::from_ymd_opt(2022, 7, 9));
    }

    #[test]
    fn test_article_subtypes() {
        let news = page(r#"{"@type":"NewsArticle","datePublished":"2021-03-04"}"#);
        assert_eq!(article_publication_date(&news), NaiveDate::from_ymd_opt(2021, 3, 4));
        let post = page(r#"{"@graph":[{"@type":["WebPage"]},{"@type":["BlogPosting"],"datePublished":"2020-12-31T23:00:00Z"}]}"#);
        assert_eq!(article_publication_date(&post), NaiveDate::from_ymd_opt(2020, 12, 31));
    }

    #[test]
    fn test_no_article_or_invalid_json() {
        assert_eq!(article_publication_date(&page(r#"{"@graph":[{"@type":"WebSite"}]}"#)), None);
        assert_eq!(article_publication_date(&page("{not json")), None);
        assert_eq!(
            article_publication_date(&Html::parse_document("<html><body></body></html>")),
            None
        );
    }
}
