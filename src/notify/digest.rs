//! Digest rendering.
//!
//! The digest lists the most recent new articles (by publication date, newest
//! first, undated last) and notes how many more were added but left out.

use crate::models::ArticleRecord;
use crate::utils::escape_html;
use chrono::{DateTime, Local};
use itertools::Itertools;
use std::cmp::Reverse;

pub const SUBJECT: &str = "IESE Insight: new articles";

/// A rendered digest ready to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub html: String,
    /// Articles shown in the body.
    pub shown: usize,
    /// Articles added but left out of the body.
    pub omitted: usize,
}

/// Up to `top_n` records, most recent publication date first.
///
/// Ties keep commit order; records without a date sort last.
pub fn top_records(records: &[ArticleRecord], top_n: usize) -> Vec<&ArticleRecord> {
    records
        .iter()
        .sorted_by_key(|r| Reverse(r.publication_date))
        .take(top_n)
        .collect()
}

/// Render the HTML digest for a run's new records.
pub fn render(records: &[ArticleRecord], top_n: usize, generated_at: DateTime<Local>) -> Digest {
    let top = top_records(records, top_n);
    let omitted = records.len() - top.len();

    let mut html = String::new();
    html.push_str("<h2>IESE Insight: latest new articles</h2><hr>\n");

    for article in &top {
        let author = article.author.as_deref().unwrap_or("N/A");
        let published = article
            .publication_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        html.push_str(&format!(
            "<div style=\"margin-bottom:20px;\">\n\
             <h3><a href=\"{url}\">{title}</a></h3>\n\
             <p><strong>Category:</strong> {category} | <strong>By:</strong> {author} | <strong>Published:</strong> {published}</p>\n",
            url = escape_html(&article.article_url),
            title = escape_html(&article.title),
            category = escape_html(&article.category),
            author = escape_html(author),
            published = published,
        ));
        if let Some(image) = &article.image_url {
            html.push_str(&format!(
                "<img src=\"{}\" style=\"max-width:300px;\"><br>\n",
                escape_html(image)
            ));
        }
        html.push_str(&format!("<p>{}</p>\n</div>\n<hr>\n", escape_html(&article.summary)));
    }

    if omitted > 0 {
        html.push_str(&format!(
            "<p><em>+ {omitted} more new article(s) available in the store.</em></p>\n"
        ));
    }

    html.push_str(&format!(
        "<p style=\"font-size:small;color:gray;\">Generated by {} on {}.</p>\n",
        env!("CARGO_PKG_NAME"),
        generated_at.format("%Y-%m-%d %H:%M")
    ));

    Digest {
        subject: SUBJECT.to_string(),
        html,
        shown: top.len(),
        omitted,
    }
}
