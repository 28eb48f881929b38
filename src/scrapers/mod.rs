//! Field extraction from the source site's markup.
//!
//! Scraping follows the same two-phase pattern as the pipeline:
//!
//! 1. **Listing**: split a listing page into entry blocks and read the
//!    required fields from each ([`insight::parse_listing`])
//! 2. **Details**: read optional enrichment from the article's own page
//!    ([`insight::parse_article_details`], [`insight::fetch_article_details`])
//!
//! Parsing functions are pure (markup in, typed values out) so they can be
//! tested without a network. Only [`insight::fetch_article_details`] performs
//! I/O, and it never fails: enrichment problems degrade to absent fields.

pub mod insight;
pub mod jsonld;
