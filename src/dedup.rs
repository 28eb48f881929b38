//! Per-run dedup index of canonical article URLs.
//!
//! The index is built fresh at the start of every run from what the store
//! already holds, and is dropped with the run. It is never persisted: the
//! store is the only durable source of "already seen".
//!
//! A URL is admitted (inserted) the moment it is accepted, before the record
//! is flushed, so a second occurrence later in the same run is rejected even
//! while the first is still buffered.

use crate::identity::normalize;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from raw stored URLs, normalizing each one.
    ///
    /// Values that cannot be canonicalized (blank cells, junk) are ignored.
    pub fn seeded<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for raw in urls {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }
            match normalize(raw) {
                Ok(canonical) => {
                    index.seen.insert(canonical);
                }
                Err(e) => debug!(error = %e, "Ignoring stored URL that cannot be canonicalized"),
            }
        }
        index
    }

    /// Whether `canonical_url` is already known.
    pub fn contains(&self, canonical_url: &str) -> bool {
        self.seen.contains(canonical_url)
    }

    /// Admit a canonical URL: returns `true` and records it if unseen,
    /// `false` if it is a duplicate.
    pub fn should_admit(&mut self, canonical_url: &str) -> bool {
        if self.contains(canonical_url) {
            return false;
        }
        self.seen.insert(canonical_url.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}
