//! Run digest delivery.
//!
//! After a run, the newly added records are rendered into a [`Digest`] and
//! handed to every configured [`Notifier`]. Delivery never affects the
//! outcome of the scrape: failures are logged and the next notifier is tried.
//!
//! # Notifiers
//!
//! - [`FileNotifier`]: writes `{dir}/{date}_{HHMM}.html`
//! - [`smtp::SmtpNotifier`]: sends an HTML email (requires the `smtp` feature)

pub mod digest;
pub mod smtp;

use crate::config::DigestConfig;
use crate::error::NotifyError;
use crate::models::ArticleRecord;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

pub use digest::Digest;

/// Something that can deliver a digest.
pub trait Notifier {
    fn name(&self) -> &'static str;

    async fn send(&self, digest: &Digest) -> Result<(), NotifyError>;
}

/// Writes each digest as an HTML file.
#[derive(Debug, Clone)]
pub struct FileNotifier {
    dir: PathBuf,
    generated_at: DateTime<Local>,
}

impl FileNotifier {
    pub fn new(dir: impl Into<PathBuf>, generated_at: DateTime<Local>) -> Self {
        Self {
            dir: dir.into(),
            generated_at,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.html", self.generated_at.format("%Y-%m-%d_%H%M")))
    }
}

impl Notifier for FileNotifier {
    fn name(&self) -> &'static str {
        "file"
    }

    #[instrument(level = "info", skip_all, fields(dir = %self.dir.display()))]
    async fn send(&self, digest: &Digest) -> Result<(), NotifyError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path();
        fs::write(&path, &digest.html).await?;
        info!(path = %path.display(), "Wrote digest");
        Ok(())
    }
}

/// The notifiers enabled by configuration.
#[derive(Debug)]
pub enum AnyNotifier {
    File(FileNotifier),
    Smtp(smtp::SmtpNotifier),
}

impl Notifier for AnyNotifier {
    fn name(&self) -> &'static str {
        match self {
            AnyNotifier::File(n) => n.name(),
            AnyNotifier::Smtp(n) => n.name(),
        }
    }

    async fn send(&self, digest: &Digest) -> Result<(), NotifyError> {
        match self {
            AnyNotifier::File(n) => n.send(digest).await,
            AnyNotifier::Smtp(n) => n.send(digest).await,
        }
    }
}

/// Build every notifier the configuration enables.
pub fn from_config(
    config: &DigestConfig,
    credentials: Option<smtp::Credentials>,
    generated_at: DateTime<Local>,
) -> Vec<AnyNotifier> {
    let mut notifiers = Vec::new();
    if let Some(dir) = &config.output_dir {
        notifiers.push(AnyNotifier::File(FileNotifier::new(dir, generated_at)));
    }
    if let Some(smtp_config) = &config.smtp {
        notifiers.push(AnyNotifier::Smtp(smtp::SmtpNotifier::new(
            smtp_config.clone(),
            credentials,
        )));
    }
    notifiers
}

/// Render and deliver the digest for `added`. Returns how many notifiers
/// succeeded. Nothing is sent for an empty run.
#[instrument(level = "info", skip_all, fields(added = added.len(), notifiers = notifiers.len()))]
pub async fn dispatch<N: Notifier>(
    notifiers: &[N],
    added: &[ArticleRecord],
    top_n: usize,
    generated_at: DateTime<Local>,
) -> usize {
    if added.is_empty() {
        info!("No new articles; nothing to send");
        return 0;
    }
    if notifiers.is_empty() {
        return 0;
    }

    let digest = digest::render(added, top_n, generated_at);
    let mut delivered = 0;
    for notifier in notifiers {
        match notifier.send(&digest).await {
            Ok(()) => {
                delivered += 1;
                info!(notifier = notifier.name(), shown = digest.shown, omitted = digest.omitted, "Digest sent");
            }
            Err(e) => error!(notifier = notifier.name(), error = %e, "Failed to send digest"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleDetails, ListingEntry};
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        fail: bool,
        sent: Mutex<Vec<Digest>>,
    }

    impl Notifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, digest: &Digest) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Send("smtp down".to_string()));
            }
            self.sent.lock().unwrap().push(digest.clone());
            Ok(())
        }
    }

    fn record(slug: &str) -> ArticleRecord {
        ArticleRecord::from_parts(
            ListingEntry {
                category: "Cat".to_string(),
                title: format!("Title {slug}"),
                summary: "S".to_string(),
                article_url: format!("https://example.org/{slug}"),
                image_url: None,
            },
            ArticleDetails::default(),
        )
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 7, 5, 0).unwrap()
    }

    #[tokio::test]
    async fn test_empty_run_sends_nothing() {
        let notifiers = vec![Recording::default()];
        assert_eq!(dispatch(&notifiers, &[], 5, now()).await, 0);
        assert!(notifiers[0].sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_notifiers() {
        let notifiers = vec![
            Recording { fail: true, ..Default::default() },
            Recording::default(),
        ];
        let delivered = dispatch(&notifiers, &[record("a"), record("b")], 5, now()).await;
        assert_eq!(delivered, 1);
        assert_eq!(notifiers[1].sent.lock().unwrap()[0].shown, 2);
    }

    #[tokio::test]
    async fn test_file_notifier_writes_html() {
        let tmp = tempfile::tempdir().unwrap();
        let notifier = FileNotifier::new(tmp.path().join("digests"), now());
        let delivered = dispatch(&[notifier.clone()], &[record("a")], 5, now()).await;
        assert_eq!(delivered, 1);
        let written = std::fs::read_to_string(notifier.path()).unwrap();
        assert!(written.contains("Title a"));
        assert!(notifier.path().ends_with("2024-06-01_0705.html"));
    }

    #[test]
    fn test_from_config_enables_configured_notifiers() {
        let mut config = DigestConfig::default();
        assert!(from_config(&config, None, now()).is_empty());
        config.output_dir = Some("./digests".to_string());
        let notifiers = from_config(&config, None, now());
        assert_eq!(notifiers.len(), 1);
        assert_eq!(notifiers[0].name(), "file");
    }
}
