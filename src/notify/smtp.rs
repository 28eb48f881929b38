//! Email delivery with feature-gated implementation.
//!
//! When the `smtp` feature is enabled, digests are sent as HTML email over
//! SMTP with STARTTLS and login via `lettre`. When disabled, the notifier
//! still exists (so configuration and dispatch code need no `#[cfg]`), but
//! every send fails with a [`NotifyError::Config`] explaining how to enable
//! it. Like any notifier failure, that is logged and the scrape result is
//! unaffected.
//!
//! # Feature Flag
//!
//! Enable with: `cargo build --features smtp`

use super::{Digest, Notifier};
use crate::config::SmtpConfig;
use crate::error::NotifyError;
use std::fmt;

/// SMTP login, read from the CLI/environment rather than the config file.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: SmtpConfig,
    credentials: Option<Credentials>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig, credentials: Option<Credentials>) -> Self {
        Self { config, credentials }
    }
}

#[cfg(feature = "smtp")]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    #[tracing::instrument(level = "info", skip_all, fields(server = %self.config.server, to = %self.config.to))]
    async fn send(&self, digest: &Digest) -> Result<(), NotifyError> {
        use lettre::message::header::ContentType;
        use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        let from = self
            .config
            .from
            .parse()
            .map_err(|e| NotifyError::Config(format!("from address: {e}")))?;
        let to = self
            .config
            .to
            .parse()
            .map_err(|e| NotifyError::Config(format!("to address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(digest.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(digest.html.clone())
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
            .map_err(|e| NotifyError::Config(e.to_string()))?
            .port(self.config.port);
        if let Some(creds) = &self.credentials {
            builder = builder.credentials(SmtpCredentials::new(
                creds.username.clone(),
                creds.password.clone(),
            ));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        tracing::info!("Email sent");
        Ok(())
    }
}

#[cfg(not(feature = "smtp"))]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, _digest: &Digest) -> Result<(), NotifyError> {
        tracing::debug!(
            server = %self.config.server,
            has_credentials = self.credentials.is_some(),
            "SMTP notifier configured without the smtp feature"
        );
        Err(NotifyError::Config(format!(
            "email to {} requires building with `--features smtp`",
            self.config.to
        )))
    }
}
