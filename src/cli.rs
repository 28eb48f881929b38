//! Command-line interface definitions.
//!
//! Behavior lives in the YAML config file (see [`crate::config`]); the
//! command line picks the action and carries secrets, each of which can also
//! come from an environment variable.

use clap::{Parser, Subcommand};

/// Scrape new IESE Insight articles into a store.
///
/// # Examples
///
/// ```sh
/// # Scrape into ./articles.jsonl with default settings
/// insight_scraper scrape
///
/// # Scrape into Airtable as configured, without sending the digest
/// AIRTABLE_API_KEY=pat... insight_scraper -c config.yaml scrape --no-notify
///
/// # Crop and re-host images of stored rows
/// insight_scraper -c config.yaml crop-images
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Airtable personal access token
    #[arg(long, env = "AIRTABLE_API_KEY", hide_env_values = true, global = true)]
    pub airtable_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk the listing and append new articles to the store
    Scrape {
        /// Skip sending the digest of new articles
        #[arg(long)]
        no_notify: bool,

        /// SMTP login user
        #[arg(long, env = "SMTP_USERNAME")]
        smtp_username: Option<String>,

        /// SMTP login password
        #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
        smtp_password: Option<String>,
    },

    /// Crop stored images to 2:1 and re-host them
    CropImages {
        /// Cloudinary cloud name
        #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
        cloud_name: String,

        /// Cloudinary unsigned upload preset
        #[arg(long, env = "CLOUDINARY_UPLOAD_PRESET")]
        upload_preset: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_defaults() {
        let cli = Cli::parse_from(["insight_scraper", "scrape"]);
        assert_eq!(cli.config, None);
        match cli.command {
            Command::Scrape { no_notify, .. } => assert!(!no_notify),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::parse_from(["insight_scraper", "scrape", "--no-notify", "-c", "/tmp/config.yaml"]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/config.yaml"));
        assert!(matches!(cli.command, Command::Scrape { no_notify: true, .. }));
    }

    #[test]
    fn test_crop_images_flags() {
        let cli = Cli::parse_from([
            "insight_scraper",
            "crop-images",
            "--cloud-name",
            "demo",
            "--upload-preset",
            "unsigned",
        ]);
        match cli.command {
            Command::CropImages { cloud_name, upload_preset } => {
                assert_eq!(cloud_name, "demo");
                assert_eq!(upload_preset, "unsigned");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
