#![cfg(feature = "web")]

use crate::aggregate::ConcernMatch;
use crate::error::DashboardError;
use crate::qr::DEFAULT_FORM_URL;
use crate::source::{DEFAULT_CSV_URL, FileSource, HttpSource, SurveySource};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Startup settings for the dashboard server
#[derive(Parser, Debug, Clone)]
#[command(name = "cosme-insight")]
#[command(about = "Survey dashboard for cosmetic product ratings", long_about = None)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "COSME_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Published CSV export of the responses sheet
    #[arg(long, env = "COSME_CSV_URL", default_value = DEFAULT_CSV_URL)]
    pub csv_url: String,

    /// Read responses from a local CSV file instead of the URL
    #[arg(long, env = "COSME_CSV_FILE")]
    pub csv_file: Option<PathBuf>,

    /// Feedback form link the QR codes point at; the product name is appended
    #[arg(long, env = "COSME_FORM_URL", default_value = DEFAULT_FORM_URL)]
    pub form_url: String,

    /// Seconds a loaded sheet is reused before refetching
    #[arg(long = "cache-ttl", env = "COSME_CACHE_TTL", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Seconds before an HTTP fetch of the sheet is abandoned
    #[arg(long = "fetch-timeout", env = "COSME_FETCH_TIMEOUT", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// How concern labels are matched when comparing by concern
    #[arg(long, value_enum, env = "COSME_CONCERN_MATCH", default_value_t = ConcernMatch::Contains)]
    pub concern_match: ConcernMatch,
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Source selected by the flags; a local file wins over the URL
    pub fn source(&self) -> Result<Box<dyn SurveySource>, DashboardError> {
        match &self.csv_file {
            Some(path) => Ok(Box::new(FileSource::new(path))),
            None => Ok(Box::new(HttpSource::new(
                self.csv_url.clone(),
                Duration::from_secs(self.fetch_timeout_secs),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_sheet() {
        let config = Config::try_parse_from(["cosme-insight"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.csv_url, DEFAULT_CSV_URL);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.concern_match, ConcernMatch::Contains);
        assert!(config.csv_file.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "cosme-insight",
            "--csv-file",
            "responses.csv",
            "--cache-ttl",
            "60",
            "--concern-match",
            "tag",
        ])
        .unwrap();
        assert_eq!(config.csv_file, Some(PathBuf::from("responses.csv")));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.concern_match, ConcernMatch::Tag);
        assert_eq!(config.source().unwrap().describe(), "responses.csv");
    }
}
