use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::probe::snippet;

pub const DEFAULT_FINDINGS_FILE: &str = "subdomain_takeover_vulnerabilities.json";

/// A detected takeover. Serializes to exactly
/// `{subdomain, url, status_code, response_snippet}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub subdomain: String,
    pub url: String,
    pub status_code: u16,
    pub response_snippet: String,
    #[serde(skip)]
    pub discovered_at: DateTime<Local>,
}

impl Finding {
    pub fn new(subdomain: &str, url: &str, status_code: u16, body: &str) -> Self {
        Self {
            subdomain: subdomain.to_string(),
            url: url.to_string(),
            status_code,
            response_snippet: snippet(body),
            discovered_at: Local::now(),
        }
    }

    pub fn to_json_line(&self) -> Result<String, SinkError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[async_trait]
pub trait FindingsSink: Send + Sync {
    async fn record(&self, finding: &Finding) -> Result<(), SinkError>;
}

/// Append-only newline-delimited JSON file.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FindingsSink for JsonLinesSink {
    async fn record(&self, finding: &Finding) -> Result<(), SinkError> {
        let line = finding.to_json_line()?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
