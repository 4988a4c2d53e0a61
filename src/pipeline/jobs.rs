//! Collector job descriptions from queue messages and direct requests.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};

/// URLs to scrape over a window of days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectJob {
    pub urls: Vec<String>,
    /// First day of the window, relative to today
    pub offset_days: i64,
    pub scan_days: u32,
}

#[derive(Debug, Deserialize)]
struct JobMessage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    offset_days: i64,
    #[serde(default)]
    scan_days: Option<u32>,
}

impl JobMessage {
    fn into_job(self, default_scan_days: u32) -> CollectJob {
        let mut urls = self.urls;
        if let Some(url) = self.url {
            urls.insert(0, url);
        }
        urls.retain(|u| !u.trim().is_empty());
        CollectJob {
            urls,
            offset_days: self.offset_days,
            scan_days: self.scan_days.unwrap_or(default_scan_days),
        }
    }
}

/// Jobs carried by a request payload.
///
/// Accepts SQS events (`Records[].body` holding `{urls, offset_days, scan_days}`)
/// and direct `{url}` / `{urls}` invocations. Fails when no URL is given.
pub fn jobs_from_payload(payload: &Value, default_scan_days: u32) -> Result<Vec<CollectJob>> {
    let jobs = match payload.get("Records").and_then(Value::as_array) {
        Some(records) => records
            .iter()
            .map(|record| {
                let body = record
                    .get("body")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AppError::validation("queue record without body"))?;
                let message: JobMessage = serde_json::from_str(body).map_err(|e| {
                    AppError::validation(format!("malformed queue message: {e}"))
                })?;
                Ok(message.into_job(default_scan_days))
            })
            .collect::<Result<Vec<_>>>()?,
        None => {
            let message: JobMessage = serde_json::from_value(payload.clone())
                .map_err(|e| AppError::validation(format!("malformed request: {e}")))?;
            vec![message.into_job(default_scan_days)]
        }
    };

    let jobs: Vec<CollectJob> = jobs.into_iter().filter(|j| !j.urls.is_empty()).collect();
    if jobs.is_empty() {
        return Err(AppError::validation("URL is required"));
    }
    Ok(jobs)
}
