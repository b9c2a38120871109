//! Listing sources and the ingestion filter in front of the store.
//!
//! Sources are schema-free and selector-fragile, so everything they hand
//! back is a `RawListing` that still has to pass `normalize`.

pub mod indeed;
pub mod naukri;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::join_all;
use scraper::{ElementRef, Selector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{job_fingerprint, NewJob};

pub use indeed::IndeedSource;
pub use naukri::NaukriSource;

/// Case-insensitive substrings that mark a posting as fresh enough to keep.
pub const RECENCY_MARKERS: [&str; 3] = ["today", "just posted", "1 day"];

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64)";

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name} returned status {status}")]
    Status { source_name: String, status: u16 },

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// One job card as scraped, before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: String,
    pub url: Option<String>,
    pub posted_text: String,
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<RawListing>, ListingError>;
}

/// Whether the posted-date text carries one of the recency markers.
pub fn is_recent(posted_text: &str) -> bool {
    let posted = posted_text.to_lowercase();
    !posted.is_empty() && RECENCY_MARKERS.iter().any(|marker| posted.contains(marker))
}

/// Turns a raw card into a store-ready job, or `None` when it is stale.
pub fn normalize(raw: &RawListing, today: NaiveDate) -> Option<NewJob> {
    if !is_recent(&raw.posted_text) {
        return None;
    }

    let company = raw.company.clone().unwrap_or_else(|| "Unknown".to_string());
    let job_id = job_fingerprint(
        &company,
        raw.title.as_deref().unwrap_or_default(),
        raw.url.as_deref().unwrap_or_default(),
    );

    Some(NewJob {
        job_id,
        title: raw.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        company,
        location: raw.location.clone(),
        url: raw.url.clone().filter(|u| !u.is_empty()),
        posted_date: today,
    })
}

/// Result of fanning out over every source.
#[derive(Debug, Default)]
pub struct Harvest {
    pub jobs: Vec<NewJob>,
    pub fetched: usize,
    pub discarded: usize,
    pub failed_sources: Vec<String>,
}

/// Fetches all sources concurrently; a failing source is logged and skipped.
pub async fn harvest(sources: &[Arc<dyn ListingSource>], today: NaiveDate) -> Harvest {
    let results = join_all(sources.iter().map(|source| async move {
        (source.name().to_string(), source.fetch().await)
    }))
    .await;

    let mut harvest = Harvest::default();
    for (name, result) in results {
        match result {
            Ok(listings) => {
                info!(source = %name, count = listings.len(), "Fetched listings");
                harvest.fetched += listings.len();
                for raw in &listings {
                    match normalize(raw, today) {
                        Some(job) => harvest.jobs.push(job),
                        None => harvest.discarded += 1,
                    }
                }
            }
            Err(e) => {
                warn!(source = %name, error = %e, "Listing source failed, skipping");
                harvest.failed_sources.push(name);
            }
        }
    }
    harvest
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ListingError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

pub(crate) fn selector(css: &str) -> Result<Selector, ListingError> {
    Selector::parse(css).map_err(|e| ListingError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Trimmed text of the first match under `card`, if non-empty.
pub(crate) fn first_text(card: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

pub(crate) fn first_attr(card: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    card.select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(posted: &str) -> RawListing {
        RawListing {
            title: Some("SWE".to_string()),
            company: Some("Acme".to_string()),
            location: "India".to_string(),
            url: Some("https://x/1".to_string()),
            posted_text: posted.to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_recency_markers_case_insensitive() {
        assert!(is_recent("Today"));
        assert!(is_recent("Just Posted"));
        assert!(is_recent("Posted 1 day ago"));
        assert!(is_recent("EmployerActive TODAY"));
    }

    #[test]
    fn test_stale_or_missing_posted_text_is_rejected() {
        assert!(!is_recent("2 days ago"));
        assert!(!is_recent("30+ days ago"));
        assert!(!is_recent(""));
    }

    #[test]
    fn test_two_days_ago_is_discarded() {
        assert!(normalize(&raw("2 days ago"), today()).is_none());
    }

    #[test]
    fn test_normalize_builds_fingerprint_and_stamps_today() {
        let job = normalize(&raw("today"), today()).unwrap();
        assert_eq!(job.job_id, "Acme|SWE|https://x/1");
        assert_eq!(job.posted_date, today());
        assert_eq!(job.url.as_deref(), Some("https://x/1"));
    }

    #[test]
    fn test_normalize_defaults_missing_fields() {
        let listing = RawListing {
            title: None,
            company: None,
            location: "Pune".to_string(),
            url: None,
            posted_text: "Just posted".to_string(),
        };
        let job = normalize(&listing, today()).unwrap();
        assert_eq!(job.title, "Unknown");
        assert_eq!(job.company, "Unknown");
        assert_eq!(job.job_id, "Unknown||");
        assert!(job.url.is_none());
    }

    struct FixedSource(Vec<RawListing>);

    #[async_trait]
    impl ListingSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self) -> Result<Vec<RawListing>, ListingError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ListingSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self) -> Result<Vec<RawListing>, ListingError> {
            Err(ListingError::Status {
                source_name: "broken".to_string(),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn test_harvest_skips_failed_sources_and_counts_discards() {
        let sources: Vec<Arc<dyn ListingSource>> = vec![
            Arc::new(FixedSource(vec![raw("today"), raw("2 days ago")])),
            Arc::new(BrokenSource),
        ];

        let harvest = harvest(&sources, today()).await;
        assert_eq!(harvest.fetched, 2);
        assert_eq!(harvest.jobs.len(), 1);
        assert_eq!(harvest.discarded, 1);
        assert_eq!(harvest.failed_sources, vec!["broken".to_string()]);
    }
}
