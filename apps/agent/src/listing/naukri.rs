use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use tracing::info;

use super::{build_http_client, first_attr, first_text, selector, ListingError, ListingSource, RawListing};

pub struct NaukriSource {
    client: reqwest::Client,
    role: String,
    location: String,
}

impl NaukriSource {
    pub fn new(role: &str, location: &str, timeout: Duration) -> Result<Self, ListingError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            role: role.to_string(),
            location: location.to_string(),
        })
    }

    pub fn search_url(&self) -> String {
        format!(
            "https://www.naukri.com/{}-jobs-in-{}",
            self.role.replace(' ', "-"),
            self.location.replace(' ', "-")
        )
    }
}

#[async_trait]
impl ListingSource for NaukriSource {
    fn name(&self) -> &str {
        "naukri"
    }

    async fn fetch(&self) -> Result<Vec<RawListing>, ListingError> {
        let url = self.search_url();
        info!("Searching: {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::Status {
                source_name: self.name().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_listings(&body, &self.location)
    }
}

/// Extracts job tuples from a Naukri search results page.
pub fn parse_listings(html: &str, default_location: &str) -> Result<Vec<RawListing>, ListingError> {
    let cards = selector("article.jobTuple, .jobTuple")?;
    let title = selector("a.title")?;
    let company = selector("a.subTitle")?;
    let location = selector(".job-search-location span")?;
    let posted = selector(".type")?;

    let document = Html::parse_document(html);
    let listings = document
        .select(&cards)
        .map(|card| RawListing {
            title: first_text(&card, &title),
            company: first_text(&card, &company),
            location: first_text(&card, &location).unwrap_or_else(|| default_location.to_string()),
            url: first_attr(&card, &title, "href"),
            posted_text: first_text(&card, &posted).unwrap_or_default(),
        })
        .collect();

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <article class="jobTuple">
            <a class="title" href="https://www.naukri.com/job-listings-rust-dev-initech-1">Rust Developer</a>
            <a class="subTitle">Initech</a>
            <div class="job-search-location"><span>Hyderabad</span></div>
            <span class="type">1 Day Ago</span>
          </article>
          <article class="jobTuple">
            <a class="title" href="https://www.naukri.com/job-listings-qa-2">QA Engineer</a>
            <span class="type">Few Hours Ago</span>
          </article>
        </body></html>
    "#;

    #[test]
    fn test_parses_tuples() {
        let listings = parse_listings(RESULTS_PAGE, "India").unwrap();
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.title.as_deref(), Some("Rust Developer"));
        assert_eq!(first.company.as_deref(), Some("Initech"));
        assert_eq!(first.location, "Hyderabad");
        assert_eq!(
            first.url.as_deref(),
            Some("https://www.naukri.com/job-listings-rust-dev-initech-1")
        );
        assert_eq!(first.posted_text, "1 Day Ago");
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let listings = parse_listings(RESULTS_PAGE, "India").unwrap();
        let second = &listings[1];
        assert!(second.company.is_none());
        assert_eq!(second.location, "India");
    }

    #[test]
    fn test_search_url_uses_hyphens() {
        let source = NaukriSource::new("software engineer", "India", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.search_url(),
            "https://www.naukri.com/software-engineer-jobs-in-India"
        );
    }
}
