use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use tracing::info;

use super::{build_http_client, first_attr, first_text, selector, ListingError, ListingSource, RawListing};

const ORIGIN: &str = "https://www.indeed.com";

pub struct IndeedSource {
    client: reqwest::Client,
    role: String,
    location: String,
}

impl IndeedSource {
    pub fn new(role: &str, location: &str, timeout: Duration) -> Result<Self, ListingError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            role: role.to_string(),
            location: location.to_string(),
        })
    }

    pub fn search_url(&self) -> String {
        format!(
            "{ORIGIN}/jobs?q={}&l={}",
            self.role.replace(' ', "+"),
            self.location.replace(' ', "+")
        )
    }
}

#[async_trait]
impl ListingSource for IndeedSource {
    fn name(&self) -> &str {
        "indeed"
    }

    async fn fetch(&self) -> Result<Vec<RawListing>, ListingError> {
        let url = self.search_url();
        info!("Searching: {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() != 200 {
            return Err(ListingError::Status {
                source_name: self.name().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_listings(&body, &self.location)
    }
}

/// Extracts job cards from an Indeed search results page.
pub fn parse_listings(html: &str, default_location: &str) -> Result<Vec<RawListing>, ListingError> {
    let cards = selector("div.jobsearch-SerpJobCard, div.slider_container, a.tapItem")?;
    let title = selector("h2.title, h2.jobTitle")?;
    let legacy_title = selector("a.jobtitle")?;
    let company = selector("span.company, span.companyName")?;
    let location = selector("div.recJobLoc, div.companyLocation, span.location")?;
    let link = selector("a")?;
    let posted = selector("span.date, span.postedDate")?;

    let document = Html::parse_document(html);
    let listings = document
        .select(&cards)
        .map(|card| {
            let href = first_attr(&card, &link, "href");
            RawListing {
                title: first_text(&card, &title).or_else(|| first_text(&card, &legacy_title)),
                company: first_text(&card, &company),
                location: first_text(&card, &location)
                    .unwrap_or_else(|| default_location.to_string()),
                url: href.map(|h| absolutize(&h)),
                posted_text: first_text(&card, &posted).unwrap_or_default(),
            }
        })
        .collect();

    Ok(listings)
}

fn absolutize(href: &str) -> String {
    if href.starts_with('/') {
        format!("{ORIGIN}{href}")
    } else {
        href.to_string()
    }
}
