use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

use crate::cycle::ApplyMode;

/// Application configuration loaded from environment variables.
/// Every variable has a default except the optional collaborators.
#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub job_role: String,
    pub job_location: String,
    pub resume_path: String,
    pub apply_mode: ApplyMode,
    pub local_llm_endpoint: Option<String>,
    pub imap: Option<ImapSettings>,
    pub webdriver_url: Option<String>,
    pub chromedriver_path: String,
    pub chromedriver_port: u16,
    pub headless: bool,
    pub cycle_interval: Duration,
    pub first_run_delay: Duration,
    pub reply_lookback_days: u32,
    pub http_timeout: Duration,
    pub llm_timeout: Duration,
    pub page_settle: Duration,
    pub port: u16,
    pub rust_log: String,
}

/// Present only when both username and password are set.
#[derive(Debug)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let apply_mode: ApplyMode = or("APPLY_MODE", "manual")
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("APPLY_MODE must be 'auto' or 'manual'")?;

        let headless = match get("HEADLESS") {
            Some(raw) => parse_bool(&raw).context("HEADLESS must be true or false")?,
            None => apply_mode == ApplyMode::Auto,
        };

        let imap = match (
            get("IMAP_USERNAME").or_else(|| get("GMAIL_EMAIL")),
            get("IMAP_PASSWORD").or_else(|| get("GMAIL_PASSWORD")),
        ) {
            (Some(username), Some(password)) => Some(ImapSettings {
                host: or("IMAP_HOST", "imap.gmail.com"),
                port: parse_or(&get, "IMAP_PORT", 993)?,
                username,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        let cycle_hours = parse_or::<u64>(&get, "CYCLE_INTERVAL_HOURS", 24)?.max(1);
        let cycle_interval = cycle_hours
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow!("CYCLE_INTERVAL_HOURS is too large: {cycle_hours}"))?;

        Ok(Config {
            database_url: or("DATABASE_URL", "sqlite://ai_jobs.db"),
            job_role: or("JOB_ROLE", "software engineer"),
            job_location: or("JOB_LOCATION", "India"),
            resume_path: or("RESUME_PATH", "./resume/my_resume.pdf"),
            apply_mode,
            local_llm_endpoint: get("LOCAL_LLM_ENDPOINT"),
            imap,
            webdriver_url: get("WEBDRIVER_URL"),
            chromedriver_path: or("CHROMEDRIVER_PATH", "chromedriver"),
            chromedriver_port: parse_or(&get, "CHROMEDRIVER_PORT", 9515)?,
            headless,
            cycle_interval,
            first_run_delay: Duration::from_secs(parse_or(&get, "FIRST_RUN_DELAY_SECS", 5)?),
            reply_lookback_days: parse_or(&get, "REPLY_LOOKBACK_DAYS", 7)?,
            http_timeout: Duration::from_secs(parse_or(&get, "HTTP_TIMEOUT_SECS", 15)?),
            llm_timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 30)?),
            page_settle: Duration::from_millis(parse_or(&get, "PAGE_SETTLE_MILLIS", 2000)?),
            port: parse_or(&get, "PORT", 5000).context("PORT must be a valid port number")?,
            rust_log: or("RUST_LOG", "info"),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("invalid boolean '{other}'")),
    }
}
