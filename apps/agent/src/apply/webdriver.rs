//! Browser-driven apply flow over the W3C WebDriver wire protocol.
//!
//! One attempt owns one driver (spawned chromedriver or a remote endpoint)
//! and one browser session. Both are released before `attempt` returns,
//! whatever the outcome; a spawned driver is also killed on drop.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{ApplyExecutor, ApplyOutcome, ApplyResult};
use crate::models::JobRow;

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a5a4a9e3db4";

const FILE_INPUT_XPATH: &str = "//input[@type='file']";

/// Tried in order; the first control found is clicked.
const SUBMIT_XPATHS: [&str; 2] = [
    "//button[contains(translate(., 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz'), 'apply')]",
    "//input[@type='submit']",
];

const DRIVER_READY_ATTEMPTS: u32 = 50;
const DRIVER_READY_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webdriver error '{error}' (status {status}): {message}")]
    Protocol {
        status: u16,
        error: String,
        message: String,
    },

    #[error("webdriver response missing {0}")]
    MissingField(&'static str),

    #[error("driver process: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebDriverError {
    fn is_no_such_element(&self) -> bool {
        matches!(self, WebDriverError::Protocol { error, .. } if error == "no such element")
    }
}

#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Use an already-running WebDriver endpoint instead of spawning one.
    pub remote_url: Option<String>,
    pub chromedriver_path: String,
    pub chromedriver_port: u16,
    pub headless: bool,
    pub resume_path: PathBuf,
    /// Pause after navigation and after clicking, for scripts to settle.
    pub settle: Duration,
    pub request_timeout: Duration,
}

pub struct WebDriverExecutor {
    client: Client,
    config: WebDriverConfig,
}

impl WebDriverExecutor {
    pub fn new(config: WebDriverConfig) -> Result<Self, WebDriverError> {
        Ok(Self {
            client: Client::builder().timeout(config.request_timeout).build()?,
            config,
        })
    }

    async fn launch_driver(&self) -> Result<Driver, WebDriverError> {
        if let Some(url) = &self.config.remote_url {
            return Ok(Driver {
                base_url: url.trim_end_matches('/').to_string(),
                child: None,
            });
        }

        let child = Command::new(&self.config.chromedriver_path)
            .arg(format!("--port={}", self.config.chromedriver_port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WebDriverError::Driver(format!(
                    "failed to spawn '{}': {e}",
                    self.config.chromedriver_path
                ))
            })?;

        let mut driver = Driver {
            base_url: format!("http://127.0.0.1:{}", self.config.chromedriver_port),
            child: Some(child),
        };

        if let Err(e) = driver.wait_ready(&self.client).await {
            driver.shutdown().await;
            return Err(e);
        }
        Ok(driver)
    }

    /// Runs the upload-and-submit flow inside an established session.
    async fn drive(&self, session: &Session<'_>, url: &str) -> ApplyOutcome {
        if let Err(e) = session.navigate(url).await {
            return ApplyOutcome::new(ApplyResult::AutomationError, e.to_string());
        }
        tokio::time::sleep(self.config.settle).await;

        match self.upload_and_submit(session).await {
            Ok(detail) => ApplyOutcome::new(ApplyResult::Applied, detail),
            Err(e) => ApplyOutcome::new(
                ApplyResult::ManualRequired,
                format!("no file input or error: {e}"),
            ),
        }
    }

    async fn upload_and_submit(&self, session: &Session<'_>) -> Result<&'static str, WebDriverError> {
        let file_input = session.find_xpath(FILE_INPUT_XPATH).await?;
        let resume = resolve_resume_path(&self.config.resume_path)?;
        session
            .send_keys(&file_input, &resume.to_string_lossy())
            .await?;
        tokio::time::sleep(self.config.settle / 2).await;

        let mut clicked = false;
        for xpath in SUBMIT_XPATHS {
            match session.find_xpath(xpath).await {
                Ok(button) => match session.click(&button).await {
                    Ok(()) => {
                        clicked = true;
                        break;
                    }
                    Err(e) => debug!("Submit control {xpath} not clickable: {e}"),
                },
                Err(e) if e.is_no_such_element() => {}
                Err(e) => debug!("Submit lookup {xpath} failed: {e}"),
            }
        }
        tokio::time::sleep(self.config.settle).await;

        Ok(if clicked {
            "file-uploaded-and-clicked"
        } else {
            "file-uploaded-no-submit-control"
        })
    }
}

#[async_trait]
impl ApplyExecutor for WebDriverExecutor {
    async fn attempt(&self, job: &JobRow) -> ApplyOutcome {
        let Some(url) = job.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return ApplyOutcome::no_url();
        };

        info!(job_id = %job.job_id, url, "Attempting automated apply");

        let mut driver = match self.launch_driver().await {
            Ok(driver) => driver,
            Err(e) => {
                warn!(job_id = %job.job_id, "WebDriver unavailable: {e}");
                return ApplyOutcome::new(ApplyResult::AutomationError, e.to_string());
            }
        };

        let outcome = match Session::start(&self.client, &driver.base_url, self.config.headless).await {
            Ok(session) => {
                let outcome = self.drive(&session, url).await;
                session.end().await;
                outcome
            }
            Err(e) => {
                warn!(job_id = %job.job_id, "Browser session failed: {e}");
                ApplyOutcome::new(ApplyResult::AutomationError, e.to_string())
            }
        };

        driver.shutdown().await;
        outcome
    }
}

struct Driver {
    base_url: String,
    child: Option<Child>,
}

impl Driver {
    async fn wait_ready(&mut self, client: &Client) -> Result<(), WebDriverError> {
        let status_url = format!("{}/status", self.base_url);
        for _ in 0..DRIVER_READY_ATTEMPTS {
            if let Some(child) = self.child.as_mut() {
                if let Some(exit) = child.try_wait()? {
                    return Err(WebDriverError::Driver(format!("exited early with {exit}")));
                }
            }
            if let Ok(response) = client.get(&status_url).send().await {
                if let Ok(body) = response.json::<Value>().await {
                    if body["value"]["ready"].as_bool().unwrap_or(false) {
                        return Ok(());
                    }
                }
            }
            tokio::time::sleep(DRIVER_READY_INTERVAL).await;
        }
        Err(WebDriverError::Driver("did not become ready".to_string()))
    }

    async fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop chromedriver: {e}");
            }
        }
    }
}

struct Session<'a> {
    client: &'a Client,
    url: String,
}

impl<'a> Session<'a> {
    async fn start(client: &'a Client, base_url: &str, headless: bool) -> Result<Session<'a>, WebDriverError> {
        let value = command(
            client,
            Method::POST,
            &format!("{base_url}/session"),
            Some(chrome_capabilities(headless)),
        )
        .await?;

        let id = value["sessionId"]
            .as_str()
            .ok_or(WebDriverError::MissingField("sessionId"))?;
        debug!("Started browser session {id}");

        Ok(Session {
            client,
            url: format!("{base_url}/session/{id}"),
        })
    }

    async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        command(self.client, Method::POST, &format!("{}/url", self.url), Some(json!({ "url": url })))
            .await
            .map(drop)
    }

    async fn find_xpath(&self, xpath: &str) -> Result<String, WebDriverError> {
        let value = command(
            self.client,
            Method::POST,
            &format!("{}/element", self.url),
            Some(json!({ "using": "xpath", "value": xpath })),
        )
        .await?;
        element_id(&value)
    }

    async fn send_keys(&self, element: &str, text: &str) -> Result<(), WebDriverError> {
        command(
            self.client,
            Method::POST,
            &format!("{}/element/{element}/value", self.url),
            Some(json!({ "text": text })),
        )
        .await
        .map(drop)
    }

    async fn click(&self, element: &str) -> Result<(), WebDriverError> {
        command(
            self.client,
            Method::POST,
            &format!("{}/element/{element}/click", self.url),
            Some(json!({})),
        )
        .await
        .map(drop)
    }

    /// Closes the browser. Failures are logged only; the driver is torn down next.
    async fn end(self) {
        if let Err(e) = command(self.client, Method::DELETE, &self.url, None).await {
            warn!("Failed to close browser session: {e}");
        }
    }
}

/// Sends one WebDriver command and unwraps the `value` envelope.
async fn command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, WebDriverError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status().as_u16();
    let payload: Value = response.json().await?;
    unwrap_value(status, payload)
}

fn unwrap_value(status: u16, mut payload: Value) -> Result<Value, WebDriverError> {
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);
    if (200..300).contains(&status) && value.get("error").is_none() {
        return Ok(value);
    }
    Err(WebDriverError::Protocol {
        status,
        error: value["error"].as_str().unwrap_or("unknown error").to_string(),
        message: value["message"].as_str().unwrap_or_default().to_string(),
    })
}

fn element_id(value: &Value) -> Result<String, WebDriverError> {
    value[ELEMENT_KEY]
        .as_str()
        .map(str::to_string)
        .ok_or(WebDriverError::MissingField(ELEMENT_KEY))
}

fn chrome_capabilities(headless: bool) -> Value {
    let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
    if headless {
        args.insert(0, "--headless=new");
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}

/// File inputs need an absolute path.
fn resolve_resume_path(path: &Path) -> Result<PathBuf, WebDriverError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
