//! IMAP inbox reader. Read-only: the folder is EXAMINEd and bodies are PEEKed.

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{parse_header_block, Inbox, InboxError, InboxMessage};

type AsyncTcpStream = async_io::Async<std::net::TcpStream>;
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

#[derive(Debug)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub folder: String,
    /// Bound on the whole connect-search-fetch exchange.
    pub timeout: Duration,
}

pub struct ImapInbox {
    config: ImapConfig,
}

impl ImapInbox {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Session<TlsStream>, InboxError> {
        let addr = tokio::net::lookup_host((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| InboxError::ConnectionFailed(e.to_string()))?
            .next()
            .ok_or_else(|| {
                InboxError::ConnectionFailed(format!("no address for {}", self.config.host))
            })?;

        info!("Connecting to IMAP server at {addr}");
        let tcp_stream = AsyncTcpStream::connect(addr)
            .await
            .map_err(|e| InboxError::ConnectionFailed(e.to_string()))?;

        let tls_stream = TlsConnector::new()
            .connect(&self.config.host, tcp_stream)
            .await
            .map_err(|e| InboxError::Tls(e.to_string()))?;

        async_imap::Client::new(tls_stream)
            .login(&self.config.username, self.config.password.expose_secret())
            .await
            .map_err(|(e, _)| InboxError::AuthenticationFailed(e.to_string()))
    }

    async fn read_headers(
        &self,
        session: &mut Session<TlsStream>,
        since: NaiveDate,
    ) -> Result<Vec<InboxMessage>, InboxError> {
        session
            .examine(&self.config.folder)
            .await
            .map_err(|e| InboxError::Protocol(e.to_string()))?;

        let query = format!("SINCE {}", imap_date(since));
        debug!("Searching with query: {query}");
        let uids = session
            .uid_search(&query)
            .await
            .map_err(|e| InboxError::Protocol(e.to_string()))?;

        if uids.is_empty() {
            info!("No messages found since {since}");
            return Ok(Vec::new());
        }

        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        let uid_set = uids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let fetches = session
            .uid_fetch(&uid_set, "(UID BODY.PEEK[HEADER])")
            .await
            .map_err(|e| InboxError::Protocol(e.to_string()))?
            .collect::<Vec<_>>()
            .await;

        let mut messages = Vec::with_capacity(fetches.len());
        for fetch in fetches {
            match fetch {
                Ok(fetch) => messages.push(fetch.header().map(parse_header_block).unwrap_or_default()),
                Err(e) => warn!("Error fetching message headers: {e}"),
            }
        }

        debug!("Fetched headers for {} messages", messages.len());
        Ok(messages)
    }

    async fn exchange(&self, since: NaiveDate) -> Result<Vec<InboxMessage>, InboxError> {
        let mut session = self.connect().await?;
        let result = self.read_headers(&mut session, since).await;
        if let Err(e) = session.logout().await {
            warn!("IMAP logout failed: {e}");
        }
        result
    }
}

#[async_trait]
impl Inbox for ImapInbox {
    async fn fetch_since(&self, since: NaiveDate) -> Result<Vec<InboxMessage>, InboxError> {
        tokio::time::timeout(self.config.timeout, self.exchange(since))
            .await
            .map_err(|_| InboxError::Timeout(self.config.timeout.as_secs()))?
    }
}

/// IMAP SEARCH date format, e.g. `12-Oct-2026`.
fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imap_date_format() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 2).unwrap();
        assert_eq!(imap_date(date), "02-Oct-2026");
    }

    fn loopback_config(port: u16) -> ImapConfig {
        ImapConfig {
            host: "127.0.0.1".to_string(),
            port,
            username: "me".to_string(),
            password: SecretString::from("secret"),
            folder: "INBOX".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let inbox = ImapInbox::new(loopback_config(port));
        let since = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let err = inbox.fetch_since(since).await.unwrap_err();
        assert!(matches!(err, InboxError::ConnectionFailed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_server_hanging_up_before_handshake_is_tls_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let inbox = ImapInbox::new(loopback_config(port));
        let since = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let err = inbox.fetch_since(since).await.unwrap_err();
        assert!(matches!(err, InboxError::Tls(_)), "{err:?}");
    }
}
