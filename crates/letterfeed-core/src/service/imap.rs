//! IMAP mail service over implicit TLS.
//!
//! Every protocol round trip is bounded by the connector's timeout so a
//! stalled server cannot hang an ingestion run.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_imap::types::{Fetch, Name};
use async_trait::async_trait;
use futures::TryStreamExt;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

use super::session::{Flag, MailConnector, MailSession, MailboxStatus};
use super::MailServiceError;
use crate::settings::ResolvedSettings;

type TlsSession = async_imap::Session<TlsStream<TcpStream>>;

/// Opens IMAP sessions with implicit TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImapConnector {
    port: u16,
    timeout: Duration,
}

impl Default for ImapConnector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PORT, Self::DEFAULT_TIMEOUT)
    }
}

impl ImapConnector {
    /// Standard IMAPS port.
    pub const DEFAULT_PORT: u16 = 993;

    /// Default limit for a single protocol operation.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates a connector for the given port and per-operation timeout.
    #[must_use]
    pub const fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    /// Per-operation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Connects and logs in.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, TLS handshake or login fails.
    pub async fn connect(&self, settings: &ResolvedSettings) -> Result<ImapSession, MailServiceError> {
        let host = settings.imap_server.trim();
        let password = settings
            .imap_password
            .as_deref()
            .ok_or_else(|| MailServiceError::Authentication("no password configured".into()))?;

        info!(host, port = self.port, "Connecting to IMAP server");

        let tcp = within(
            self.timeout,
            "connect",
            TcpStream::connect((host, self.port)),
            MailServiceError::Connection,
        )
        .await?;

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| MailServiceError::Connection(format!("invalid server name: {e}")))?;
        let tls = within(
            self.timeout,
            "TLS handshake",
            tls_connector().connect(server_name, tcp),
            MailServiceError::Connection,
        )
        .await?;

        let client = async_imap::Client::new(tls);
        let session = within(
            self.timeout,
            "login",
            async {
                client
                    .login(&settings.imap_username, password)
                    .await
                    .map_err(|(e, _)| e)
            },
            MailServiceError::Authentication,
        )
        .await?;

        debug!(host, "IMAP login successful");
        Ok(ImapSession {
            session,
            timeout: self.timeout,
        })
    }

    /// Checks that the server accepts the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting or logging in fails.
    pub async fn test_connection(&self, settings: &ResolvedSettings) -> Result<(), MailServiceError> {
        let mut session = self.connect(settings).await?;
        session.logout().await
    }

    /// Lists the names of all mailboxes on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, logging in or listing fails.
    pub async fn list_folders(
        &self,
        settings: &ResolvedSettings,
    ) -> Result<Vec<String>, MailServiceError> {
        let mut session = self.connect(settings).await?;
        let listed = session.list().await;
        if let Err(e) = session.logout().await {
            warn!(error = %e, "IMAP logout failed");
        }

        let mut folders: Vec<String> = listed?.iter().map(|name| name.name().to_string()).collect();
        folders.sort();
        Ok(folders)
    }
}

#[async_trait]
impl MailConnector for ImapConnector {
    type Session = ImapSession;

    async fn open(&self, settings: &ResolvedSettings) -> Result<ImapSession, MailServiceError> {
        self.connect(settings).await
    }
}

/// An authenticated IMAP session.
pub struct ImapSession {
    session: TlsSession,
    timeout: Duration,
}

impl ImapSession {
    async fn list(&mut self) -> Result<Vec<Name>, MailServiceError> {
        let session = &mut self.session;
        within(
            self.timeout,
            "LIST",
            async move {
                session
                    .list(Some(""), Some("*"))
                    .await?
                    .try_collect::<Vec<Name>>()
                    .await
            },
            MailServiceError::Operation,
        )
        .await
    }

    /// Discards untagged responses nobody asked for.
    fn drain_unsolicited(&self) {
        while let Ok(response) = self.session.unsolicited_responses.try_recv() {
            debug!(?response, "Ignoring unsolicited IMAP response");
        }
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn select(&mut self, folder: &str) -> Result<MailboxStatus, MailServiceError> {
        let mailbox = within(
            self.timeout,
            "SELECT",
            self.session.select(folder),
            |reason| MailServiceError::Selection {
                folder: folder.to_string(),
                reason,
            },
        )
        .await?;
        self.drain_unsolicited();

        Ok(MailboxStatus {
            exists: mailbox.exists,
            first_unseen: mailbox.unseen,
        })
    }

    async fn search_unseen(&mut self) -> Result<Vec<u32>, MailServiceError> {
        let found = within(
            self.timeout,
            "UID SEARCH",
            self.session.uid_search("UNSEEN"),
            MailServiceError::Operation,
        )
        .await?;
        self.drain_unsolicited();

        let mut uids: Vec<u32> = found.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch_peek(&mut self, uid: u32) -> Result<Option<Vec<u8>>, MailServiceError> {
        let session = &mut self.session;
        let fetches = within(
            self.timeout,
            "UID FETCH",
            async move {
                session
                    .uid_fetch(uid.to_string(), "BODY.PEEK[]")
                    .await?
                    .try_collect::<Vec<Fetch>>()
                    .await
            },
            MailServiceError::Operation,
        )
        .await?;
        self.drain_unsolicited();

        // Servers may interleave FETCH responses for other messages
        Ok(fetches
            .iter()
            .find(|fetch| fetch.uid == Some(uid))
            .and_then(Fetch::body)
            .map(<[u8]>::to_vec))
    }

    async fn store(&mut self, uid: u32, flag: Flag) -> Result<(), MailServiceError> {
        let session = &mut self.session;
        within(
            self.timeout,
            "UID STORE",
            async move {
                session
                    .uid_store(uid.to_string(), format!("+FLAGS ({})", flag.as_imap()))
                    .await?
                    .try_collect::<Vec<Fetch>>()
                    .await
            },
            MailServiceError::Operation,
        )
        .await?;
        self.drain_unsolicited();
        Ok(())
    }

    async fn copy(&mut self, uid: u32, folder: &str) -> Result<(), MailServiceError> {
        within(
            self.timeout,
            "UID COPY",
            self.session.uid_copy(uid.to_string(), folder),
            MailServiceError::Operation,
        )
        .await?;
        self.drain_unsolicited();
        Ok(())
    }

    async fn expunge(&mut self) -> Result<(), MailServiceError> {
        let session = &mut self.session;
        let removed = within(
            self.timeout,
            "EXPUNGE",
            async move { session.expunge().await?.try_collect::<Vec<u32>>().await },
            MailServiceError::Operation,
        )
        .await?;
        self.drain_unsolicited();

        debug!(count = removed.len(), "Expunged messages");
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), MailServiceError> {
        within(
            self.timeout,
            "LOGOUT",
            self.session.logout(),
            MailServiceError::Operation,
        )
        .await
    }
}

fn tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Runs one protocol step under a deadline.
async fn within<T, E, F>(
    limit: Duration,
    step: &str,
    future: F,
    wrap: impl FnOnce(String) -> MailServiceError,
) -> Result<T, MailServiceError>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(wrap(format!("{step}: {e}"))),
        Err(_) => Err(MailServiceError::Timeout(format!(
            "{step} after {}s",
            limit.as_secs()
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_passes_value() {
        let value = within(
            Duration::from_secs(1),
            "noop",
            async { Ok::<_, std::io::Error>(7) },
            MailServiceError::Operation,
        )
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_within_wraps_error() {
        let err = within(
            Duration::from_secs(1),
            "SELECT",
            async { Err::<(), _>(std::io::Error::other("boom")) },
            MailServiceError::Operation,
        )
        .await
        .unwrap_err();
        assert_eq!(err, MailServiceError::Operation("SELECT: boom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_times_out() {
        let err = within(
            Duration::from_secs(5),
            "FETCH",
            std::future::pending::<Result<(), std::io::Error>>(),
            MailServiceError::Operation,
        )
        .await
        .unwrap_err();
        assert_eq!(err, MailServiceError::Timeout("FETCH after 5s".to_string()));
    }

    #[tokio::test]
    async fn test_connect_requires_password() {
        let settings = ResolvedSettings::new(
            crate::settings::Settings {
                imap_server: "imap.invalid".to_string(),
                imap_username: "me".to_string(),
                ..crate::settings::Settings::default()
            },
            std::collections::BTreeSet::new(),
            false,
        );
        let err = ImapConnector::default().connect(&settings).await.err().unwrap();
        assert!(matches!(err, MailServiceError::Authentication(_)));
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(Flag::Seen.as_imap(), "\\Seen");
        assert_eq!(Flag::Deleted.as_imap(), "\\Deleted");
    }
}
