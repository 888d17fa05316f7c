//! One complete ingestion pass over every watched folder.

use tracing::{debug, error, info, warn};

use super::scanner::{FolderScanner, ScanStats};
use crate::Result;
use crate::newsletter::{Newsletter, NewsletterStore};
use crate::service::{MailConnector, MailSession};
use crate::settings::{ResolvedSettings, SettingsProvider};

/// Result of scanning one folder group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    /// The session could not be opened or the folder selected.
    Skipped {
        /// Why the folder was skipped.
        reason: String,
    },
    /// The folder was scanned to the end.
    Scanned(ScanStats),
    /// Scanning stopped on a mail service error.
    Failed {
        /// Counters up to the failure.
        stats: ScanStats,
        /// The error that stopped the scan.
        error: String,
    },
}

impl FolderOutcome {
    /// Counters collected, if the folder was scanned at all.
    #[must_use]
    pub const fn stats(&self) -> Option<&ScanStats> {
        match self {
            Self::Scanned(stats) | Self::Failed { stats, .. } => Some(stats),
            Self::Skipped { .. } => None,
        }
    }
}

/// Outcome for one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderReport {
    /// Folder name.
    pub folder: String,
    /// What happened.
    pub outcome: FolderOutcome,
}

/// Summary of one ingestion pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    /// False if the mail account is not configured and nothing ran.
    pub configured: bool,
    /// Folder outcomes in processing order.
    pub folders: Vec<FolderReport>,
}

impl RunReport {
    /// Report for a pass that found no mail account configured.
    #[must_use]
    pub const fn not_configured() -> Self {
        Self {
            configured: false,
            folders: Vec::new(),
        }
    }

    /// Entries stored across all folders.
    #[must_use]
    pub fn created(&self) -> usize {
        self.totals(|stats| stats.created)
    }

    /// Newsletters auto-provisioned across all folders.
    #[must_use]
    pub fn provisioned(&self) -> usize {
        self.totals(|stats| stats.provisioned)
    }

    /// Messages that failed to fetch or store across all folders.
    #[must_use]
    pub fn failed_messages(&self) -> usize {
        self.totals(|stats| stats.failed)
    }

    /// Looks up the report for a folder.
    #[must_use]
    pub fn folder(&self, name: &str) -> Option<&FolderReport> {
        self.folders.iter().find(|report| report.folder == name)
    }

    fn totals(&self, count: impl Fn(&ScanStats) -> usize) -> usize {
        self.folders
            .iter()
            .filter_map(|report| report.outcome.stats())
            .map(count)
            .sum()
    }
}

/// Runs ingestion passes.
///
/// A pass is sequential: one folder group at a time, one message at a
/// time. Callers must not start a pass while another is running.
pub struct Ingestor<P, N, C> {
    settings: P,
    store: N,
    connector: C,
}

impl<P, N, C> Ingestor<P, N, C>
where
    P: SettingsProvider,
    N: NewsletterStore,
    C: MailConnector,
{
    /// Creates an ingestor over its collaborators.
    pub const fn new(settings: P, store: N, connector: C) -> Self {
        Self {
            settings,
            store,
            connector,
        }
    }

    /// The settings provider.
    pub const fn settings(&self) -> &P {
        &self.settings
    }

    /// The newsletter store.
    pub const fn store(&self) -> &N {
        &self.store
    }

    /// The mail connector.
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Runs one pass.
    ///
    /// A missing mail account and failures inside a folder are reported,
    /// not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings or the newsletters cannot be loaded.
    pub async fn run(&self) -> Result<RunReport> {
        let settings = self.settings.resolve(true).await?;
        if !settings.is_configured() {
            warn!("IMAP settings are not configured, skipping ingestion");
            return Ok(RunReport::not_configured());
        }

        let newsletters = self.store.list_newsletters_with_senders().await?;
        let groups = group_by_folder(
            newsletters,
            &settings.search_folder,
            settings.auto_add_new_senders,
        );
        info!(folders = groups.len(), "Starting ingestion");

        let mut report = RunReport {
            configured: true,
            folders: Vec::with_capacity(groups.len()),
        };
        let foreign: Vec<Vec<String>> = (0..groups.len())
            .map(|index| senders_outside(&groups, index))
            .collect();
        for ((folder, newsletters), foreign) in groups.into_iter().zip(foreign) {
            let outcome = self
                .scan_folder(&settings, &folder, newsletters, foreign)
                .await;
            report.folders.push(FolderReport { folder, outcome });
        }

        info!(
            created = report.created(),
            provisioned = report.provisioned(),
            failed = report.failed_messages(),
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn scan_folder(
        &self,
        settings: &ResolvedSettings,
        folder: &str,
        newsletters: Vec<Newsletter>,
        foreign: Vec<String>,
    ) -> FolderOutcome {
        let mut session = match self.connector.open(settings).await {
            Ok(session) => session,
            Err(e) => {
                warn!(folder, error = %e, "Failed to open mail session, skipping folder");
                return FolderOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        match session.select(folder).await {
            Ok(status) => debug!(
                folder,
                exists = status.exists,
                first_unseen = ?status.first_unseen,
                "Folder selected"
            ),
            Err(e) => {
                warn!(folder, error = %e, "Failed to select folder, skipping");
                close(&mut session, folder).await;
                return FolderOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        }

        let mut scanner =
            FolderScanner::new(&mut session, &self.store, settings, folder, newsletters)
                .with_foreign_senders(foreign);
        let scanned = scanner.scan().await;
        let stats = scanner.into_stats();
        close(&mut session, folder).await;

        match scanned {
            Ok(()) => FolderOutcome::Scanned(stats),
            Err(e) => {
                error!(folder, error = %e, "Folder scan failed");
                FolderOutcome::Failed {
                    stats,
                    error: e.to_string(),
                }
            }
        }
    }
}

async fn close<S: MailSession>(session: &mut S, folder: &str) {
    if let Err(e) = session.logout().await {
        warn!(folder, error = %e, "Logout failed");
    }
}

/// Sender addresses of every group except the one at `index`.
fn senders_outside(groups: &[(String, Vec<Newsletter>)], index: usize) -> Vec<String> {
    groups
        .iter()
        .enumerate()
        .filter(|(other, _)| *other != index)
        .flat_map(|(_, (_, members))| members.iter())
        .flat_map(|newsletter| newsletter.sender_emails())
        .map(ToString::to_string)
        .collect()
}

/// Groups newsletters by the folder they are scanned in.
///
/// Groups keep the order in which their folder was first seen. With
/// `auto_add` set, the default folder always gets a group so new senders
/// are discovered there.
#[must_use]
pub fn group_by_folder(
    newsletters: Vec<Newsletter>,
    default_folder: &str,
    auto_add: bool,
) -> Vec<(String, Vec<Newsletter>)> {
    let mut groups: Vec<(String, Vec<Newsletter>)> = Vec::new();

    for newsletter in newsletters {
        let folder = newsletter.effective_search_folder(default_folder).to_string();
        match groups.iter_mut().find(|(name, _)| *name == folder) {
            Some((_, members)) => members.push(newsletter),
            None => groups.push((folder, vec![newsletter])),
        }
    }

    if auto_add && !groups.iter().any(|(name, _)| name == default_folder) {
        groups.push((default_folder.to_string(), Vec::new()));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newsletter::{NewsletterId, Sender};

    fn newsletter(id: i64, folder: Option<&str>) -> Newsletter {
        Newsletter {
            id: NewsletterId(id),
            name: format!("N{id}"),
            slug: None,
            search_folder: folder.map(ToString::to_string),
            move_to_folder: None,
            extract_content: false,
            is_active: true,
            created_at: chrono::Utc::now(),
            senders: Vec::new(),
        }
    }

    fn sender(newsletter: i64, email: &str) -> Sender {
        Sender {
            id: newsletter,
            email: email.to_string(),
            newsletter_id: NewsletterId(newsletter),
        }
    }

    fn names(groups: &[(String, Vec<Newsletter>)]) -> Vec<(&str, Vec<i64>)> {
        groups
            .iter()
            .map(|(folder, members)| {
                (
                    folder.as_str(),
                    members.iter().map(|n| n.id.0).collect::<Vec<_>>(),
                )
            })
            .collect()
    }

    #[test]
    fn test_groups_by_effective_folder() {
        let groups = group_by_folder(
            vec![
                newsletter(1, None),
                newsletter(2, Some("News")),
                newsletter(3, Some("")),
                newsletter(4, Some("News")),
            ],
            "INBOX",
            false,
        );
        assert_eq!(
            names(&groups),
            vec![("INBOX", vec![1, 3]), ("News", vec![2, 4])]
        );
    }

    #[test]
    fn test_auto_add_adds_default_group() {
        let groups = group_by_folder(vec![newsletter(1, Some("News"))], "INBOX", true);
        assert_eq!(names(&groups), vec![("News", vec![1]), ("INBOX", vec![])]);

        let groups = group_by_folder(Vec::new(), "INBOX", false);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_auto_add_does_not_duplicate_default() {
        let groups = group_by_folder(vec![newsletter(1, None)], "INBOX", true);
        assert_eq!(names(&groups), vec![("INBOX", vec![1])]);
    }

    #[test]
    fn test_senders_outside_group() {
        let mut weekly = newsletter(1, Some("News"));
        weekly.senders = vec![sender(1, "n@ex.com")];
        let mut daily = newsletter(2, None);
        daily.senders = vec![sender(2, "d@ex.com")];

        let groups = group_by_folder(vec![weekly, daily], "INBOX", true);
        assert_eq!(senders_outside(&groups, 0), vec!["d@ex.com"]);
        assert_eq!(senders_outside(&groups, 1), vec!["n@ex.com"]);
    }

    #[test]
    fn test_report_totals() {
        let report = RunReport {
            configured: true,
            folders: vec![
                FolderReport {
                    folder: "INBOX".to_string(),
                    outcome: FolderOutcome::Scanned(ScanStats {
                        created: 2,
                        provisioned: 1,
                        ..ScanStats::default()
                    }),
                },
                FolderReport {
                    folder: "News".to_string(),
                    outcome: FolderOutcome::Skipped {
                        reason: "down".to_string(),
                    },
                },
                FolderReport {
                    folder: "Other".to_string(),
                    outcome: FolderOutcome::Failed {
                        stats: ScanStats {
                            created: 1,
                            failed: 3,
                            ..ScanStats::default()
                        },
                        error: "gone".to_string(),
                    },
                },
            ],
        };
        assert_eq!(report.created(), 3);
        assert_eq!(report.provisioned(), 1);
        assert_eq!(report.failed_messages(), 3);
        assert!(report.folder("News").is_some());
        assert!(!RunReport::not_configured().configured);
    }
}
