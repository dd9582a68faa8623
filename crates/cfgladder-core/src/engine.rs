use anyhow::Result;

use crate::{
    Ledger, Logger, RepositorySync, ResourceScope, RunOutcome, SessionConnector, StepContext,
    Storage, SyncKind, VersionStore,
};

/// Replays the due suffix of a [`Ledger`] against one configuration tree.
///
/// A run reads the marker, finds the matching ledger entry and performs every
/// step from there in order. After each successful step the marker and the
/// repository are checkpointed, so a run that aborts on a failing step can be
/// re-invoked and resumes at that step.
pub struct Engine<'a> {
    ledger: &'a Ledger,
    storage: &'a dyn Storage,
    logger: &'a dyn Logger,
    sync: &'a RepositorySync<'a>,
    connector: Option<&'a dyn SessionConnector>,
}

impl<'a> Engine<'a> {
    pub fn new(
        ledger: &'a Ledger,
        storage: &'a dyn Storage,
        logger: &'a dyn Logger,
        sync: &'a RepositorySync<'a>,
    ) -> Self {
        Self {
            ledger,
            storage,
            logger,
            sync,
            connector: None,
        }
    }

    pub fn with_connector(mut self, connector: &'a dyn SessionConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn versions(&self) -> VersionStore<'a> {
        VersionStore::new(self.storage, self.logger, self.ledger.first_label())
    }

    pub fn run(&self) -> Result<RunOutcome> {
        let versions = self.versions();
        let current = versions.read()?;
        self.logger.info(&format!("Config at initial version {current}"));

        let mut resources = match self.connector {
            Some(connector) => ResourceScope::new(connector),
            None => ResourceScope::unavailable(),
        };
        let replayed = self.replay(&versions, &current, &mut resources);
        let released = resources.close();

        let outcome = replayed?;
        released?;
        Ok(outcome)
    }

    fn replay(
        &self,
        versions: &VersionStore<'_>,
        current: &str,
        resources: &mut ResourceScope<'_>,
    ) -> Result<RunOutcome> {
        let mut applying = false;
        let mut last_visited: Option<&str> = None;
        let mut applied = 0_usize;

        for entry in self.ledger.entries() {
            if entry.label() == current {
                applying = true;
                if entry.is_terminal() {
                    self.logger.info("Current config is on latest version, no upgrade needed");
                }
            }
            if !applying {
                continue;
            }

            last_visited = Some(entry.label());
            let Some(step) = entry.step() else {
                continue;
            };

            self.logger.info(&format!("Upgrading from {}", entry.label()));
            self.logger.info("-------------------------");
            let code = {
                let mut ctx = StepContext {
                    storage: self.storage,
                    logger: self.logger,
                    resources: &mut *resources,
                };
                step.perform(&mut ctx)
            };
            if code != 0 {
                self.logger.error(&format!(
                    "Upgrade step '{}' from {} failed with code {}",
                    step.name(),
                    entry.label(),
                    code
                ));
                return Ok(RunOutcome::StepFailed {
                    label: entry.label().to_string(),
                    code,
                });
            }

            versions.write(entry.resulting_version())?;
            self.sync
                .commit_tag_push(entry.label(), SyncKind::Intermediate)?;
            applied += 1;
        }

        let Some(final_version) = last_visited else {
            self.logger.error(&format!("Unknown version number {current}"));
            return Ok(RunOutcome::UnknownStartVersion {
                version: current.to_string(),
            });
        };

        versions.write(final_version)?;
        self.logger.info(&format!("Finished upgrade. Now on version {final_version}"));
        self.sync.commit_tag_push(final_version, SyncKind::Final)?;

        if applied == 0 {
            Ok(RunOutcome::AlreadyLatest {
                version: final_version.to_string(),
            })
        } else {
            Ok(RunOutcome::Completed {
                final_version: final_version.to_string(),
                applied,
            })
        }
    }
}
