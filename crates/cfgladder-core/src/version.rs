use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{Logger, Storage};

/// Location of the version marker relative to the configuration root.
pub const VERSION_MARKER_PATH: &str = "configurations/config_version.txt";

/// Persisted "which version is this configuration at" marker.
pub struct VersionStore<'a> {
    storage: &'a dyn Storage,
    logger: &'a dyn Logger,
    initial_label: &'a str,
    path: PathBuf,
}

impl<'a> VersionStore<'a> {
    /// `initial_label` is written when a configuration has never been
    /// versioned; it is normally the ledger's first label.
    pub fn new(storage: &'a dyn Storage, logger: &'a dyn Logger, initial_label: &'a str) -> Self {
        Self {
            storage,
            logger,
            initial_label,
            path: PathBuf::from(VERSION_MARKER_PATH),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current marker, bootstrapping an absent one to the initial
    /// label.
    pub fn read(&self) -> Result<String> {
        match self.peek()? {
            Some(label) => Ok(label),
            None => {
                self.write(self.initial_label)?;
                Ok(self.initial_label.to_string())
            }
        }
    }

    /// Returns the current marker without ever writing one.
    pub fn peek(&self) -> Result<Option<String>> {
        if !self.storage.exists(&self.path) {
            return Ok(None);
        }

        let lines = self.storage.read_lines(&self.path).with_context(|| {
            format!(
                "version-marker: failed reading {}",
                self.path.display()
            )
        })?;
        Ok(Some(
            lines
                .into_iter()
                .next()
                .map(|line| line.trim().to_string())
                .unwrap_or_default(),
        ))
    }

    pub fn write(&self, label: &str) -> Result<()> {
        self.logger.info(&format!("Writing new version number {label}"));
        self.storage
            .write_lines(&self.path, &[label.to_string()])
            .with_context(|| {
                format!(
                    "version-marker: failed writing {} to {}",
                    label,
                    self.path.display()
                )
            })
    }
}
