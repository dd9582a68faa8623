use std::collections::HashSet;
use std::fmt;

use anyhow::Result;

use crate::UpgradeStep;

pub struct LedgerEntry {
    label: String,
    step: Option<Box<dyn UpgradeStep>>,
    resulting_version: Option<String>,
}

impl LedgerEntry {
    pub fn new(label: impl Into<String>, step: Box<dyn UpgradeStep>) -> Self {
        Self {
            label: label.into(),
            step: Some(step),
            resulting_version: None,
        }
    }

    /// The "no further action" rung that ends the ladder.
    pub fn terminal(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            step: None,
            resulting_version: None,
        }
    }

    /// Pins the marker written after this entry's step succeeds instead of
    /// deriving it from the following entry.
    pub fn resulting_in(mut self, version: impl Into<String>) -> Self {
        self.resulting_version = Some(version.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn step(&self) -> Option<&dyn UpgradeStep> {
        self.step.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.step.is_none()
    }

    pub fn resulting_version(&self) -> &str {
        self.resulting_version.as_deref().unwrap_or(&self.label)
    }
}

impl fmt::Debug for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerEntry")
            .field("label", &self.label)
            .field("step", &self.step.as_ref().map(|step| step.name()))
            .field("resulting_version", &self.resulting_version())
            .finish()
    }
}

/// The ordered upgrade path. Labels are opaque tokens compared only for
/// equality; ordering is whatever the list says.
#[derive(Debug)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new(mut entries: Vec<LedgerEntry>) -> Result<Self> {
        if entries.is_empty() {
            anyhow::bail!("invalid-ledger: ledger has no entries");
        }

        let terminal_count = entries.iter().filter(|entry| entry.is_terminal()).count();
        if terminal_count != 1 {
            anyhow::bail!(
                "invalid-ledger: expected exactly one terminal entry without a step, found {}",
                terminal_count
            );
        }

        let next_labels: Vec<Option<String>> = entries
            .iter()
            .skip(1)
            .map(|entry| Some(entry.label.clone()))
            .chain(std::iter::once(None))
            .collect();
        for (entry, next) in entries.iter_mut().zip(next_labels) {
            if entry.resulting_version.is_none() {
                entry.resulting_version = next;
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.label == label)
    }

    pub fn first_label(&self) -> &str {
        &self.entries[0].label
    }

    pub fn latest_label(&self) -> &str {
        &self.entries[self.entries.len() - 1].label
    }

    /// Entries a run starting from `label` would visit, or `None` when the
    /// label is not on the ladder.
    pub fn pending_from(&self, label: &str) -> Option<&[LedgerEntry]> {
        self.index_of(label).map(|index| &self.entries[index..])
    }

    /// Structural oddities that construction tolerates but operators should
    /// know about.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut seen: HashSet<&str> = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !seen.insert(entry.label.as_str()) {
                warnings.push(format!(
                    "ledger label '{}' appears more than once; runs match its first occurrence",
                    entry.label
                ));
            }
        }

        if let Some(index) = self.entries.iter().position(LedgerEntry::is_terminal) {
            if index + 1 != self.entries.len() {
                warnings.push(format!(
                    "terminal entry '{}' is not the last ledger entry",
                    self.entries[index].label
                ));
            }
        }

        warnings
    }
}
