use std::path::PathBuf;

use anyhow::{Context, Result};
use cfgladder_core::{Ledger, LedgerEntry, UpgradeStep};
use serde::{Deserialize, Serialize};

use crate::{
    AddDbLoadMacros, AddMacro, AddMetaXmlElement, AppendLines, ApplySqlFile, ChangeMacros,
    EditDbRecords, EnsureLines, MacroChange, NoOp, OnlyOnHosts, PvRename, RecordEdit,
    RemoveDeviceScreen, RemoveFolders, RenamePvs, ReplaceText, RunSql, Sequence, SetRemoteUrl,
    WarnIfPresent,
};

/// On-disk form of the upgrade ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default = "ledger_file_version")]
    pub version: u32,
    #[serde(default, rename = "entry")]
    pub entries: Vec<LedgerFileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFileEntry {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_version: Option<String>,
    /// Machines the step applies to; empty means every machine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepSpec {
    Noop,
    AddMetaElement {
        tag: String,
        value: String,
    },
    RunSql {
        statements: Vec<String>,
    },
    ApplySqlFile {
        path: PathBuf,
    },
    SetRemoteUrl {
        repository: PathBuf,
        #[serde(default = "default_remote")]
        remote: String,
        url: String,
    },
    ChangeMacros {
        ioc: String,
        changes: Vec<MacroChange>,
    },
    AddMacro {
        ioc: String,
        name: String,
        value: String,
    },
    RenamePvs {
        renames: Vec<PvRename>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        forbidden: Vec<String>,
    },
    EnsureLines {
        path: PathBuf,
        lines: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        initial: Vec<String>,
    },
    AppendLines {
        path: PathBuf,
        lines: Vec<String>,
    },
    ReplaceText {
        path: PathBuf,
        from: String,
        to: String,
    },
    RemoveDeviceScreen {
        key: String,
    },
    EditDbRecords {
        path: PathBuf,
        records: Vec<RecordEdit>,
    },
    AddDbLoadMacros {
        substitutions_root: PathBuf,
        template: String,
        macros: String,
    },
    RemoveFolders {
        folders: Vec<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unless_committed_after: Option<i64>,
    },
    WarnIfPresent {
        path: PathBuf,
        message: String,
    },
    Sequence {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        steps: Vec<StepSpec>,
    },
}

pub fn ledger_file_version() -> u32 {
    1
}

fn default_remote() -> String {
    "origin".to_string()
}

pub fn build_step(spec: &StepSpec) -> Box<dyn UpgradeStep> {
    match spec {
        StepSpec::Noop => Box::new(NoOp),
        StepSpec::AddMetaElement { tag, value } => Box::new(AddMetaXmlElement::new(tag, value)),
        StepSpec::RunSql { statements } => Box::new(RunSql::new(statements.clone())),
        StepSpec::ApplySqlFile { path } => Box::new(ApplySqlFile::new(path)),
        StepSpec::SetRemoteUrl {
            repository,
            remote,
            url,
        } => Box::new(SetRemoteUrl::new(repository, remote, url)),
        StepSpec::ChangeMacros { ioc, changes } => {
            Box::new(ChangeMacros::new(ioc, changes.clone()))
        }
        StepSpec::AddMacro { ioc, name, value } => Box::new(AddMacro::new(ioc, name, value)),
        StepSpec::RenamePvs { renames, forbidden } => {
            Box::new(RenamePvs::new(renames.clone()).with_forbidden(forbidden.clone()))
        }
        StepSpec::EnsureLines {
            path,
            lines,
            initial,
        } => Box::new(EnsureLines::new(path, lines.clone()).with_initial(initial.clone())),
        StepSpec::AppendLines { path, lines } => Box::new(AppendLines::new(path, lines.clone())),
        StepSpec::ReplaceText { path, from, to } => Box::new(ReplaceText::new(path, from, to)),
        StepSpec::RemoveDeviceScreen { key } => Box::new(RemoveDeviceScreen::new(key)),
        StepSpec::EditDbRecords { path, records } => {
            Box::new(EditDbRecords::new(path, records.clone()))
        }
        StepSpec::AddDbLoadMacros {
            substitutions_root,
            template,
            macros,
        } => Box::new(AddDbLoadMacros::new(substitutions_root, template, macros)),
        StepSpec::RemoveFolders {
            folders,
            unless_committed_after,
        } => {
            let step = RemoveFolders::new(folders.clone());
            match unless_committed_after {
                Some(cutoff) => Box::new(step.unless_committed_after(*cutoff)),
                None => Box::new(step),
            }
        }
        StepSpec::WarnIfPresent { path, message } => Box::new(WarnIfPresent::new(path, message)),
        StepSpec::Sequence { name, steps } => {
            let sequence = Sequence::new(steps.iter().map(build_step).collect());
            match name {
                Some(name) => Box::new(sequence.with_name(name)),
                None => Box::new(sequence),
            }
        }
    }
}

fn build_entry_step(entry: &LedgerFileEntry, spec: &StepSpec) -> Box<dyn UpgradeStep> {
    let step = build_step(spec);
    if entry.hosts.is_empty() {
        step
    } else {
        Box::new(OnlyOnHosts::new(entry.hosts.clone(), step))
    }
}

/// Parses a ledger file and builds the validated [`Ledger`] it describes.
pub fn parse_ledger_file(content: &str) -> Result<Ledger> {
    let file = toml::from_str::<LedgerFile>(content).context("ledger-file: failed parsing")?;
    let expected = ledger_file_version();
    if file.version != expected {
        anyhow::bail!(
            "ledger-file: unsupported version {} (expected {}): update the ledger to version {}",
            file.version,
            expected,
            expected
        );
    }

    let mut entries = Vec::with_capacity(file.entries.len());
    for entry in &file.entries {
        if entry.label.trim().is_empty() {
            anyhow::bail!("ledger-file: entry label must not be empty");
        }
        if entry.step.is_none() && !entry.hosts.is_empty() {
            anyhow::bail!(
                "ledger-file: terminal entry '{}' cannot be limited to hosts",
                entry.label
            );
        }
        let built = match &entry.step {
            Some(spec) => LedgerEntry::new(&entry.label, build_entry_step(entry, spec)),
            None => LedgerEntry::terminal(&entry.label),
        };
        entries.push(match &entry.resulting_version {
            Some(version) => built.resulting_in(version),
            None => built,
        });
    }

    Ledger::new(entries)
}
