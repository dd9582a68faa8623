use std::path::PathBuf;

use anyhow::{Context, Result};
use cfgladder_core::{report_step_failure, Logger, StepContext, Storage, UpgradeStep};
use serde::{Deserialize, Serialize};

use crate::config_tree::{config_files, first_text_mut, synoptic_files, visit_elements_named};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvRename {
    pub from: String,
    pub to: String,
}

impl PvRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Replaces PV name fragments in block `read_pv` values and synoptic
/// `address` values. Renames apply in order, so a later rename sees the
/// result of an earlier one.
///
/// Any `forbidden` fragment still present afterwards fails the step; those
/// PVs no longer exist and need a manual replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePvs {
    renames: Vec<PvRename>,
    forbidden: Vec<String>,
}

impl RenamePvs {
    pub fn new(renames: Vec<PvRename>) -> Self {
        Self {
            renames,
            forbidden: Vec::new(),
        }
    }

    pub fn with_forbidden(mut self, forbidden: Vec<String>) -> Self {
        self.forbidden = forbidden;
        self
    }

    fn apply(&self, storage: &dyn Storage, logger: &dyn Logger) -> Result<usize> {
        let mut replaced = 0;
        let mut forbidden_found = 0;
        for (path, element_name) in pv_documents(storage)? {
            let mut document = storage
                .read_document(&path)
                .with_context(|| format!("{} is not valid xml", path.display()))?;
            let mut changed = 0;
            visit_elements_named(&mut document, element_name, &mut |element| {
                let Some(text) = first_text_mut(element) else {
                    return;
                };
                for rename in &self.renames {
                    if text.contains(rename.from.as_str()) {
                        *text = text.replace(rename.from.as_str(), &rename.to);
                        changed += 1;
                    }
                }
                forbidden_found += self
                    .forbidden
                    .iter()
                    .filter(|pv| text.contains(pv.as_str()))
                    .count();
            });
            if changed > 0 {
                storage
                    .write_document(&path, &document)
                    .with_context(|| format!("failed saving {}", path.display()))?;
                logger.info(&format!("Renamed {changed} PV(s) in {}", path.display()));
                replaced += changed;
            }
        }

        if forbidden_found > 0 {
            anyhow::bail!(
                "{} no longer exist but are referenced {} time(s) in blocks or synoptics; \
                 replace them with the underlying PV and rerun the upgrade",
                self.forbidden.join(", "),
                forbidden_found
            );
        }
        Ok(replaced)
    }
}

impl UpgradeStep for RenamePvs {
    fn name(&self) -> &str {
        "rename-pvs"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage, ctx.logger) {
            Ok(replaced) => {
                ctx.logger.info(&format!("Renamed {replaced} PV reference(s)"));
                0
            }
            Err(err) => report_step_failure(ctx.logger, "Failed renaming PVs", &err),
        }
    }
}

fn pv_documents(storage: &dyn Storage) -> Result<Vec<(PathBuf, &'static str)>> {
    let mut documents = config_files(storage, "blocks.xml")?
        .into_iter()
        .map(|path| (path, "read_pv"))
        .collect::<Vec<_>>();
    documents.extend(
        synoptic_files(storage)?
            .into_iter()
            .map(|path| (path, "address")),
    );
    Ok(documents)
}
