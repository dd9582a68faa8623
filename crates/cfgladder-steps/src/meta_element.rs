use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfgladder_core::{report_step_failure, Logger, StepContext, Storage, UpgradeStep};
use cfgladder_fs::ConfigLayout;
use xmltree::{Element, XMLNode};

/// Adds `<tag>value</tag>` to the `meta.xml` of every folder below the
/// configuration and component directories, nested folders included, that
/// does not already carry the element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMetaXmlElement {
    tag: String,
    value: String,
    name: String,
}

impl AddMetaXmlElement {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            name: format!("add-meta-element:{tag}"),
            tag,
            value: value.into(),
        }
    }

    fn apply(&self, storage: &dyn Storage, logger: &dyn Logger) -> Result<usize> {
        let mut changed = 0;
        for group in [
            ConfigLayout::configurations_dir(),
            ConfigLayout::components_dir(),
        ] {
            if !storage.is_dir(&group) {
                continue;
            }
            for folder in nested_folders(storage, &group)? {
                if self.add_to_meta(storage, &folder)? {
                    logger.info(&format!(
                        "Added <{}> to {}",
                        self.tag,
                        ConfigLayout::meta_path(&folder).display()
                    ));
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn add_to_meta(&self, storage: &dyn Storage, folder: &Path) -> Result<bool> {
        let meta_path = ConfigLayout::meta_path(folder);
        let mut meta = storage
            .read_document(&meta_path)
            .with_context(|| format!("failed loading {}", meta_path.display()))?;
        if meta.get_child(self.tag.as_str()).is_some() {
            return Ok(false);
        }

        let mut element = Element::new(&self.tag);
        element.children.push(XMLNode::Text(self.value.clone()));
        meta.children.push(XMLNode::Element(element));
        storage
            .write_document(&meta_path, &meta)
            .with_context(|| format!("failed saving {}", meta_path.display()))?;
        Ok(true)
    }
}

impl UpgradeStep for AddMetaXmlElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage, ctx.logger) {
            Ok(changed) => {
                ctx.logger.info(&format!(
                    "Element <{}> present in all meta.xml files ({} updated)",
                    self.tag, changed
                ));
                0
            }
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed adding <{}> to meta.xml", self.tag),
                &err,
            ),
        }
    }
}

/// Every directory below `group`, depth first, parents before children.
/// `group` itself is not included.
fn nested_folders(storage: &dyn Storage, group: &Path) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in storage.list_dir(group)? {
        if storage.is_dir(&entry) {
            let children = nested_folders(storage, &entry)?;
            folders.push(entry);
            folders.extend(children);
        }
    }
    Ok(folders)
}
