use anyhow::{Context, Result};
use cfgladder_core::{report_step_failure, StepContext, Storage, UpgradeStep};
use cfgladder_fs::ConfigLayout;
use xmltree::{Element, XMLNode};

/// Drops every device screen whose `<key>` is `key` from `devices/screens.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveDeviceScreen {
    key: String,
}

impl RemoveDeviceScreen {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn apply(&self, storage: &dyn Storage) -> Result<usize> {
        let path = ConfigLayout::device_screens_path();
        if !storage.exists(&path) {
            return Ok(0);
        }

        let mut screens = storage
            .read_document(&path)
            .with_context(|| format!("{} is not valid xml", path.display()))?;
        let removed = remove_keyed(&mut screens, &self.key);
        if removed > 0 {
            storage.write_document(&path, &screens)?;
        }
        Ok(removed)
    }
}

impl UpgradeStep for RemoveDeviceScreen {
    fn name(&self) -> &str {
        "remove-device-screen"
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage) {
            Ok(removed) => {
                ctx.logger.info(&format!("Removed {removed} '{}' device screen(s)", self.key));
                0
            }
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed removing '{}' device screens", self.key),
                &err,
            ),
        }
    }
}

fn remove_keyed(element: &mut Element, key: &str) -> usize {
    let before = element.children.len();
    element
        .children
        .retain(|child| !matches!(child, XMLNode::Element(device) if has_key(device, key)));
    let mut removed = before - element.children.len();
    for child in element.children.iter_mut() {
        if let XMLNode::Element(child) = child {
            removed += remove_keyed(child, key);
        }
    }
    removed
}

fn has_key(device: &Element, key: &str) -> bool {
    device
        .get_child("key")
        .and_then(|found| found.get_text())
        .is_some_and(|text| text.trim() == key)
}
