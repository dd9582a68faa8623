use std::path::Path;

use anyhow::{Context, Result};
use cfgladder_core::{report_step_failure, Logger, StepContext, Storage, UpgradeStep};
use regex::Regex;
use serde::{Deserialize, Serialize};
use xmltree::{Element, XMLNode};

use crate::config_tree::{config_files, visit_elements_named};

/// One macro edit. `name` and `value` are patterns matched from the start of
/// the macro's name and value; a missing `value` matches any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroChange {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

impl MacroChange {
    pub fn rename(name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            new_name: Some(new_name.into()),
            new_value: None,
        }
    }
}

struct CompiledChange<'a> {
    name: Regex,
    value: Option<Regex>,
    change: &'a MacroChange,
}

impl CompiledChange<'_> {
    fn apply(&self, item: &mut Element) -> bool {
        let name = item.attributes.get("name").cloned().unwrap_or_default();
        let value = item.attributes.get("value").cloned().unwrap_or_default();
        if !self.name.is_match(&name) {
            return false;
        }
        if let Some(pattern) = &self.value {
            if !pattern.is_match(&value) {
                return false;
            }
        }

        let mut changed = false;
        if let Some(new_name) = &self.change.new_name {
            if *new_name != name {
                item.attributes.insert("name".to_string(), new_name.clone());
                changed = true;
            }
        }
        if let Some(new_value) = &self.change.new_value {
            if *new_value != value {
                item.attributes.insert("value".to_string(), new_value.clone());
                changed = true;
            }
        }
        changed
    }
}

/// Renames macros or rewrites their values on every IOC named `ioc`, or
/// `ioc` with a two-digit suffix, across all configurations and components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMacros {
    ioc: String,
    changes: Vec<MacroChange>,
    name: String,
}

impl ChangeMacros {
    pub fn new(ioc: impl Into<String>, changes: Vec<MacroChange>) -> Self {
        let ioc = ioc.into();
        Self {
            name: format!("change-macros:{ioc}"),
            ioc,
            changes,
        }
    }

    fn apply(&self, storage: &dyn Storage, logger: &dyn Logger) -> Result<usize> {
        let ioc_filter = ioc_filter(&self.ioc)?;
        let compiled = self
            .changes
            .iter()
            .map(|change| {
                Ok(CompiledChange {
                    name: prefix_pattern(&change.name)?,
                    value: change.value.as_deref().map(prefix_pattern).transpose()?,
                    change,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut total = 0;
        for path in config_files(storage, "iocs.xml")? {
            let mut document = load(storage, &path)?;
            let mut changed = 0;
            for_each_matching_ioc(&mut document, &ioc_filter, &path, logger, &mut |ioc| {
                let Some(macros) = ioc.get_mut_child("macros") else {
                    return;
                };
                for node in macros.children.iter_mut() {
                    let XMLNode::Element(item) = node else {
                        continue;
                    };
                    if item.name != "macro" {
                        continue;
                    }
                    for change in &compiled {
                        if change.apply(item) {
                            changed += 1;
                        }
                    }
                }
            });
            if changed > 0 {
                save(storage, &path, &document)?;
                total += changed;
            }
        }
        Ok(total)
    }
}

impl UpgradeStep for ChangeMacros {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage, ctx.logger) {
            Ok(changed) => {
                ctx.logger.info(&format!("Changed {changed} macro(s) on {} IOCs", self.ioc));
                0
            }
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed changing macros on {}", self.ioc),
                &err,
            ),
        }
    }
}

/// Adds a macro to every matching IOC that does not set it yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMacro {
    ioc: String,
    macro_name: String,
    value: String,
    name: String,
}

impl AddMacro {
    pub fn new(
        ioc: impl Into<String>,
        macro_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let ioc = ioc.into();
        let macro_name = macro_name.into();
        Self {
            name: format!("add-macro:{ioc}:{macro_name}"),
            ioc,
            macro_name,
            value: value.into(),
        }
    }

    fn apply(&self, storage: &dyn Storage, logger: &dyn Logger) -> Result<usize> {
        let ioc_filter = ioc_filter(&self.ioc)?;
        let mut total = 0;
        for path in config_files(storage, "iocs.xml")? {
            let mut document = load(storage, &path)?;
            let mut added = 0;
            for_each_matching_ioc(&mut document, &ioc_filter, &path, logger, &mut |ioc| {
                if ioc.get_child("macros").is_none() {
                    ioc.children.push(XMLNode::Element(Element::new("macros")));
                }
                let Some(macros) = ioc.get_mut_child("macros") else {
                    return;
                };
                let present = macros.children.iter().any(|node| {
                    matches!(node, XMLNode::Element(item)
                        if item.name == "macro"
                            && item.attributes.get("name") == Some(&self.macro_name))
                });
                if present {
                    return;
                }

                let mut item = Element::new("macro");
                item.attributes.insert("name".to_string(), self.macro_name.clone());
                item.attributes.insert("value".to_string(), self.value.clone());
                macros.children.push(XMLNode::Element(item));
                added += 1;
            });
            if added > 0 {
                save(storage, &path, &document)?;
                total += added;
            }
        }
        Ok(total)
    }
}

impl UpgradeStep for AddMacro {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        match self.apply(ctx.storage, ctx.logger) {
            Ok(added) => {
                ctx.logger.info(&format!(
                    "Added macro {}={} to {added} {} IOC(s)",
                    self.macro_name, self.value, self.ioc
                ));
                0
            }
            Err(err) => report_step_failure(
                ctx.logger,
                &format!("Failed adding macro {} to {}", self.macro_name, self.ioc),
                &err,
            ),
        }
    }
}

/// Matches `ioc` and its numbered instances, e.g. `GALIL` matches `GALIL_01`.
fn ioc_filter(ioc: &str) -> Result<Regex> {
    Regex::new(&format!(r"^{}(_\d{{2}})?$", regex::escape(ioc)))
        .with_context(|| format!("invalid IOC name '{ioc}'"))
}

fn prefix_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})"))
        .with_context(|| format!("invalid macro pattern '{pattern}'"))
}

fn for_each_matching_ioc(
    document: &mut Element,
    filter: &Regex,
    path: &Path,
    logger: &dyn Logger,
    visit: &mut dyn FnMut(&mut Element),
) {
    visit_elements_named(document, "ioc", &mut |ioc| {
        let matched = ioc
            .attributes
            .get("name")
            .filter(|name| filter.is_match(name))
            .cloned();
        if let Some(name) = matched {
            logger.info(&format!("Found {name} in {}", path.display()));
            visit(ioc);
        }
    });
}

fn load(storage: &dyn Storage, path: &Path) -> Result<Element> {
    storage
        .read_document(path)
        .with_context(|| format!("{} is not valid xml", path.display()))
}

fn save(storage: &dyn Storage, path: &Path, document: &Element) -> Result<()> {
    storage
        .write_document(path, document)
        .with_context(|| format!("failed saving {}", path.display()))
}
