use std::path::{Path, PathBuf};

use anyhow::Result;
use cfgladder_core::Storage;
use cfgladder_fs::ConfigLayout;
use xmltree::{Element, XMLNode};

/// Component and configuration folders, components first. Absent groups
/// contribute nothing.
pub(crate) fn config_folders(storage: &dyn Storage) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for group in [
        ConfigLayout::components_dir(),
        ConfigLayout::configurations_dir(),
    ] {
        if !storage.is_dir(&group) {
            continue;
        }
        for entry in storage.list_dir(&group)? {
            if storage.is_dir(&entry) {
                folders.push(entry);
            }
        }
    }
    Ok(folders)
}

/// `file_name` inside every component and configuration folder. Each folder
/// must carry the file.
pub(crate) fn config_files(storage: &dyn Storage, file_name: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for folder in config_folders(storage)? {
        let path = folder.join(file_name);
        if !storage.exists(&path) {
            anyhow::bail!("cannot find {}", path.display());
        }
        files.push(path);
    }
    Ok(files)
}

pub(crate) fn synoptic_files(storage: &dyn Storage) -> Result<Vec<PathBuf>> {
    let synoptics = ConfigLayout::synoptics_dir();
    if !storage.is_dir(&synoptics) {
        return Ok(Vec::new());
    }
    Ok(storage
        .list_dir(&synoptics)?
        .into_iter()
        .filter(|path| has_extension(path, "xml") && !storage.is_dir(path))
        .collect())
}

/// Files with `extension` anywhere below `dir`. Hidden directories such as
/// `.git` are skipped.
pub(crate) fn files_with_extension(
    storage: &dyn Storage,
    dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in storage.list_dir(dir)? {
        if storage.is_dir(&entry) {
            let hidden = entry
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if !hidden {
                files.extend(files_with_extension(storage, &entry, extension)?);
            }
        } else if has_extension(&entry, extension) {
            files.push(entry);
        }
    }
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|found| found.eq_ignore_ascii_case(extension))
}

/// Calls `visit` on `element` and every descendant named `name`, in document
/// order.
pub(crate) fn visit_elements_named(
    element: &mut Element,
    name: &str,
    visit: &mut dyn FnMut(&mut Element),
) {
    if element.name == name {
        visit(element);
    }
    for child in element.children.iter_mut() {
        if let XMLNode::Element(child) = child {
            visit_elements_named(child, name, visit);
        }
    }
}

/// Text of the element's first child when that child is a text node.
pub(crate) fn first_text_mut(element: &mut Element) -> Option<&mut String> {
    match element.children.first_mut() {
        Some(XMLNode::Text(text)) => Some(text),
        _ => None,
    }
}
