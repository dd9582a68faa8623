use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::{Captures, Regex};

/// Expands `${NAME}` references from the environment. Paths without
/// references come back unchanged.
pub fn expand_env_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    if !raw.contains("${") {
        return Ok(path.to_path_buf());
    }

    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").context("invalid env pattern")?;
    let mut missing = None;
    let expanded = pattern.replace_all(&raw, |captures: &Captures<'_>| {
        let name = &captures[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    if let Some(name) = missing {
        anyhow::bail!("{} needs ${name}, which is not set", path.display());
    }
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Resolves a step path: environment references first, then relative paths
/// against `root`.
pub fn resolve_step_path(root: &Path, path: &Path) -> Result<PathBuf> {
    let expanded = expand_env_path(path)?;
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(root.join(expanded))
    }
}
