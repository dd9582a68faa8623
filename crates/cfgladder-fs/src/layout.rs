use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfgladder_core::VERSION_MARKER_PATH;

/// Well-known locations inside a configuration root, all relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayout {
    root: PathBuf,
}

impl ConfigLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `$ICPCONFIGROOT`, the folder holding every tracked configuration file.
    pub fn icp_config_dir() -> PathBuf {
        PathBuf::from("configurations")
    }

    pub fn configurations_dir() -> PathBuf {
        Self::icp_config_dir().join("configurations")
    }

    pub fn components_dir() -> PathBuf {
        Self::icp_config_dir().join("components")
    }

    pub fn synoptics_dir() -> PathBuf {
        Self::icp_config_dir().join("synoptics")
    }

    pub fn device_screens_path() -> PathBuf {
        Self::icp_config_dir().join("devices").join("screens.xml")
    }

    pub fn version_marker_path() -> PathBuf {
        PathBuf::from(VERSION_MARKER_PATH)
    }

    pub fn meta_path(folder: &Path) -> PathBuf {
        folder.join("meta.xml")
    }

    pub fn iocs_path(folder: &Path) -> PathBuf {
        folder.join("iocs.xml")
    }

    pub fn blocks_path(folder: &Path) -> PathBuf {
        folder.join("blocks.xml")
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// The configuration root is the parent of `$ICPCONFIGROOT`.
pub fn config_root_from_env() -> Result<PathBuf> {
    let config_root = std::env::var("ICPCONFIGROOT")
        .context("ICPCONFIGROOT is not set; pass --config-root")?;
    let config_root = PathBuf::from(config_root);
    let parent = config_root.parent().with_context(|| {
        format!(
            "ICPCONFIGROOT has no parent directory: {}",
            config_root.display()
        )
    })?;
    Ok(parent.to_path_buf())
}

pub fn default_log_dir() -> Result<PathBuf> {
    let var_dir = std::env::var("ICPVARDIR").context("ICPVARDIR is not set; pass --log-dir")?;
    Ok(PathBuf::from(var_dir).join("logs").join("upgrade"))
}
