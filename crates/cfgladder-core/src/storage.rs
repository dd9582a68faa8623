use std::path::{Path, PathBuf};

use anyhow::Result;
use xmltree::Element;

/// File access rooted at the configuration root. Every path handed to a
/// `Storage` is relative to [`Storage::root`].
pub trait Storage {
    fn root(&self) -> &Path;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Reads a text file as lines with trailing whitespace removed.
    fn read_lines(&self, path: &Path) -> Result<Vec<String>>;

    /// Replaces the file with `lines`, each terminated by a newline.
    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()>;

    fn read_document(&self, path: &Path) -> Result<Element>;

    fn write_document(&self, path: &Path, document: &Element) -> Result<()>;

    /// Lists a directory as root-relative paths in sorted order.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Removes a directory and everything below it. A missing directory is
    /// not an error.
    fn remove_dir(&self, path: &Path) -> Result<()>;
}
