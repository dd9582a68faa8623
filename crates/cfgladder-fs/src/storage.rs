use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfgladder_core::Storage;
use xmltree::{Element, EmitterConfig};

use crate::fs_utils::ensure_parent_dir;
use crate::ConfigLayout;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" ?>";

/// [`Storage`] backed by the real filesystem under a configuration root.
#[derive(Debug, Clone)]
pub struct FsStorage {
    layout: ConfigLayout,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: ConfigLayout::new(root),
        }
    }

    pub fn layout(&self) -> &ConfigLayout {
        &self.layout
    }
}

impl Storage for FsStorage {
    fn root(&self) -> &Path {
        self.layout.root()
    }

    fn exists(&self, path: &Path) -> bool {
        self.layout.resolve(path).exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.layout.resolve(path).is_dir()
    }

    fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        let full = self.layout.resolve(path);
        let content = fs::read_to_string(&full)
            .with_context(|| format!("failed reading {}", full.display()))?;
        Ok(content
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect())
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        let full = self.layout.resolve(path);
        ensure_parent_dir(&full)
            .with_context(|| format!("failed creating parent of {}", full.display()))?;

        let mut content = String::with_capacity(lines.iter().map(|line| line.len() + 1).sum());
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(&full, content).with_context(|| format!("failed writing {}", full.display()))
    }

    fn read_document(&self, path: &Path) -> Result<Element> {
        let full = self.layout.resolve(path);
        let file =
            fs::File::open(&full).with_context(|| format!("failed opening {}", full.display()))?;
        Element::parse(file).with_context(|| format!("failed parsing xml {}", full.display()))
    }

    fn write_document(&self, path: &Path, document: &Element) -> Result<()> {
        let full = self.layout.resolve(path);
        ensure_parent_dir(&full)
            .with_context(|| format!("failed creating parent of {}", full.display()))?;

        let file = fs::File::create(&full)
            .with_context(|| format!("failed creating {}", full.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{XML_DECLARATION}")
            .with_context(|| format!("failed writing {}", full.display()))?;
        // Unindented; configuration files are stored without pretty-printing.
        let config = EmitterConfig::new()
            .write_document_declaration(false)
            .perform_indent(false);
        document
            .write_with_config(&mut writer, config)
            .with_context(|| format!("failed writing xml {}", full.display()))?;
        writeln!(writer).with_context(|| format!("failed writing {}", full.display()))?;
        writer
            .flush()
            .with_context(|| format!("failed flushing {}", full.display()))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let full = self.layout.resolve(path);
        let mut entries = Vec::new();
        for entry in
            fs::read_dir(&full).with_context(|| format!("failed listing {}", full.display()))?
        {
            let entry = entry.with_context(|| format!("failed listing {}", full.display()))?;
            entries.push(path.join(entry.file_name()));
        }
        entries.sort();
        Ok(entries)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        let full = self.layout.resolve(path);
        if !full.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&full).with_context(|| format!("failed removing {}", full.display()))
    }
}
