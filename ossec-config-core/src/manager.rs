use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::active_response;
use crate::backup;
use crate::document::ConfigDocument;
use crate::error::{ConfigError, Result};
use crate::options::ManagerOptions;
use crate::xml::Element;

/// Where and how [`ConfigManager::save_with`] writes the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write here instead of the loaded file.
    pub target: Option<PathBuf>,
    /// Copy the loaded file aside before writing.
    pub backup: bool,
    /// Explicit backup location; a timestamped name is used otherwise.
    pub backup_path: Option<PathBuf>,
}

impl SaveOptions {
    pub fn with_backup() -> Self {
        Self {
            backup: true,
            ..Self::default()
        }
    }
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
}

/// Owns one parsed configuration file and the path it came from.
///
/// Every mutation works on the in-memory document only; the file on disk is
/// touched exclusively by [`save`](Self::save), [`save_with`](Self::save_with),
/// [`create_backup`](Self::create_backup) and [`restore`](Self::restore).
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    path: Option<PathBuf>,
    document: ConfigDocument,
    options: ManagerOptions,
}

impl ConfigManager {
    /// An empty manager with default options and no file loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty manager with custom options and no file loaded.
    pub fn with_options(options: ManagerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            path: None,
            document: ConfigDocument::default(),
            options,
        })
    }

    /// Load `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ManagerOptions::default())
    }

    /// Load `path` with custom options.
    pub fn open_with_options(path: impl AsRef<Path>, options: ManagerOptions) -> Result<Self> {
        let mut manager = Self::with_options(options)?;
        manager.load(path)?;
        Ok(manager)
    }

    /// Parse `path` and make it the managed file.
    ///
    /// On failure the previously loaded document and path stay in place.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = read_source(path)?;
        let document = self.parse_source(&bytes, path)?;

        self.document = document;
        self.path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(())
    }

    /// Overwrite `path` with `backup_path` without reading the current file,
    /// which may be too damaged to parse.
    pub fn recover(
        path: impl AsRef<Path>,
        backup_path: impl AsRef<Path>,
        options: ManagerOptions,
    ) -> Result<Self> {
        let mut manager = Self::with_options(options)?;
        manager.path = Some(path.as_ref().to_path_buf());
        manager.restore(backup_path)?;
        Ok(manager)
    }

    /// Discard in-memory changes and parse the managed file again.
    pub fn reload(&mut self) -> Result<()> {
        let path = self.loaded_path()?.to_path_buf();
        self.load(path)
    }

    pub fn is_loaded(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Serialize the current document the way `save` would write it.
    pub fn render(&self) -> Result<String> {
        self.document.render(self.options.indent)
    }

    /// Merge repeated top-level root blocks into the first one.
    pub fn consolidate_root_blocks(&mut self) -> usize {
        self.document.consolidate_root_blocks(&self.options.root_block)
    }

    /// Write the document back to the loaded file, optionally backing up the
    /// current on-disk file first. A failed backup aborts the save.
    pub fn save(&self, backup: bool) -> Result<SaveReport> {
        self.save_with(&SaveOptions {
            backup,
            ..SaveOptions::default()
        })
    }

    pub fn save_with(&self, options: &SaveOptions) -> Result<SaveReport> {
        let source = self.loaded_path()?;
        let target = options.target.as_deref().unwrap_or(source);
        let rendered = self.render()?;

        let backup = if options.backup {
            Some(self.create_backup(options.backup_path.as_deref())?)
        } else {
            None
        };

        backup::write_atomic(target, rendered.as_bytes())?;
        tracing::info!(path = %target.display(), "configuration saved");

        Ok(SaveReport {
            path: target.to_path_buf(),
            backup,
        })
    }

    /// Copy the loaded file, byte for byte, to `backup_path` or to a
    /// timestamped name next to it. Returns where the copy went.
    pub fn create_backup(&self, backup_path: Option<&Path>) -> Result<PathBuf> {
        let source = self.loaded_path()?;
        let target = match backup_path {
            Some(path) => path.to_path_buf(),
            None => backup::default_backup_path(source, &self.options, Local::now())?,
        };

        backup::copy_file(source, &target)?;
        Ok(target)
    }

    /// Replace the loaded file with the contents of `backup_path` and reload.
    ///
    /// The backup is parsed before anything is written, so a damaged backup
    /// leaves both the file and the in-memory document untouched.
    pub fn restore(&mut self, backup_path: impl AsRef<Path>) -> Result<()> {
        let backup_path = backup_path.as_ref();
        let live = self.loaded_path()?.to_path_buf();

        let bytes = read_source(backup_path)?;
        let document = self.parse_source(&bytes, backup_path)?;

        backup::write_atomic(&live, &bytes)?;
        self.document = document;
        tracing::info!(
            path = %live.display(),
            backup = %backup_path.display(),
            "configuration restored from backup"
        );
        Ok(())
    }

    pub(crate) fn document_mut(&mut self) -> &mut ConfigDocument {
        &mut self.document
    }

    /// The first top-level root block, which receives appended entries.
    pub(crate) fn root_block_mut(&mut self) -> Result<&mut Element> {
        let name = self.options.root_block.as_str();
        self.document
            .root_block_mut(name)
            .ok_or_else(|| ConfigError::not_found("root block", name))
    }

    fn loaded_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or(ConfigError::NotLoaded)
    }

    fn parse_source(&self, bytes: &[u8], path: &Path) -> Result<ConfigDocument> {
        let origin = path.display().to_string();
        let source = std::str::from_utf8(bytes).map_err(|err| {
            ConfigError::parse(origin.as_str(), format!("not valid UTF-8: {err}"))
        })?;

        let mut document = ConfigDocument::parse(source, &origin)?;
        if self.options.consolidate_root_blocks {
            document.consolidate_root_blocks(&self.options.root_block);
        }
        if self.options.verify_command_references {
            active_response::check_command_references(&document)?;
        }
        Ok(document)
    }
}

/// Read a source file; a missing file is reported as a parse failure.
fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => {
            ConfigError::parse(path.display().to_string(), "file does not exist")
        }
        _ => ConfigError::io("reading", path, err),
    })
}
