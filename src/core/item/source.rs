//! Directory walking implementation using walkdir.

use super::filter::{is_hidden, ExtensionFilter};
use super::{Discovery, Item, ItemSource};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent};
use std::path::Path;
use walkdir::WalkDir;

/// Configuration for input discovery
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

/// Discovers items by walking a directory tree
pub struct DirectorySource {
    config: SourceConfig,
    filter: ExtensionFilter,
}

impl DirectorySource {
    pub fn new(config: SourceConfig) -> Self {
        let mut filter = ExtensionFilter::new().with_hidden(config.include_hidden);
        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions);
        }
        Self { config, filter }
    }
}

/// Id of `path` relative to `root`, with `/` separators on every platform
fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();
    parts.map(|parts| parts.join("/"))
}

impl ItemSource for DirectorySource {
    fn discover_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<Discovery, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        events.send(Event::Scan(ScanEvent::Started {
            root: root.to_path_buf(),
        }));

        let mut items = Vec::new();
        let mut errors = Vec::new();

        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.config.include_hidden;
        let entries = walker
            .into_iter()
            .filter_entry(|entry| include_hidden || entry.depth() == 0 || !is_hidden(entry.path()));

        for entry_result in entries {
            match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    if !entry.file_type().is_file() || !self.filter.should_include(path) {
                        continue;
                    }

                    match relative_id(root, path) {
                        Some(id) => items.push(Item::new(id, path)),
                        None => {
                            tracing::warn!(path = %path.display(), "skipping file with non UTF-8 name");
                        }
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();

                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path: path.clone() }
                    } else {
                        ScanError::ReadDirectory {
                            path: path.clone(),
                            source: std::io::Error::other(e.to_string()),
                        }
                    };

                    events.send(Event::Scan(ScanEvent::Error {
                        path,
                        message: error.to_string(),
                    }));

                    errors.push(error);
                }
            }
        }

        items.sort_by(|a, b| a.id().cmp(b.id()));

        tracing::info!(
            root = %root.display(),
            items = items.len(),
            errors = errors.len(),
            "discovered input collection"
        );

        events.send(Event::Scan(ScanEvent::Completed {
            total_items: items.len(),
        }));

        Ok(Discovery { items, errors })
    }
}
