//! # Persist Module
//!
//! Writes the final working set to its destination.
//!
//! Persistence is idempotent: writing an item that is already present is a
//! no-op, so re-running a completed pipeline into the same output directory
//! never fails and never rewrites files.

use crate::core::item::Item;
use crate::error::PersistError;
use crate::events::{Event, EventSender, PersistEvent};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_128;

/// What happened to one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOutcome {
    Written,
    AlreadyPresent,
}

/// Destination for surviving items
pub trait PersistenceSink: Send + Sync {
    /// Store the item unless an entry for its id already exists
    fn write_if_absent(&self, item: &Item) -> Result<PersistOutcome, PersistError>;
}

/// Totals for one persistence pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub written: usize,
    pub already_present: usize,
}

/// Persist every item in order, stopping at the first failure.
///
/// Items before the failing one stay written. Re-running after the cause is
/// fixed finds them already present and writes only the rest.
pub fn persist_all(
    sink: &dyn PersistenceSink,
    items: &[Item],
    events: &EventSender,
) -> Result<PersistSummary, PersistError> {
    events.send(Event::Persist(PersistEvent::Started {
        total_items: items.len(),
    }));

    let mut summary = PersistSummary::default();
    for item in items {
        let outcome = sink.write_if_absent(item)?;
        match outcome {
            PersistOutcome::Written => summary.written += 1,
            PersistOutcome::AlreadyPresent => summary.already_present += 1,
        }
        events.send(Event::Persist(PersistEvent::ItemPersisted {
            id: item.id().to_string(),
            written: outcome == PersistOutcome::Written,
        }));
    }

    events.send(Event::Persist(PersistEvent::Completed {
        written: summary.written,
        already_present: summary.already_present,
    }));
    tracing::info!(
        written = summary.written,
        already_present = summary.already_present,
        "persistence finished"
    );

    Ok(summary)
}

/// Copies items into `output_dir/<id>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    output_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where an item with this id ends up
    pub fn target_for(&self, item: &Item) -> PathBuf {
        item.id()
            .split('/')
            .fold(self.output_dir.clone(), |path, part| path.join(part))
    }
}

/// Size first, then xxh3 over the contents
fn same_content(a: &Path, b: &Path) -> std::io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(xxh3_128(&fs::read(a)?) == xxh3_128(&fs::read(b)?))
}

impl PersistenceSink for DirectorySink {
    fn write_if_absent(&self, item: &Item) -> Result<PersistOutcome, PersistError> {
        let target = self.target_for(item);

        if target.exists() {
            match same_content(item.path(), &target) {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    id = item.id(),
                    target = %target.display(),
                    "existing output differs from source, leaving it untouched"
                ),
                Err(e) => tracing::warn!(
                    id = item.id(),
                    target = %target.display(),
                    error = %e,
                    "could not compare existing output, leaving it untouched"
                ),
            }
            return Ok(PersistOutcome::AlreadyPresent);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| PersistError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::copy(item.path(), &target).map_err(|source| PersistError::Copy {
            id: item.id().to_string(),
            target: target.clone(),
            source,
        })?;

        tracing::debug!(id = item.id(), target = %target.display(), "persisted");
        Ok(PersistOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{null_sender, EventChannel};
    use tempfile::TempDir;

    fn source_item(dir: &Path, id: &str, content: &str) -> Item {
        let path = dir.join(id.replace('/', "_"));
        fs::write(&path, content).unwrap();
        Item::new(id, path)
    }

    #[test]
    fn second_write_is_a_no_op() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let item = source_item(input.path(), "a.png", "pixels");
        let sink = DirectorySink::new(output.path());

        assert_eq!(sink.write_if_absent(&item).unwrap(), PersistOutcome::Written);
        assert_eq!(
            sink.write_if_absent(&item).unwrap(),
            PersistOutcome::AlreadyPresent
        );
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 1);
        assert_eq!(fs::read_to_string(output.path().join("a.png")).unwrap(), "pixels");
    }

    #[test]
    fn nested_ids_create_parent_directories() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let item = source_item(input.path(), "2024/june/b.png", "data");
        let sink = DirectorySink::new(output.path().join("final"));

        sink.write_if_absent(&item).unwrap();

        assert!(output.path().join("final/2024/june/b.png").is_file());
    }

    #[test]
    fn differing_existing_file_is_left_untouched() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let item = source_item(input.path(), "a.png", "new content");
        fs::write(output.path().join("a.png"), "old").unwrap();
        let sink = DirectorySink::new(output.path());

        assert_eq!(
            sink.write_if_absent(&item).unwrap(),
            PersistOutcome::AlreadyPresent
        );
        assert_eq!(fs::read_to_string(output.path().join("a.png")).unwrap(), "old");
    }

    #[test]
    fn missing_source_is_a_copy_error() {
        let output = TempDir::new().unwrap();
        let item = Item::new("ghost.png", "/nonexistent/ghost.png");
        let sink = DirectorySink::new(output.path());

        match sink.write_if_absent(&item) {
            Err(PersistError::Copy { id, .. }) => assert_eq!(id, "ghost.png"),
            other => panic!("Expected Copy error, got {:?}", other),
        }
    }

    #[test]
    fn persist_all_counts_and_reports_events() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let items = vec![
            source_item(input.path(), "a.png", "a"),
            source_item(input.path(), "b.png", "b"),
        ];
        let sink = DirectorySink::new(output.path());
        sink.write_if_absent(&items[0]).unwrap();

        let (sender, receiver) = EventChannel::new();
        let summary = persist_all(&sink, &items, &sender).unwrap();
        drop(sender);

        assert_eq!(
            summary,
            PersistSummary {
                written: 1,
                already_present: 1
            }
        );
        let events: Vec<Event> = receiver.iter().collect();
        assert!(matches!(
            events.last(),
            Some(Event::Persist(PersistEvent::Completed { written: 1, .. }))
        ));
    }

    #[test]
    fn persist_all_stops_at_first_failure() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let items = vec![
            Item::new("ghost.png", "/nonexistent/ghost.png"),
            source_item(input.path(), "b.png", "b"),
        ];
        let sink = DirectorySink::new(output.path());

        assert!(persist_all(&sink, &items, &null_sender()).is_err());
        assert!(!output.path().join("b.png").exists());
    }

    #[test]
    fn rerun_after_partial_failure_completes_the_rest() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let items = vec![
            source_item(input.path(), "a.png", "a"),
            Item::new("b.png", input.path().join("b.png")),
            source_item(input.path(), "c.png", "c"),
        ];
        let sink = DirectorySink::new(output.path());

        match persist_all(&sink, &items, &null_sender()) {
            Err(PersistError::Copy { id, .. }) => assert_eq!(id, "b.png"),
            other => panic!("Expected Copy error, got {:?}", other),
        }
        assert!(output.path().join("a.png").exists());
        assert!(!output.path().join("c.png").exists());

        fs::write(input.path().join("b.png"), "b").unwrap();
        let summary = persist_all(&sink, &items, &null_sender()).unwrap();
        assert_eq!(
            summary,
            PersistSummary {
                written: 2,
                already_present: 1
            }
        );
    }
}
