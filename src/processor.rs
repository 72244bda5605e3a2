use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::checkpoint;
use crate::exif::{MetadataTool, ToolError};
use crate::label::{infer_from_chain, Inference};
use crate::media::is_media_file;
use crate::merge::plan_merge;
use crate::template::MetadataTemplate;

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Compute updates without writing anything
    pub dry_run: bool,
    /// Leave completion markers so a restarted run resumes
    pub checkpoints: bool,
    /// Case-insensitive keywords; matching subtrees are not visited
    pub exclude: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub directories: usize,
    pub directories_resumed: usize,
    pub directories_excluded: usize,
    pub directories_unlabelled: usize,
    pub total_files: usize,
    pub updated: usize,
    pub planned: usize,
    pub complete: usize,
    pub failed: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Outcome for a single media file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Updated,
    /// Dry run: an update was computed but not written
    Planned,
    /// Every template field already had a value
    Complete,
}

pub struct Processor<T: MetadataTool> {
    tool: T,
    template: MetadataTemplate,
    options: ProcessOptions,
    stats: ProcessingStats,
}

fn is_excluded(relative: &Path, keywords: &[String]) -> bool {
    if keywords.is_empty() || relative.as_os_str().is_empty() {
        return false;
    }
    let lowered = relative.to_string_lossy().to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
}

/// Directory names from the root (inclusive) down to `dir`
fn label_chain(root: &Path, dir: &Path) -> Vec<String> {
    let mut chain = Vec::new();
    if let Some(name) = root.file_name() {
        chain.push(name.to_string_lossy().into_owned());
    }
    if let Ok(relative) = dir.strip_prefix(root) {
        chain.extend(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        );
    }
    chain
}

impl<T: MetadataTool> Processor<T> {
    pub fn new(tool: T, template: MetadataTemplate, options: ProcessOptions) -> Self {
        Processor {
            tool,
            template,
            options,
            stats: ProcessingStats::default(),
        }
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Walk `root` and fill missing metadata for every media file below it.
    ///
    /// Per-file and per-directory failures are logged and counted; only a
    /// root that cannot be resolved is an error.
    pub fn process_root(&mut self, root: &Path) -> Result<()> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("Failed to resolve root directory {}", root.display()))?;

        info!("Processing directory: {}", root.display());
        if self.options.dry_run {
            info!("Dry run: no metadata will be written");
        }

        let keywords = self.options.exclude.clone();
        let root_for_filter = root.clone();
        let mut excluded = 0;

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e: &DirEntry| {
                if !e.file_type().is_dir() {
                    return true;
                }
                let relative = e.path().strip_prefix(&root_for_filter).unwrap_or(e.path());
                if is_excluded(relative, &keywords) {
                    info!("Skipping {} (excluded keyword)", e.path().display());
                    excluded += 1;
                    return false;
                }
                true
            });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    if let Some(path) = err.path() {
                        warn!("Failed to access {}: {}", path.display(), err);
                    } else {
                        warn!("WalkDir error: {}", err);
                    }
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let chain = label_chain(&root, entry.path());
            let inference = infer_from_chain(chain.iter().map(String::as_str));
            self.process_directory(&root, entry.path(), &inference);
        }

        self.stats.directories_excluded += excluded;

        if self.options.checkpoints && !self.options.dry_run {
            let removed = checkpoint::cleanup(&root);
            debug!("Removed {} checkpoint markers under {}", removed, root.display());
        }

        Ok(())
    }

    fn process_directory(&mut self, root: &Path, dir: &Path, inference: &Inference) {
        self.stats.directories += 1;
        let is_root = dir == root;

        if self.options.checkpoints && !is_root && checkpoint::is_completed(dir) {
            debug!("Already processed: {}", dir.display());
            self.stats.directories_resumed += 1;
            return;
        }

        if inference.is_empty() {
            debug!("No date in path of {}, using template defaults only", dir.display());
            self.stats.directories_unlabelled += 1;
        } else {
            debug!(
                dir = %dir.display(),
                date = ?inference.date.map(|d| d.to_string()),
                headline = ?inference.headline,
                "inferred from directory"
            );
        }

        for file in collect_files(dir) {
            self.stats.total_files += 1;

            match self.process_file(&file, inference) {
                Ok(FileOutcome::Updated) => self.stats.updated += 1,
                Ok(FileOutcome::Planned) => self.stats.planned += 1,
                Ok(FileOutcome::Complete) => self.stats.complete += 1,
                Err(e) => {
                    warn!("Skipping {}: {}", file.display(), e);
                    self.stats.failed += 1;
                    self.stats.failures.push((file, e.to_string()));
                }
            }
        }

        if self.options.checkpoints && !self.options.dry_run && !is_root {
            if let Err(e) = checkpoint::mark_completed(dir) {
                warn!("{:#}", e);
            }
        }
    }

    /// Read a file's metadata, fill empty template fields, write if needed
    pub fn process_file(&mut self, path: &Path, inference: &Inference) -> Result<FileOutcome, ToolError> {
        let record = self.tool.read(path)?;
        let plan = plan_merge(&record, &self.template, inference);

        for tag in plan.unresolved() {
            debug!("No value for empty {} in {}", tag, path.display());
        }

        let payload = plan.payload();
        if payload.is_empty() {
            debug!("Complete: {}", path.display());
            return Ok(FileOutcome::Complete);
        }

        if self.options.dry_run {
            info!("Would update {}: {}", path.display(), payload);
            return Ok(FileOutcome::Planned);
        }

        self.tool.write(path, &payload)?;
        info!("Updated {}: {}", path.display(), payload);
        Ok(FileOutcome::Updated)
    }

    pub fn print_summary(&self) {
        let stats = &self.stats;

        println!();
        println!("=== PROCESSING COMPLETE ===");
        println!("Directories visited: {}", stats.directories);
        if stats.directories_resumed > 0 {
            println!("  - Already processed (checkpoint): {}", stats.directories_resumed);
        }
        if stats.directories_excluded > 0 {
            println!("  - Excluded by keyword: {}", stats.directories_excluded);
        }
        if stats.directories_unlabelled > 0 {
            println!("  - Without date in path: {}", stats.directories_unlabelled);
        }
        println!("Media files scanned: {}", stats.total_files);
        if self.options.dry_run {
            println!("Would update: {}", stats.planned);
        } else {
            println!("Updated: {}", stats.updated);
        }
        println!("Already complete: {}", stats.complete);
        println!("Failed: {}", stats.failed);

        if !stats.failures.is_empty() {
            println!();
            println!("=== FAILED FILES ===");
            for (path, reason) in &stats.failures {
                println!("{}", path.display());
                println!("   → {}", reason);
            }
        }
    }
}

/// Media files directly inside `dir`, sorted by name
fn collect_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry_result in WalkDir::new(dir)
        .max_depth(1)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                warn!("Failed to list entry in {}: {}", dir.display(), err);
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !is_media_file(path) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::WritePayload;
    use crate::metadata::FileMetadataRecord;
    use crate::template::FieldValue;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct FakeTool {
        records: HashMap<PathBuf, FileMetadataRecord>,
        reads: Vec<PathBuf>,
        writes: Vec<(PathBuf, WritePayload)>,
        failing: HashSet<PathBuf>,
    }

    impl MetadataTool for FakeTool {
        fn read(&mut self, path: &Path) -> Result<FileMetadataRecord, ToolError> {
            self.reads.push(path.to_path_buf());
            if self.failing.contains(path) {
                return Err(ToolError::Output {
                    path: path.to_path_buf(),
                    reason: "unreadable".to_string(),
                });
            }
            Ok(self.records.get(path).cloned().unwrap_or_default())
        }

        fn write(&mut self, path: &Path, payload: &WritePayload) -> Result<(), ToolError> {
            let record = self.records.entry(path.to_path_buf()).or_default();
            for (tag, value) in payload.iter() {
                record.insert(tag, serde_json::to_value(value).unwrap());
            }
            self.writes.push((path.to_path_buf(), payload.clone()));
            Ok(())
        }
    }

    fn options() -> ProcessOptions {
        ProcessOptions {
            dry_run: false,
            checkpoints: true,
            exclude: vec!["received".to_string()],
        }
    }

    fn touch(path: &Path) -> PathBuf {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
        fs::canonicalize(path).unwrap()
    }

    fn archive() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("Archive");
        fs::create_dir_all(&root).unwrap();
        (tmp, root)
    }

    fn headline(tool: &FakeTool, path: &Path) -> Option<FieldValue> {
        tool.writes
            .iter()
            .find(|(p, _)| p == path)
            .and_then(|(_, payload)| payload.get("XMP-photoshop:Headline").cloned())
    }

    #[test]
    fn test_fills_from_directory_and_ignores_non_media() {
        let (_tmp, root) = archive();
        let photo = touch(&root.join("2013 Family Trip").join("IMG_0001.JPG"));
        let notes = touch(&root.join("2013 Family Trip").join("notes.txt"));
        let junk = touch(&root.join("2013 Family Trip").join("._IMG_0001.JPG"));

        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();

        let tool = processor.tool();
        assert_eq!(tool.reads, vec![photo.clone()]);
        assert!(!tool.reads.contains(&notes));
        assert!(!tool.reads.contains(&junk));
        assert_eq!(headline(tool, &photo), Some(FieldValue::from("Family Trip")));
        assert_eq!(
            tool.writes[0].1.get("XMP-photoshop:DateCreated"),
            Some(&FieldValue::from("2013"))
        );
        assert_eq!(processor.stats().updated, 1);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let (_tmp, root) = archive();
        touch(&root.join("2013-02-15 Beach").join("a.jpg"));
        touch(&root.join("2013-02-15 Beach").join("b.heic"));

        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();
        assert_eq!(processor.tool().writes.len(), 2);

        processor.process_root(&root).unwrap();
        assert_eq!(processor.tool().writes.len(), 2);
        assert_eq!(processor.stats().complete, 2);
    }

    #[test]
    fn test_existing_headline_kept() {
        let (_tmp, root) = archive();
        let photo = touch(&root.join("2013 Vacation").join("grad.jpg"));

        let mut tool = FakeTool::default();
        let mut record = FileMetadataRecord::new();
        record.insert("Headline", json!("Graduation"));
        tool.records.insert(photo.clone(), record);

        let mut processor = Processor::new(tool, MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();

        let tool = processor.tool();
        assert_eq!(headline(tool, &photo), None);
        assert_eq!(
            tool.records[&photo].get("Headline"),
            Some(&json!("Graduation"))
        );
    }

    #[test]
    fn test_failed_file_does_not_stop_walk() {
        let (_tmp, root) = archive();
        let bad = touch(&root.join("2010 Party").join("a.jpg"));
        let good = touch(&root.join("2010 Party").join("b.jpg"));

        let mut tool = FakeTool::default();
        tool.failing.insert(bad.clone());

        let mut processor = Processor::new(tool, MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();

        assert_eq!(processor.stats().failed, 1);
        assert_eq!(processor.stats().failures[0].0, bad);
        assert_eq!(headline(processor.tool(), &good), Some(FieldValue::from("Party")));
    }

    #[test]
    fn test_root_name_counts_as_label() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("2007 Print Quality");
        let photo = touch(&root.join("scan.tif"));
        let nested = touch(&root.join("Portraits").join("p.tif"));

        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();

        let tool = processor.tool();
        assert_eq!(headline(tool, &photo), Some(FieldValue::from("Print Quality")));
        assert_eq!(headline(tool, &nested), Some(FieldValue::from("Print Quality")));
    }

    #[test]
    fn test_undated_directory_gets_defaults_only() {
        let (_tmp, root) = archive();
        let photo = touch(&root.join("Miscellaneous").join("x.png"));

        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();

        assert!(processor.tool().writes.is_empty());
        assert_eq!(processor.tool().reads, vec![photo]);
        assert_eq!(processor.stats().directories_unlabelled, 2);
    }

    #[test]
    fn test_excluded_subtree_not_visited() {
        let (_tmp, root) = archive();
        touch(&root.join("2015 Received from Bob").join("a.jpg"));
        touch(&root.join("2015 Received from Bob").join("2015-01-01 New Year").join("b.jpg"));
        let kept = touch(&root.join("2015 Hike").join("c.jpg"));

        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();

        assert_eq!(processor.tool().reads, vec![kept]);
        assert_eq!(processor.stats().directories_excluded, 1);
    }

    #[test]
    fn test_checkpointed_directory_is_resumed() {
        let (_tmp, root) = archive();
        let done_dir = root.join("2011 Done");
        touch(&done_dir.join("a.jpg"));
        let child = touch(&done_dir.join("2011-05-05 Child").join("b.jpg"));
        checkpoint::mark_completed(&done_dir).unwrap();

        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), options());
        processor.process_root(&root).unwrap();

        assert_eq!(processor.tool().reads, vec![child]);
        assert_eq!(processor.stats().directories_resumed, 1);
        assert!(!checkpoint::is_completed(&done_dir));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (_tmp, root) = archive();
        touch(&root.join("2013 Family Trip").join("a.jpg"));

        let opts = ProcessOptions {
            dry_run: true,
            ..options()
        };
        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), opts);
        processor.process_root(&root).unwrap();

        assert!(processor.tool().writes.is_empty());
        assert_eq!(processor.stats().planned, 1);
        assert!(!checkpoint::is_completed(&root.join("2013 Family Trip")));
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut processor = Processor::new(FakeTool::default(), MetadataTemplate::default(), options());
        assert!(processor.process_root(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn test_is_excluded() {
        let keywords = vec!["Received".to_string()];
        assert!(is_excluded(Path::new("2015/received photos"), &keywords));
        assert!(!is_excluded(Path::new("2015 Hike"), &keywords));
        assert!(!is_excluded(Path::new(""), &keywords));
    }
}
