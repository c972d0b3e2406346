// ABOUTME: Incremental sync of rendered documents into an output directory tree
// ABOUTME: Fans documents out to folders, skips unchanged files, reclaims moved and orphaned ones

use crate::content::EmptyContent;
use crate::error::{Error, Result};
use crate::filename::{
    extract_short_id, fanout_filename, sanitize_filename, sanitize_folder_name, short_id,
    UniqueNames,
};
use crate::fs::{is_partial_write, FileSystem};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A document ready to be written: rendered once, placed once per folder.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub last_modified: DateTime<Utc>,
    /// Folder names; empty places the document at the output root.
    pub folders: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub updated: usize,
    pub moved: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl SyncStats {
    /// Number of files created, rewritten or removed.
    pub fn changed(&self) -> usize {
        self.added + self.updated + self.moved + self.deleted
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} moved, {} deleted, {} skipped",
            self.added, self.updated, self.moved, self.deleted, self.skipped
        )
    }
}

/// How documents map to file names under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `title.ext` at the root, de-duplicated per run. Identity cannot be
    /// recovered from these names, so nothing is ever moved or deleted.
    Flat { extension: String },
    /// `title_shortid.ext` under each assigned folder, with move detection,
    /// orphan removal and empty-folder pruning.
    FanOut { extension: String },
}

impl Layout {
    pub fn flat(extension: &str) -> Self {
        Layout::Flat {
            extension: extension.to_string(),
        }
    }

    pub fn fan_out(extension: &str) -> Self {
        Layout::FanOut {
            extension: extension.to_string(),
        }
    }
}

pub struct SyncWriter<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    output_dir: PathBuf,
    layout: Layout,
    empty_content: EmptyContent,
    excluded_folders: BTreeSet<String>,
    progress: Option<ProgressBar>,
}

impl<'a, F: FileSystem + ?Sized> SyncWriter<'a, F> {
    pub fn new(fs: &'a F, output_dir: impl Into<PathBuf>) -> Self {
        SyncWriter {
            fs,
            output_dir: output_dir.into(),
            layout: Layout::fan_out("txt"),
            empty_content: EmptyContent::Emit,
            excluded_folders: BTreeSet::new(),
            progress: None,
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_empty_content(mut self, policy: EmptyContent) -> Self {
        self.empty_content = policy;
        self
    }

    /// Folders whose files are removed and which no document is written to.
    /// Names are compared after folder-name sanitizing.
    pub fn with_excluded_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_folders = folders
            .into_iter()
            .map(|folder| sanitize_folder_name(folder.as_ref()))
            .collect();
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reconciles the output tree with `docs`. `valid_ids` must hold every id
    /// that still exists at the source; files of any other id are deleted.
    pub fn sync(&self, docs: &[ExportDocument], valid_ids: &HashSet<String>) -> Result<SyncStats> {
        self.fs
            .create_dir_all(&self.output_dir)
            .map_err(|e| Error::io(&self.output_dir, e))?;

        let stats = match &self.layout {
            Layout::Flat { extension } => self.sync_flat(docs, extension)?,
            Layout::FanOut { extension } => self.sync_fan_out(docs, valid_ids, extension)?,
        };

        if let Some(pb) = &self.progress {
            pb.finish_with_message(stats.to_string());
        }
        info!(
            output = %self.output_dir.display(),
            added = stats.added,
            updated = stats.updated,
            moved = stats.moved,
            deleted = stats.deleted,
            skipped = stats.skipped,
            "sync complete"
        );

        Ok(stats)
    }

    fn sync_flat(&self, docs: &[ExportDocument], extension: &str) -> Result<SyncStats> {
        let mut stats = SyncStats::default();
        let mut names = UniqueNames::new();

        for doc in docs {
            if self.skips(doc) {
                debug!(id = %doc.id, "no content, skipping");
                stats.skipped += 1;
            } else {
                let name = names.claim(&sanitize_filename(doc.title.as_deref(), &doc.id));
                let path = self.output_dir.join(format!("{}.{}", name, extension));
                self.write_if_newer(&path, doc, &mut stats)?;
            }
            self.tick();
        }

        Ok(stats)
    }

    fn sync_fan_out(
        &self,
        docs: &[ExportDocument],
        valid_ids: &HashSet<String>,
        extension: &str,
    ) -> Result<SyncStats> {
        let mut stats = SyncStats::default();

        stats.deleted += self.clear_excluded_folders()?;

        let mut existing = self.scan_existing(extension)?;
        debug!(ids = existing.len(), "indexed existing files");

        let claimed = self.claimed_paths(docs, extension, &existing);
        for doc in docs {
            self.reconcile(doc, extension, &mut existing, &claimed, &mut stats)?;
            self.tick();
        }
        for doc in docs {
            existing.remove(short_id(&doc.id));
        }

        self.sweep_orphans(existing, valid_ids, &mut stats)?;
        self.prune_empty_dirs();

        Ok(stats)
    }

    fn skips(&self, doc: &ExportDocument) -> bool {
        self.empty_content == EmptyContent::Skip && doc.content.trim().is_empty()
    }

    fn tick(&self) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
    }

    /// Maps each short id found in the output tree to the files carrying it.
    fn scan_existing(&self, extension: &str) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        let mut existing: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

        let files = self
            .fs
            .files_under(&self.output_dir)
            .map_err(|e| Error::io(&self.output_dir, e))?;

        for path in files {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if is_partial_write(name) {
                debug!(path = %path.display(), "removing interrupted write");
                self.remove(&path)?;
                continue;
            }
            if let Some(id) = extract_short_id(name, extension) {
                existing.entry(id.to_string()).or_default().push(path);
            }
        }

        Ok(existing)
    }

    fn target_paths(&self, doc: &ExportDocument, extension: &str) -> Vec<PathBuf> {
        let filename = fanout_filename(doc.title.as_deref(), &doc.id, extension);

        if doc.folders.is_empty() {
            return vec![self.output_dir.join(filename)];
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        for folder in doc.folders.iter().map(|folder| sanitize_folder_name(folder)) {
            if self.excluded_folders.contains(&folder) {
                continue;
            }
            let path = self.output_dir.join(folder).join(&filename);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// Paths that must survive this run: every target of a written document,
    /// plus the existing files of documents skipped for lack of content.
    /// Documents sharing a short id never remove each other's files.
    fn claimed_paths(
        &self,
        docs: &[ExportDocument],
        extension: &str,
        existing: &BTreeMap<String, Vec<PathBuf>>,
    ) -> HashSet<PathBuf> {
        let mut claimed = HashSet::new();
        for doc in docs {
            if self.skips(doc) {
                if let Some(paths) = existing.get(short_id(&doc.id)) {
                    claimed.extend(paths.iter().cloned());
                }
            } else {
                claimed.extend(self.target_paths(doc, extension));
            }
        }
        claimed
    }

    fn reconcile(
        &self,
        doc: &ExportDocument,
        extension: &str,
        existing: &mut BTreeMap<String, Vec<PathBuf>>,
        claimed: &HashSet<PathBuf>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        if self.skips(doc) {
            debug!(id = %doc.id, "no content, leaving existing files");
            stats.skipped += 1;
            return Ok(());
        }

        let known = existing.entry(short_id(&doc.id).to_string()).or_default();

        for target in self.target_paths(doc, extension) {
            if known.contains(&target) {
                self.write_if_newer(&target, doc, stats)?;
            } else {
                self.write(&target, doc)?;
                debug!(path = %target.display(), "added");
                stats.added += 1;
                known.push(target);
            }
        }

        let (kept, stale): (Vec<PathBuf>, Vec<PathBuf>) =
            known.drain(..).partition(|path| claimed.contains(path));
        *known = kept;

        for path in stale {
            self.remove(&path)?;
            debug!(path = %path.display(), "removed from old folder");
            stats.moved += 1;
        }

        Ok(())
    }

    /// Writes `doc` to `path` when the file is missing or strictly older than
    /// the document.
    fn write_if_newer(
        &self,
        path: &Path,
        doc: &ExportDocument,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let modified = self.fs.modified(path).map_err(|e| Error::io(path, e))?;

        match modified {
            None => {
                self.write(path, doc)?;
                debug!(path = %path.display(), "added");
                stats.added += 1;
            }
            Some(file_time) if doc.last_modified > DateTime::<Utc>::from(file_time) => {
                self.write(path, doc)?;
                debug!(path = %path.display(), "updated");
                stats.updated += 1;
            }
            Some(_) => stats.skipped += 1,
        }

        Ok(())
    }

    fn write(&self, path: &Path, doc: &ExportDocument) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.fs
                .create_dir_all(parent)
                .map_err(|e| Error::io(parent, e))?;
        }
        self.fs
            .write(path, doc.content.as_bytes())
            .map_err(|e| Error::io(path, e))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.fs.remove_file(path).map_err(|e| Error::io(path, e))
    }

    fn clear_excluded_folders(&self) -> Result<usize> {
        let mut deleted = 0;

        for folder in &self.excluded_folders {
            let dir = self.output_dir.join(sanitize_folder_name(folder));
            if !self.fs.is_dir(&dir) {
                continue;
            }

            debug!(path = %dir.display(), "clearing excluded folder");
            for path in self.fs.files_under(&dir).map_err(|e| Error::io(&dir, e))? {
                self.remove(&path)?;
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    fn sweep_orphans(
        &self,
        existing: BTreeMap<String, Vec<PathBuf>>,
        valid_ids: &HashSet<String>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let valid: HashSet<&str> = valid_ids.iter().map(|id| short_id(id)).collect();

        for (id, paths) in existing {
            if valid.contains(id.as_str()) {
                continue;
            }
            for path in paths {
                debug!(path = %path.display(), id = %id, "deleting orphan");
                self.remove(&path)?;
                stats.deleted += 1;
            }
        }

        Ok(())
    }

    /// Removes empty directories below the output root. Failures only cost
    /// tidiness, so they are logged and ignored.
    fn prune_empty_dirs(&self) {
        let dirs = match self.fs.dirs_under(&self.output_dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(error = %e, "failed to list folders for cleanup");
                return;
            }
        };

        for dir in dirs {
            match self.fs.is_empty_dir(&dir) {
                Ok(true) => match self.fs.remove_dir(&dir) {
                    Ok(()) => debug!(path = %dir.display(), "removed empty folder"),
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "failed to remove empty folder")
                    }
                },
                Ok(false) => {}
                Err(e) => warn!(path = %dir.display(), error = %e, "failed to inspect folder"),
            }
        }
    }
}
