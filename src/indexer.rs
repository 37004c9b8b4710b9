//! Builds the SQLite index from a `DefaultQuests` export.
//!
//! A run happens in four phases inside one transaction:
//!
//! 1. quest lines, in manifest order;
//! 2. quests with their tasks and rewards;
//! 3. quest placements inside quest lines;
//! 4. prerequisite edges.
//!
//! Cross references are resolved through surrogate ids recorded in phases 1
//! and 2, so they are only linked once every quest row exists. Quest files
//! are read again in phase 4 instead of keeping every parsed document in
//! memory. Nothing is committed unless all four phases succeed.

use crate::db;
use crate::error::IndexError;
use crate::layout::{self, QUEST_LINE_META_FILE, QuestLayout};
use crate::model::{ManifestEntry, QuestId, QuestLine};
use crate::nbt_norm::parse_document_file;
use crate::parser;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How many warnings front ends show before summarising the rest.
pub const DEFAULT_WARNING_DISPLAY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// SQLite file to write; created if missing.
    pub db_path: PathBuf,
    /// The `DefaultQuests` directory.
    pub quest_root: PathBuf,
    /// Clear all quest tables before indexing.
    #[serde(default)]
    pub force: bool,
}

impl IndexOptions {
    pub fn new(db_path: impl Into<PathBuf>, quest_root: impl Into<PathBuf>) -> Self {
        IndexOptions {
            db_path: db_path.into(),
            quest_root: quest_root.into(),
            force: false,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Clearing,
    QuestLines,
    Quests,
    QuestPositions,
    Prerequisites,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Clearing => "Clearing existing data",
            Phase::QuestLines => "Indexing quest lines",
            Phase::Quests => "Indexing quests",
            Phase::QuestPositions => "Linking quest positions",
            Phase::Prerequisites => "Linking prerequisites",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives `(phase, completed, total)` at the start of each phase and after
/// every unit of work. Called synchronously on the indexing thread.
pub trait ProgressObserver {
    fn on_progress(&mut self, phase: Phase, completed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: FnMut(Phase, usize, usize),
{
    fn on_progress(&mut self, phase: Phase, completed: usize, total: usize) {
        self(phase, completed, total)
    }
}

/// Observer that ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _phase: Phase, _completed: usize, _total: usize) {}
}

/// A file that was skipped or only partly used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexResult {
    pub quest_line_count: usize,
    pub quest_count: usize,
    pub warnings: Vec<IndexWarning>,
}

impl IndexResult {
    /// The first `limit` warnings, plus a `... and N more` line if any were
    /// left out.
    pub fn warning_summary(&self, limit: usize) -> Vec<String> {
        let mut lines: Vec<String> = self
            .warnings
            .iter()
            .take(limit)
            .map(ToString::to_string)
            .collect();
        if self.warnings.len() > limit {
            lines.push(format!("... and {} more", self.warnings.len() - limit));
        }
        lines
    }
}

pub fn index_quests(options: &IndexOptions) -> Result<IndexResult, IndexError> {
    index_quests_with_progress(options, &mut NoProgress)
}

/// Index `options.quest_root` into `options.db_path`.
///
/// Missing directories or manifest are reported before the database is
/// touched. Per-file problems become warnings on the result. Any other
/// failure rolls the whole run back.
pub fn index_quests_with_progress<P>(
    options: &IndexOptions,
    progress: &mut P,
) -> Result<IndexResult, IndexError>
where
    P: ProgressObserver + ?Sized,
{
    let layout = QuestLayout::open(&options.quest_root)?;
    let manifest = layout.read_manifest()?;
    let line_dirs = layout.quest_line_dirs()?;
    let quest_files = layout.quest_files()?;
    info!(
        root = %layout.root.display(),
        db = %options.db_path.display(),
        quest_lines = manifest.len(),
        quest_files = quest_files.len(),
        force = options.force,
        "indexing quests"
    );

    let mut conn = db::open_database(&options.db_path)?;
    let tx = conn.transaction()?;
    db::initialize_schema(&tx)?;

    let result = {
        let mut run = IndexRun::new(&tx, progress);
        if options.force {
            run.clear()?;
        }
        run.index_quest_lines(&manifest, &line_dirs)?;
        let indexed = run.index_quests(&quest_files)?;
        run.link_quest_positions(&manifest, &line_dirs)?;
        run.link_prerequisites(&indexed)?;
        run.into_result()
    };

    tx.commit()?;
    info!(
        quest_lines = result.quest_line_count,
        quests = result.quest_count,
        warnings = result.warnings.len(),
        "indexing complete"
    );
    Ok(result)
}

/// State owned by one indexing run: the surrogate id maps and the warnings.
struct IndexRun<'a, P: ?Sized> {
    conn: &'a Connection,
    progress: &'a mut P,
    quest_line_ids: HashMap<String, i64>,
    quest_ids: HashMap<QuestId, i64>,
    quest_ids_by_external: HashMap<String, i64>,
    warnings: Vec<IndexWarning>,
}

impl<'a, P: ProgressObserver + ?Sized> IndexRun<'a, P> {
    fn new(conn: &'a Connection, progress: &'a mut P) -> Self {
        IndexRun {
            conn,
            progress,
            quest_line_ids: HashMap::new(),
            quest_ids: HashMap::new(),
            quest_ids_by_external: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn report(&mut self, phase: Phase, completed: usize, total: usize) {
        self.progress.on_progress(phase, completed, total);
    }

    fn record_warning(&mut self, path: &Path, reason: impl fmt::Display) {
        let reason = reason.to_string();
        warn!(path = %path.display(), "{reason}");
        self.warnings.push(IndexWarning {
            path: path.to_path_buf(),
            reason,
        });
    }

    fn clear(&mut self) -> Result<(), IndexError> {
        self.report(Phase::Clearing, 0, 1);
        db::clear_quest_tables(self.conn)?;
        debug!("cleared quest tables");
        self.report(Phase::Clearing, 1, 1);
        Ok(())
    }

    fn index_quest_lines(
        &mut self,
        manifest: &[ManifestEntry],
        dirs: &[PathBuf],
    ) -> Result<(), IndexError> {
        let total = manifest.len();
        self.report(Phase::QuestLines, 0, total);
        for (i, entry) in manifest.iter().enumerate() {
            let line = match layout::find_quest_line_dir(dirs, &entry.external_id) {
                Some(dir) => match parser::parse_quest_line_dir(dir, entry) {
                    Ok(line) => line,
                    Err(e) => {
                        self.record_warning(&dir.join(QUEST_LINE_META_FILE), e);
                        QuestLine::from_manifest(entry)
                    }
                },
                None => {
                    debug!(id = %entry.external_id, "no directory for quest line");
                    QuestLine::from_manifest(entry)
                }
            };
            let db_id = db::insert_quest_line(self.conn, &line)?;
            self.quest_line_ids.insert(line.external_id, db_id);
            self.report(Phase::QuestLines, i + 1, total);
        }
        debug!(count = self.quest_line_ids.len(), "quest lines indexed");
        Ok(())
    }

    /// Inserts every quest file that maps cleanly and returns those files;
    /// the rest become warnings and take no further part in the run.
    fn index_quests(&mut self, files: &[PathBuf]) -> Result<Vec<PathBuf>, IndexError> {
        let total = files.len();
        self.report(Phase::Quests, 0, total);
        let mut indexed = Vec::with_capacity(total);
        for (i, path) in files.iter().enumerate() {
            match parser::parse_quest_from_file(path) {
                Ok(quest) => {
                    let db_id = db::insert_quest(self.conn, &quest)?;
                    self.quest_ids.insert(quest.id, db_id);
                    self.quest_ids_by_external.insert(quest.external_id, db_id);
                    indexed.push(path.clone());
                }
                Err(e) => self.record_warning(path, e),
            }
            self.report(Phase::Quests, i + 1, total);
        }
        debug!(
            by_composite_id = self.quest_ids.len(),
            by_external_id = self.quest_ids_by_external.len(),
            "quests indexed"
        );
        Ok(indexed)
    }

    fn link_quest_positions(
        &mut self,
        manifest: &[ManifestEntry],
        dirs: &[PathBuf],
    ) -> Result<(), IndexError> {
        let total = manifest.len();
        self.report(Phase::QuestPositions, 0, total);
        for (i, entry) in manifest.iter().enumerate() {
            let line_id = self.quest_line_ids.get(&entry.external_id).copied();
            let dir = layout::find_quest_line_dir(dirs, &entry.external_id);
            if let (Some(line_id), Some(dir)) = (line_id, dir) {
                for file in layout::quest_line_entry_files(dir)? {
                    self.link_entry(line_id, &file)?;
                }
            }
            self.report(Phase::QuestPositions, i + 1, total);
        }
        Ok(())
    }

    fn link_entry(&mut self, line_id: i64, file: &Path) -> Result<(), IndexError> {
        let root = match parse_document_file(file) {
            Ok(root) => root,
            Err(e) => {
                self.record_warning(file, e);
                return Ok(());
            }
        };
        let entry = parser::parse_quest_line_entry(&root);
        let quest_db_id = match entry.quest_id {
            Some(qid) => match self.quest_ids.get(&qid) {
                Some(&id) => id,
                None => {
                    debug!(
                        quest = %qid,
                        file = %file.display(),
                        "dropping entry for unknown quest"
                    );
                    return Ok(());
                }
            },
            // Entry files are named after their quest, like quest files.
            None => match self
                .quest_ids_by_external
                .get(&parser::quest_external_id(file))
            {
                Some(&id) => id,
                None => {
                    self.record_warning(file, "entry has no resolvable quest id");
                    return Ok(());
                }
            },
        };
        db::link_quest_line_entry(self.conn, line_id, quest_db_id, &entry)?;
        Ok(())
    }

    fn link_prerequisites(&mut self, files: &[PathBuf]) -> Result<(), IndexError> {
        let total = files.len();
        self.report(Phase::Prerequisites, 0, total);
        let mut linked = 0usize;
        let mut dropped = 0usize;
        for (i, path) in files.iter().enumerate() {
            let links = match parse_document_file(path)
                .and_then(|root| parser::parse_quest_links(&root))
            {
                Ok(links) => links,
                Err(e) => {
                    self.record_warning(path, e);
                    self.report(Phase::Prerequisites, i + 1, total);
                    continue;
                }
            };
            if let Some(&quest_db_id) = self.quest_ids.get(&links.id) {
                for prereq in &links.prerequisites {
                    match self.quest_ids.get(prereq) {
                        Some(&prereq_db_id) => {
                            if db::link_prerequisite(self.conn, quest_db_id, prereq_db_id)? {
                                linked += 1;
                            }
                        }
                        None => {
                            dropped += 1;
                            debug!(
                                quest = %links.id,
                                prerequisite = %prereq,
                                "dropping unresolved prerequisite"
                            );
                        }
                    }
                }
            }
            self.report(Phase::Prerequisites, i + 1, total);
        }
        debug!(linked, dropped, "prerequisites linked");
        Ok(())
    }

    fn into_result(self) -> IndexResult {
        IndexResult {
            quest_line_count: self.quest_line_ids.len(),
            quest_count: self.quest_ids.len(),
            warnings: self.warnings,
        }
    }
}
