//! On-disk layout of a `DefaultQuests` export.
//!
//! ```text
//! DefaultQuests/
//!   QuestLinesOrder.txt          externalId: Display Name, one per line
//!   QuestLines/<name>-<id>/      QuestLine.json + one entry file per quest
//!   Quests/**/<name>-<id>.json   quest documents, any depth
//! ```

use crate::error::IndexError;
use crate::model::ManifestEntry;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = "QuestLinesOrder.txt";
pub const QUEST_LINES_DIR: &str = "QuestLines";
pub const QUESTS_DIR: &str = "Quests";
pub const QUEST_LINE_META_FILE: &str = "QuestLine.json";

/// Validated paths of one quest export.
#[derive(Debug, Clone)]
pub struct QuestLayout {
    pub root: PathBuf,
    pub manifest: PathBuf,
    pub quest_lines_dir: PathBuf,
    pub quests_dir: PathBuf,
}

impl QuestLayout {
    /// Checks that the root, the manifest and both source directories exist.
    pub fn open(root: &Path) -> Result<Self, IndexError> {
        let missing = |what, path: &Path| IndexError::MissingPath {
            what,
            path: path.to_path_buf(),
        };
        if !root.is_dir() {
            return Err(missing("quest directory", root));
        }
        let layout = QuestLayout {
            root: root.to_path_buf(),
            manifest: root.join(MANIFEST_FILE),
            quest_lines_dir: root.join(QUEST_LINES_DIR),
            quests_dir: root.join(QUESTS_DIR),
        };
        if !layout.manifest.is_file() {
            return Err(missing("quest line manifest", &layout.manifest));
        }
        if !layout.quest_lines_dir.is_dir() {
            return Err(missing("quest lines directory", &layout.quest_lines_dir));
        }
        if !layout.quests_dir.is_dir() {
            return Err(missing("quests directory", &layout.quests_dir));
        }
        Ok(layout)
    }

    pub fn read_manifest(&self) -> Result<Vec<ManifestEntry>, IndexError> {
        let text = fs::read_to_string(&self.manifest)?;
        Ok(parse_manifest(&text))
    }

    /// Quest line subdirectories, sorted by name.
    pub fn quest_line_dirs(&self) -> Result<Vec<PathBuf>, IndexError> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.quest_lines_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Every `*.json` file below `Quests/`, at any depth, in path order.
    pub fn quest_files(&self) -> Result<Vec<PathBuf>, IndexError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.quests_dir).follow_links(true) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|e| e == "json")
            {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Parses `QuestLinesOrder.txt`. Each line is split at its first `:`; blank
/// lines and lines without an id are skipped but still count towards the
/// line number used as display order. A leading byte order mark is ignored.
pub fn parse_manifest(text: &str) -> Vec<ManifestEntry> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let (id, name) = line.split_once(':')?;
            let id = id.trim();
            if id.is_empty() {
                return None;
            }
            Some(ManifestEntry {
                order: i as i64 + 1,
                external_id: id.to_string(),
                display_name: name.trim().to_string(),
            })
        })
        .collect()
}

/// The directory for a quest line: its name ends with `-<external_id>`.
pub fn find_quest_line_dir<'a>(dirs: &'a [PathBuf], external_id: &str) -> Option<&'a Path> {
    let suffix = format!("-{external_id}");
    dirs.iter()
        .find(|d| {
            d.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&suffix))
        })
        .map(PathBuf::as_path)
}

/// Entry files of a quest line directory, i.e. every `*.json` except the
/// metadata file, sorted.
pub fn quest_line_entry_files(dir: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let p = entry?.path();
        if p.is_file()
            && p.extension().is_some_and(|s| s == "json")
            && p.file_name().and_then(|n| n.to_str()) != Some(QUEST_LINE_META_FILE)
        {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}
