//! SQLite store for indexed quest data.
//!
//! Surrogate ids are `INTEGER PRIMARY KEY AUTOINCREMENT` columns; everything
//! below `quest_lines` and `quests` cascades on delete. Two FTS5
//! external-content tables mirror quest and quest line names/descriptions and
//! are kept current by triggers.

use crate::error::IndexError;
use crate::model::*;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS quest_lines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    base64_id TEXT NOT NULL UNIQUE,
    display_order INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    icon_item_id TEXT,
    icon_damage INTEGER DEFAULT 0,
    visibility TEXT DEFAULT 'NORMAL'
);

CREATE TABLE IF NOT EXISTS quests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    base64_id TEXT NOT NULL UNIQUE,
    quest_id_high INTEGER NOT NULL,
    quest_id_low INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    icon_item_id TEXT,
    icon_damage INTEGER DEFAULT 0,
    is_main INTEGER DEFAULT 0,
    quest_logic TEXT DEFAULT 'AND',
    task_logic TEXT DEFAULT 'AND',
    visibility TEXT DEFAULT 'NORMAL',
    repeat_time INTEGER DEFAULT -1,
    UNIQUE(quest_id_high, quest_id_low)
);

CREATE TABLE IF NOT EXISTS quest_line_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quest_line_id INTEGER NOT NULL,
    quest_id INTEGER NOT NULL,
    x_position INTEGER NOT NULL,
    y_position INTEGER NOT NULL,
    size_x INTEGER DEFAULT 24,
    size_y INTEGER DEFAULT 24,
    FOREIGN KEY (quest_line_id) REFERENCES quest_lines(id) ON DELETE CASCADE,
    FOREIGN KEY (quest_id) REFERENCES quests(id) ON DELETE CASCADE,
    UNIQUE(quest_line_id, quest_id)
);

CREATE TABLE IF NOT EXISTS quest_prerequisites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quest_id INTEGER NOT NULL,
    prerequisite_quest_id INTEGER NOT NULL,
    FOREIGN KEY (quest_id) REFERENCES quests(id) ON DELETE CASCADE,
    FOREIGN KEY (prerequisite_quest_id) REFERENCES quests(id) ON DELETE CASCADE,
    UNIQUE(quest_id, prerequisite_quest_id)
);

CREATE TABLE IF NOT EXISTS quest_tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quest_id INTEGER NOT NULL,
    task_index INTEGER NOT NULL,
    task_type TEXT NOT NULL,
    consume INTEGER DEFAULT 0,
    ignore_nbt INTEGER DEFAULT 0,
    partial_match INTEGER DEFAULT 0,
    FOREIGN KEY (quest_id) REFERENCES quests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS task_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL,
    item_index INTEGER NOT NULL,
    item_id TEXT NOT NULL,
    count INTEGER DEFAULT 1,
    damage INTEGER DEFAULT 0,
    ore_dict TEXT,
    nbt TEXT,
    FOREIGN KEY (task_id) REFERENCES quest_tasks(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS task_entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL,
    entity_index INTEGER NOT NULL,
    entity_id TEXT NOT NULL,
    count INTEGER DEFAULT 1,
    ignore_nbt INTEGER DEFAULT 0,
    subtypes INTEGER DEFAULT 1,
    FOREIGN KEY (task_id) REFERENCES quest_tasks(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS quest_rewards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quest_id INTEGER NOT NULL,
    reward_index INTEGER NOT NULL,
    reward_type TEXT NOT NULL,
    FOREIGN KEY (quest_id) REFERENCES quests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS reward_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reward_id INTEGER NOT NULL,
    item_index INTEGER NOT NULL,
    item_id TEXT NOT NULL,
    count INTEGER DEFAULT 1,
    damage INTEGER DEFAULT 0,
    ore_dict TEXT,
    nbt TEXT,
    FOREIGN KEY (reward_id) REFERENCES quest_rewards(id) ON DELETE CASCADE
);

CREATE VIRTUAL TABLE IF NOT EXISTS quests_fts USING fts5(
    name,
    description,
    content='quests',
    content_rowid='id'
);

CREATE VIRTUAL TABLE IF NOT EXISTS quest_lines_fts USING fts5(
    name,
    description,
    content='quest_lines',
    content_rowid='id'
);

CREATE INDEX IF NOT EXISTS idx_quests_name ON quests(name);
CREATE INDEX IF NOT EXISTS idx_quests_is_main ON quests(is_main);
CREATE INDEX IF NOT EXISTS idx_quest_line_entries_quest ON quest_line_entries(quest_id);
CREATE INDEX IF NOT EXISTS idx_quest_line_entries_line ON quest_line_entries(quest_line_id);
CREATE INDEX IF NOT EXISTS idx_quest_prerequisites_quest ON quest_prerequisites(quest_id);
CREATE INDEX IF NOT EXISTS idx_quest_prerequisites_prereq ON quest_prerequisites(prerequisite_quest_id);
CREATE INDEX IF NOT EXISTS idx_quest_tasks_quest ON quest_tasks(quest_id);
CREATE INDEX IF NOT EXISTS idx_quest_tasks_type ON quest_tasks(task_type);
CREATE INDEX IF NOT EXISTS idx_task_items_task ON task_items(task_id);
CREATE INDEX IF NOT EXISTS idx_task_items_item ON task_items(item_id);
CREATE INDEX IF NOT EXISTS idx_task_entities_task ON task_entities(task_id);
CREATE INDEX IF NOT EXISTS idx_quest_rewards_quest ON quest_rewards(quest_id);
CREATE INDEX IF NOT EXISTS idx_reward_items_reward ON reward_items(reward_id);
CREATE INDEX IF NOT EXISTS idx_reward_items_item ON reward_items(item_id);

CREATE TRIGGER IF NOT EXISTS quests_fts_insert AFTER INSERT ON quests BEGIN
    INSERT INTO quests_fts(rowid, name, description) VALUES (NEW.id, NEW.name, NEW.description);
END;

CREATE TRIGGER IF NOT EXISTS quests_fts_delete AFTER DELETE ON quests BEGIN
    INSERT INTO quests_fts(quests_fts, rowid, name, description) VALUES ('delete', OLD.id, OLD.name, OLD.description);
END;

CREATE TRIGGER IF NOT EXISTS quests_fts_update AFTER UPDATE ON quests BEGIN
    INSERT INTO quests_fts(quests_fts, rowid, name, description) VALUES ('delete', OLD.id, OLD.name, OLD.description);
    INSERT INTO quests_fts(rowid, name, description) VALUES (NEW.id, NEW.name, NEW.description);
END;

CREATE TRIGGER IF NOT EXISTS quest_lines_fts_insert AFTER INSERT ON quest_lines BEGIN
    INSERT INTO quest_lines_fts(rowid, name, description) VALUES (NEW.id, NEW.name, NEW.description);
END;

CREATE TRIGGER IF NOT EXISTS quest_lines_fts_delete AFTER DELETE ON quest_lines BEGIN
    INSERT INTO quest_lines_fts(quest_lines_fts, rowid, name, description) VALUES ('delete', OLD.id, OLD.name, OLD.description);
END;

CREATE TRIGGER IF NOT EXISTS quest_lines_fts_update AFTER UPDATE ON quest_lines BEGIN
    INSERT INTO quest_lines_fts(quest_lines_fts, rowid, name, description) VALUES ('delete', OLD.id, OLD.name, OLD.description);
    INSERT INTO quest_lines_fts(rowid, name, description) VALUES (NEW.id, NEW.name, NEW.description);
END;
"#;

/// Quest tables in child-to-parent order, the order they must be cleared in.
pub const QUEST_TABLES: [&str; 9] = [
    "reward_items",
    "quest_rewards",
    "task_entities",
    "task_items",
    "quest_tasks",
    "quest_prerequisites",
    "quest_line_entries",
    "quests",
    "quest_lines",
];

/// Open (creating if needed) the database file with foreign keys enforced.
pub fn open_database(path: &Path) -> Result<Connection, IndexError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// Create every table, FTS mirror, trigger and index that is not there yet.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

pub fn clear_quest_tables(conn: &Connection) -> rusqlite::Result<()> {
    for table in QUEST_TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
    }
    Ok(())
}

pub fn insert_quest_line(conn: &Connection, line: &QuestLine) -> rusqlite::Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO quest_lines (base64_id, display_order, name, description, icon_item_id, icon_damage, visibility)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![
        line.external_id,
        line.display_order,
        line.name,
        line.description,
        line.icon_item_id,
        line.icon_damage,
        line.visibility,
    ])?;
    Ok(conn.last_insert_rowid())
}

/// Insert a quest together with its tasks, task items, task entities,
/// rewards and reward items. Returns the quest's surrogate id.
pub fn insert_quest(conn: &Connection, quest: &Quest) -> rusqlite::Result<i64> {
    conn.prepare_cached(
        "INSERT INTO quests (base64_id, quest_id_high, quest_id_low, name, description,
             icon_item_id, icon_damage, is_main, quest_logic, task_logic, visibility, repeat_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?
    .execute(params![
        quest.external_id,
        quest.id.high,
        quest.id.low,
        quest.name,
        quest.description,
        quest.icon_item_id,
        quest.icon_damage,
        quest.is_main,
        quest.quest_logic,
        quest.task_logic,
        quest.visibility,
        quest.repeat_time,
    ])?;
    let quest_db_id = conn.last_insert_rowid();

    for task in &quest.tasks {
        conn.prepare_cached(
            "INSERT INTO quest_tasks (quest_id, task_index, task_type, consume, ignore_nbt, partial_match)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![
            quest_db_id,
            task.index,
            task.task_type,
            task.consume,
            task.ignore_nbt,
            task.partial_match,
        ])?;
        let task_db_id = conn.last_insert_rowid();

        for (idx, item) in task.required_items.iter().enumerate() {
            insert_item(conn, "task_items", "task_id", task_db_id, idx, item)?;
        }
        let mut entity_stmt = conn.prepare_cached(
            "INSERT INTO task_entities (task_id, entity_index, entity_id, count, ignore_nbt, subtypes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (idx, entity) in task.required_entities.iter().enumerate() {
            entity_stmt.execute(params![
                task_db_id,
                idx as i64,
                entity.entity_id,
                entity.count,
                entity.ignore_nbt,
                entity.subtypes,
            ])?;
        }
    }

    for reward in &quest.rewards {
        conn.prepare_cached(
            "INSERT INTO quest_rewards (quest_id, reward_index, reward_type) VALUES (?1, ?2, ?3)",
        )?
        .execute(params![quest_db_id, reward.index, reward.reward_type])?;
        let reward_db_id = conn.last_insert_rowid();

        for (idx, item) in reward.items.iter().enumerate() {
            insert_item(conn, "reward_items", "reward_id", reward_db_id, idx, item)?;
        }
    }

    Ok(quest_db_id)
}

fn insert_item(
    conn: &Connection,
    table: &str,
    owner_column: &str,
    owner_id: i64,
    index: usize,
    item: &ItemStack,
) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO {table} ({owner_column}, item_index, item_id, count, damage, ore_dict, nbt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    );
    conn.prepare_cached(&sql)?.execute(params![
        owner_id,
        index as i64,
        item.item_id,
        item.count,
        item.damage,
        item.ore_dict,
        item.nbt,
    ])?;
    Ok(())
}

/// Place a quest in a quest line. Returns false when the pair already exists.
pub fn link_quest_line_entry(
    conn: &Connection,
    quest_line_id: i64,
    quest_id: i64,
    entry: &QuestLineEntry,
) -> rusqlite::Result<bool> {
    let changed = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO quest_line_entries (quest_line_id, quest_id, x_position, y_position, size_x, size_y)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![
            quest_line_id,
            quest_id,
            entry.x,
            entry.y,
            entry.size_x,
            entry.size_y
        ])?;
    Ok(changed > 0)
}

/// Record that `quest_id` requires `prerequisite_id`. Returns false when the
/// edge already exists.
pub fn link_prerequisite(
    conn: &Connection,
    quest_id: i64,
    prerequisite_id: i64,
) -> rusqlite::Result<bool> {
    let changed = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO quest_prerequisites (quest_id, prerequisite_quest_id) VALUES (?1, ?2)",
        )?
        .execute(params![quest_id, prerequisite_id])?;
    Ok(changed > 0)
}

/// Row counts of every quest table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub quest_lines: i64,
    pub quests: i64,
    pub quest_line_entries: i64,
    pub quest_prerequisites: i64,
    pub quest_tasks: i64,
    pub task_items: i64,
    pub task_entities: i64,
    pub quest_rewards: i64,
    pub reward_items: i64,
}

pub fn table_counts(conn: &Connection) -> rusqlite::Result<TableCounts> {
    let count = |table: &str| -> rusqlite::Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    };
    Ok(TableCounts {
        quest_lines: count("quest_lines")?,
        quests: count("quests")?,
        quest_line_entries: count("quest_line_entries")?,
        quest_prerequisites: count("quest_prerequisites")?,
        quest_tasks: count("quest_tasks")?,
        task_items: count("task_items")?,
        task_entities: count("task_entities")?,
        quest_rewards: count("quest_rewards")?,
        reward_items: count("reward_items")?,
    })
}

/// True when quests or quest lines are already stored, i.e. a non-forced
/// index run would collide with existing rows.
pub fn is_populated(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM quests) OR EXISTS (SELECT 1 FROM quest_lines)",
        [],
        |row| row.get(0),
    )
}

/// A stored quest row, without its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestRow {
    pub db_id: i64,
    pub external_id: String,
    pub id: QuestId,
    pub name: String,
    pub description: Option<String>,
    pub icon_item_id: Option<String>,
    pub icon_damage: i32,
    pub is_main: bool,
    pub quest_logic: String,
    pub task_logic: String,
    pub visibility: String,
    pub repeat_time: i32,
}

pub fn find_quest(conn: &Connection, id: QuestId) -> rusqlite::Result<Option<QuestRow>> {
    conn.query_row(
        "SELECT id, base64_id, quest_id_high, quest_id_low, name, description, icon_item_id,
                icon_damage, is_main, quest_logic, task_logic, visibility, repeat_time
         FROM quests WHERE quest_id_high = ?1 AND quest_id_low = ?2",
        params![id.high, id.low],
        |row| {
            Ok(QuestRow {
                db_id: row.get(0)?,
                external_id: row.get(1)?,
                id: QuestId::from_parts(row.get(2)?, row.get(3)?),
                name: row.get(4)?,
                description: row.get(5)?,
                icon_item_id: row.get(6)?,
                icon_damage: row.get(7)?,
                is_main: row.get(8)?,
                quest_logic: row.get(9)?,
                task_logic: row.get(10)?,
                visibility: row.get(11)?,
                repeat_time: row.get(12)?,
            })
        },
    )
    .optional()
}

/// A full-text search match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub db_id: i64,
    pub name: String,
}

/// FTS5 match over quest names and descriptions, best match first.
pub fn search_quests(conn: &Connection, query: &str) -> rusqlite::Result<Vec<SearchHit>> {
    search(conn, "quests_fts", query)
}

pub fn search_quest_lines(conn: &Connection, query: &str) -> rusqlite::Result<Vec<SearchHit>> {
    search(conn, "quest_lines_fts", query)
}

fn search(conn: &Connection, fts_table: &str, query: &str) -> rusqlite::Result<Vec<SearchHit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT rowid, name FROM {fts_table} WHERE {fts_table} MATCH ?1 ORDER BY rank"
    ))?;
    let hits = stmt
        .query_map(params![query], |row| {
            Ok(SearchHit {
                db_id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(hits)
}
