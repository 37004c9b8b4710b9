//! BetterQuesting quest index: load a `DefaultQuests` export into SQLite
//!
//! BetterQuesting writes quests as JSON documents whose keys carry NBT type
//! suffixes (`"name:8"`, `"tasks:9"`), with lists stored as numeric-keyed
//! objects. This crate decodes those documents into a typed tree, maps them to
//! quest lines, quests, tasks and rewards, and writes them into a relational
//! store with full-text search over names and descriptions. Prerequisites and
//! quest line placements are resolved across files once every quest row
//! exists.
//!
//! Basic example (no-run):
//!
//! ```rust,no_run
//! use better_questing_index::{IndexOptions, index_quests};
//!
//! let opts = IndexOptions::new("gtnh.db", "config/betterquesting/DefaultQuests").force(true);
//! let result = index_quests(&opts)?;
//! println!("{} quest lines, {} quests", result.quest_line_count, result.quest_count);
//! # Ok::<(), better_questing_index::IndexError>(())
//! ```

pub mod db;
pub mod error;
pub mod indexer;
pub mod layout;
pub mod model;
pub mod nbt;
pub mod nbt_norm;
pub mod parser;
pub mod quest_id;

pub use crate::error::*;
pub use crate::indexer::*;
pub use crate::model::*;
pub use crate::nbt::{NbtCompound, NbtValue};
pub use crate::nbt_norm::{parse_document, parse_document_file, parse_document_reader};
pub use crate::parser::{parse_quest_from_compound, parse_quest_from_file, parse_quest_from_reader};
