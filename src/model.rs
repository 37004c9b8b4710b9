use serde::{Deserialize, Serialize};

pub use crate::quest_id::QuestId;

/// Default quest and task logic when a document does not declare one.
pub const DEFAULT_LOGIC: &str = "AND";
/// Default visibility for quests and quest lines.
pub const DEFAULT_VISIBILITY: &str = "NORMAL";
/// Repeat interval meaning "not repeatable".
pub const NO_REPEAT: i32 = -1;
/// Type tag used when a task, reward, item or entity omits its id.
pub const UNKNOWN_ID: &str = "unknown";
/// Default node size in the quest line view.
pub const DEFAULT_ENTRY_SIZE: i32 = 24;

/// One line of `QuestLinesOrder.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// 1-based line number in the manifest.
    pub order: i64,
    pub external_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestLine {
    pub external_id: String,
    pub display_order: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon_item_id: Option<String>,
    pub icon_damage: i32,
    pub visibility: String,
}

impl QuestLine {
    /// Row used when a quest line has no readable metadata file.
    pub fn from_manifest(entry: &ManifestEntry) -> Self {
        QuestLine {
            external_id: entry.external_id.clone(),
            display_order: entry.order,
            name: entry.display_name.clone(),
            description: None,
            icon_item_id: None,
            icon_damage: 0,
            visibility: DEFAULT_VISIBILITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
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
    #[serde(default)]
    pub prerequisites: Vec<QuestId>,
    #[serde(default)]
    pub tasks: Vec<QuestTask>,
    #[serde(default)]
    pub rewards: Vec<QuestReward>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: String,
    pub count: i32,
    pub damage: i32,
    pub ore_dict: Option<String>,
    /// The item's `tag` compound as compact JSON.
    pub nbt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTarget {
    pub entity_id: String,
    pub count: i32,
    pub ignore_nbt: bool,
    pub subtypes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestTask {
    pub index: i32,
    pub task_type: String,
    pub consume: bool,
    pub ignore_nbt: bool,
    pub partial_match: bool,
    #[serde(default)]
    pub required_items: Vec<ItemStack>,
    #[serde(default)]
    pub required_entities: Vec<EntityTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestReward {
    pub index: i32,
    pub reward_type: String,
    #[serde(default)]
    pub items: Vec<ItemStack>,
}

/// A quest's placement inside a quest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestLineEntry {
    pub quest_id: Option<QuestId>,
    pub x: i32,
    pub y: i32,
    pub size_x: i32,
    pub size_y: i32,
}

/// The parts of a quest document needed to link prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestLinks {
    pub id: QuestId,
    pub prerequisites: Vec<QuestId>,
}
