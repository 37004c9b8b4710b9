use crate::error::{ParseError, Result};
use crate::layout::QUEST_LINE_META_FILE;
use crate::model::*;
use crate::nbt::NbtCompound;
use crate::nbt_norm::{parse_document, parse_document_file};
use std::io::Read;
use std::path::Path;

/// Path from a quest or quest line root to its display properties.
const PROPERTIES_PATH: [&str; 2] = ["properties", "betterquesting"];

/// External id of a quest file: `Stone Age-AbCdEf==.json` -> `AbCdEf==`.
pub fn quest_external_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    match stem.rsplit_once('-') {
        Some((_, id)) => id.to_string(),
        None => stem.into_owned(),
    }
}

pub fn parse_quest_from_reader<R: Read>(mut r: R, external_id: &str) -> Result<Quest> {
    let mut s = String::new();
    r.read_to_string(&mut s)?;
    let root = parse_document(&s)?;
    parse_quest_from_compound(&root, external_id)
}

pub fn parse_quest_from_file(path: &Path) -> Result<Quest> {
    let root = parse_document_file(path)?;
    parse_quest_from_compound(&root, &quest_external_id(path))
}

/// Map a decoded quest document. The composite id and the quest name are
/// required; everything else falls back to the mod's defaults.
pub fn parse_quest_from_compound(root: &NbtCompound, external_id: &str) -> Result<Quest> {
    let high = root
        .get_i64("questIDHigh")
        .ok_or(ParseError::MissingField("questIDHigh"))?;
    let low = root
        .get_i64("questIDLow")
        .ok_or(ParseError::MissingField("questIDLow"))?;

    let props = root.get_path(&PROPERTIES_PATH);
    let name = props
        .and_then(|p| p.get_string("name"))
        .ok_or(ParseError::MissingField("properties.betterquesting.name"))?;
    let icon = props.and_then(|p| p.get_compound("icon"));

    let tasks = root
        .compounds_in("tasks")
        .enumerate()
        .map(|(i, t)| parse_task(t, i))
        .collect::<Result<Vec<_>>>()?;
    let rewards = root
        .compounds_in("rewards")
        .enumerate()
        .map(|(i, r)| parse_reward(r, i))
        .collect::<Result<Vec<_>>>()?;

    Ok(Quest {
        external_id: external_id.to_string(),
        id: QuestId::from_parts(high, low),
        name,
        description: props.and_then(|p| p.get_string("desc")),
        icon_item_id: icon.and_then(|i| i.get_string("id")),
        icon_damage: icon.and_then(|i| i.get_i32("Damage")).unwrap_or(0),
        is_main: props.and_then(|p| p.get_bool("isMain")).unwrap_or(false),
        quest_logic: props
            .and_then(|p| p.get_string("questLogic"))
            .unwrap_or_else(|| DEFAULT_LOGIC.to_string()),
        task_logic: props
            .and_then(|p| p.get_string("taskLogic"))
            .unwrap_or_else(|| DEFAULT_LOGIC.to_string()),
        visibility: props
            .and_then(|p| p.get_string("visibility"))
            .unwrap_or_else(|| DEFAULT_VISIBILITY.to_string()),
        repeat_time: props
            .and_then(|p| p.get_i32("repeatTime"))
            .unwrap_or(NO_REPEAT),
        prerequisites: parse_prerequisites(root),
        tasks,
        rewards,
    })
}

/// Prerequisite references; entries missing either id half are dropped.
fn parse_prerequisites(root: &NbtCompound) -> Vec<QuestId> {
    root.compounds_in("preRequisites")
        .filter_map(QuestId::from_compound)
        .collect()
}

/// Only the id and prerequisite list, for the second pass over quest files.
pub fn parse_quest_links(root: &NbtCompound) -> Result<QuestLinks> {
    let id = QuestId::from_compound(root)
        .ok_or(ParseError::MissingField("questIDHigh/questIDLow"))?;
    Ok(QuestLinks {
        id,
        prerequisites: parse_prerequisites(root),
    })
}

fn list_index(i: usize) -> i32 {
    i32::try_from(i).unwrap_or(i32::MAX)
}

fn parse_task(t: &NbtCompound, position: usize) -> Result<QuestTask> {
    let required_items = t
        .compounds_in("requiredItems")
        .map(parse_item)
        .collect::<Result<Vec<_>>>()?;
    let required_entities = t.compounds_in("required").map(parse_entity).collect();

    Ok(QuestTask {
        index: t.get_i32("index").unwrap_or_else(|| list_index(position)),
        task_type: t
            .get_string("taskID")
            .unwrap_or_else(|| UNKNOWN_ID.to_string()),
        consume: t.get_bool("consume").unwrap_or(false),
        ignore_nbt: t.get_bool("ignoreNBT").unwrap_or(false),
        partial_match: t.get_bool("partialMatch").unwrap_or(false),
        required_items,
        required_entities,
    })
}

fn parse_reward(r: &NbtCompound, position: usize) -> Result<QuestReward> {
    let items = r
        .compounds_in("rewards")
        .map(parse_item)
        .collect::<Result<Vec<_>>>()?;
    Ok(QuestReward {
        index: r.get_i32("index").unwrap_or_else(|| list_index(position)),
        reward_type: r
            .get_string("rewardID")
            .unwrap_or_else(|| UNKNOWN_ID.to_string()),
        items,
    })
}

fn parse_item(item: &NbtCompound) -> Result<ItemStack> {
    let nbt = match item.get_compound("tag") {
        Some(tag) => Some(tag.to_json_string()?),
        None => None,
    };
    Ok(ItemStack {
        item_id: item
            .get_string("id")
            .unwrap_or_else(|| UNKNOWN_ID.to_string()),
        count: item.get_i32("Count").unwrap_or(1),
        damage: item.get_i32("Damage").unwrap_or(0),
        ore_dict: item
            .get_string("OreDict")
            .filter(|s| !s.is_empty()),
        nbt,
    })
}

fn parse_entity(e: &NbtCompound) -> EntityTarget {
    EntityTarget {
        entity_id: e.get_string("id").unwrap_or_else(|| UNKNOWN_ID.to_string()),
        count: e.get_i32("required").unwrap_or(1),
        ignore_nbt: e.get_bool("ignoreNBT").unwrap_or(false),
        subtypes: e.get_bool("subtypes").unwrap_or(true),
    }
}

/// Quest line metadata, falling back to the manifest for anything missing.
pub fn parse_quest_line(root: &NbtCompound, entry: &ManifestEntry) -> QuestLine {
    let props = root.get_path(&PROPERTIES_PATH);
    let icon = props.and_then(|p| p.get_compound("icon"));
    QuestLine {
        external_id: entry.external_id.clone(),
        display_order: entry.order,
        name: props
            .and_then(|p| p.get_string("name"))
            .unwrap_or_else(|| entry.display_name.clone()),
        description: props.and_then(|p| p.get_string("desc")),
        icon_item_id: icon.and_then(|i| i.get_string("id")),
        icon_damage: icon.and_then(|i| i.get_i32("Damage")).unwrap_or(0),
        visibility: props
            .and_then(|p| p.get_string("visibility"))
            .unwrap_or_else(|| DEFAULT_VISIBILITY.to_string()),
    }
}

/// Reads `QuestLine.json` from a quest line directory. A directory without
/// the file yields the manifest-only row; an unreadable file is an error.
pub fn parse_quest_line_dir(dir: &Path, entry: &ManifestEntry) -> Result<QuestLine> {
    let meta = dir.join(QUEST_LINE_META_FILE);
    if !meta.is_file() {
        return Ok(QuestLine::from_manifest(entry));
    }
    let root = parse_document_file(&meta)?;
    Ok(parse_quest_line(&root, entry))
}

pub fn parse_quest_line_entry(root: &NbtCompound) -> QuestLineEntry {
    QuestLineEntry {
        quest_id: QuestId::from_compound(root),
        x: root.get_i32("x").unwrap_or(0),
        y: root.get_i32("y").unwrap_or(0),
        size_x: root.get_i32("sizeX").unwrap_or(DEFAULT_ENTRY_SIZE),
        size_y: root.get_i32("sizeY").unwrap_or(DEFAULT_ENTRY_SIZE),
    }
}

// File-system dependent tests belong in the integration test directory `tests/`.

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_QUEST: &str = r#"{
        "questIDHigh:4": 0,
        "questIDLow:4": 12,
        "properties:10": {
            "betterquesting:10": {
                "name:8": "Iron Age",
                "desc:8": "Smelt some iron.",
                "icon:10": {"id:8": "minecraft:iron_ingot", "Damage:2": 3, "Count:3": 1},
                "isMain:1": 1,
                "questLogic:8": "OR",
                "taskLogic:8": "AND",
                "visibility:8": "CHAIN",
                "repeatTime:3": 72000
            }
        },
        "preRequisites:9": {
            "1:10": {"questIDHigh:4": 0, "questIDLow:4": 11},
            "0:10": {"questIDHigh:4": 0, "questIDLow:4": 10},
            "2:10": {"questIDHigh:4": 0}
        },
        "tasks:9": {
            "0:10": {
                "taskID:8": "bq_standard:retrieval",
                "index:3": 0,
                "consume:1": 1,
                "partialMatch:1": 1,
                "requiredItems:9": {
                    "0:10": {
                        "id:8": "minecraft:iron_ingot",
                        "Count:3": 16,
                        "Damage:2": 0,
                        "OreDict:8": "",
                        "tag:10": {"display:10": {"Name:8": "Shiny"}}
                    }
                }
            },
            "1:10": {
                "taskID:8": "bq_standard:hunt",
                "required:9": {
                    "0:10": {"id:8": "Zombie", "required:3": 5, "subtypes:1": 0}
                }
            }
        },
        "rewards:9": {
            "0:10": {
                "rewardID:8": "bq_standard:item",
                "rewards:9": {"0:10": {"id:8": "minecraft:bread", "Count:3": 4, "OreDict:8": "foodBread"}}
            }
        }
    }"#;

    #[test]
    fn full_quest_maps_every_field() {
        let root = parse_document(FULL_QUEST).unwrap();
        let q = parse_quest_from_compound(&root, "AAAAAAAAAAAAAAAAAAAADA==").unwrap();

        assert_eq!(q.id, QuestId::from_parts(0, 12));
        assert_eq!(q.external_id, "AAAAAAAAAAAAAAAAAAAADA==");
        assert_eq!(q.name, "Iron Age");
        assert_eq!(q.description.as_deref(), Some("Smelt some iron."));
        assert_eq!(q.icon_item_id.as_deref(), Some("minecraft:iron_ingot"));
        assert_eq!(q.icon_damage, 3);
        assert!(q.is_main);
        assert_eq!(q.quest_logic, "OR");
        assert_eq!(q.visibility, "CHAIN");
        assert_eq!(q.repeat_time, 72000);
        // the entry without questIDLow is dropped, the rest follow list order
        assert_eq!(
            q.prerequisites,
            vec![QuestId::from_parts(0, 10), QuestId::from_parts(0, 11)]
        );

        assert_eq!(q.tasks.len(), 2);
        let retrieval = &q.tasks[0];
        assert!(retrieval.consume);
        assert!(retrieval.partial_match);
        assert!(!retrieval.ignore_nbt);
        assert_eq!(retrieval.required_items[0].count, 16);
        assert_eq!(retrieval.required_items[0].ore_dict, None);
        assert_eq!(
            retrieval.required_items[0].nbt.as_deref(),
            Some(r#"{"display":{"Name":"Shiny"}}"#)
        );

        let hunt = &q.tasks[1];
        assert_eq!(hunt.index, 1);
        assert_eq!(hunt.required_entities.len(), 1);
        assert_eq!(hunt.required_entities[0].entity_id, "Zombie");
        assert_eq!(hunt.required_entities[0].count, 5);
        assert!(!hunt.required_entities[0].subtypes);

        assert_eq!(q.rewards.len(), 1);
        assert_eq!(q.rewards[0].items[0].ore_dict.as_deref(), Some("foodBread"));
    }

    #[test]
    fn minimal_quest_uses_defaults() {
        let root = parse_document(
            r#"{"questIDHigh:4": 1, "questIDLow:4": 2,
                "properties:10": {"betterquesting:10": {"name:8": "Bare"}},
                "tasks:9": {"0:10": {"required:9": {"0:10": {}}}}}"#,
        )
        .unwrap();
        let q = parse_quest_from_compound(&root, "x").unwrap();
        assert_eq!(q.description, None);
        assert_eq!(q.icon_item_id, None);
        assert_eq!(q.icon_damage, 0);
        assert!(!q.is_main);
        assert_eq!(q.quest_logic, DEFAULT_LOGIC);
        assert_eq!(q.task_logic, DEFAULT_LOGIC);
        assert_eq!(q.visibility, DEFAULT_VISIBILITY);
        assert_eq!(q.repeat_time, NO_REPEAT);
        assert!(q.prerequisites.is_empty());

        let task = &q.tasks[0];
        assert_eq!(task.task_type, UNKNOWN_ID);
        assert!(!task.consume && !task.ignore_nbt && !task.partial_match);
        let entity = &task.required_entities[0];
        assert_eq!(entity.entity_id, UNKNOWN_ID);
        assert_eq!(entity.count, 1);
        assert!(!entity.ignore_nbt);
        assert!(entity.subtypes);
    }

    #[test]
    fn quest_without_id_or_name_is_rejected() {
        let no_low = parse_document(
            r#"{"questIDHigh:4": 1, "properties:10": {"betterquesting:10": {"name:8": "x"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            parse_quest_from_compound(&no_low, "x"),
            Err(ParseError::MissingField("questIDLow"))
        ));

        let no_name = parse_document(
            r#"{"questIDHigh:4": 1, "questIDLow:4": 2, "properties:10": {"betterquesting:10": {}}}"#,
        )
        .unwrap();
        assert!(matches!(
            parse_quest_from_compound(&no_name, "x"),
            Err(ParseError::MissingField(_))
        ));
    }

    #[test]
    fn external_id_is_suffix_after_last_dash() {
        assert_eq!(
            quest_external_id(Path::new("Quests/Tier 1/Stone-Age-AbC+dE==.json")),
            "AbC+dE=="
        );
        assert_eq!(quest_external_id(Path::new("Quests/plain.json")), "plain");
    }

    #[test]
    fn quest_line_falls_back_to_manifest_name() {
        let entry = ManifestEntry {
            order: 3,
            external_id: "LINE==".into(),
            display_name: "From Manifest".into(),
        };
        let root = parse_document(
            r#"{"properties:10": {"betterquesting:10": {"desc:8": "About", "icon:10": {"id:8": "minecraft:book"}}}}"#,
        )
        .unwrap();
        let line = parse_quest_line(&root, &entry);
        assert_eq!(line.name, "From Manifest");
        assert_eq!(line.display_order, 3);
        assert_eq!(line.description.as_deref(), Some("About"));
        assert_eq!(line.icon_item_id.as_deref(), Some("minecraft:book"));
        assert_eq!(line.visibility, DEFAULT_VISIBILITY);
    }

    #[test]
    fn quest_line_entry_defaults() {
        let root = parse_document(r#"{"questIDHigh:4": 0, "questIDLow:4": 5, "x:3": 40}"#).unwrap();
        let e = parse_quest_line_entry(&root);
        assert_eq!(e.quest_id, Some(QuestId::from_parts(0, 5)));
        assert_eq!((e.x, e.y, e.size_x, e.size_y), (40, 0, 24, 24));
    }

    #[test]
    fn quest_links_read_only_ids() {
        let root = parse_document(FULL_QUEST).unwrap();
        let links = parse_quest_links(&root).unwrap();
        assert_eq!(links.id, QuestId::from_parts(0, 12));
        assert_eq!(links.prerequisites.len(), 2);
    }
}
