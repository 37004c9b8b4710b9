use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite BetterQuesting quest identifier.
///
/// The mod writes every quest id as a pair of longs (`questIDHigh`,
/// `questIDLow`); prerequisites and quest line entries point at quests by
/// this pair. Both halves are kept as written, with no packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestId {
    pub high: i64,
    pub low: i64,
}

impl QuestId {
    pub fn from_parts(high: i64, low: i64) -> Self {
        QuestId { high, low }
    }

    /// Reads `questIDHigh` / `questIDLow` from a decoded compound.
    pub fn from_compound(c: &crate::nbt::NbtCompound) -> Option<Self> {
        Some(QuestId {
            high: c.get_i64("questIDHigh")?,
            low: c.get_i64("questIDLow")?,
        })
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.high, self.low)
    }
}
